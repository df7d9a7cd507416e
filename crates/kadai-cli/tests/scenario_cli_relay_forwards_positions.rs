//! `kadai relay` against a mock daemon (no network).

use assert_cmd::prelude::*;
use httpmock::prelude::*;
use predicates::prelude::*;
use serde_json::json;

#[test]
fn every_fix_becomes_one_put() -> anyhow::Result<()> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(PUT).path("/v1/delivery/o-7/location");
        then.status(200).json_body(json!({
            "orderId": "o-7", "status": "out_for_delivery", "lat": 12.9, "lng": 77.6
        }));
    });

    let mut cmd = assert_cmd::Command::cargo_bin("kadai")?;
    cmd.args(["relay", "--order-id", "o-7", "--url", &server.base_url()])
        .write_stdin("12.9,77.6\n12.9,77.6\n\nnot a fix\n12.91,77.61\n");

    cmd.assert().success().stdout(predicate::str::contains(
        "relay_outcome=source_ended writes=3 failed_writes=0",
    ));
    // Identical consecutive fixes are not deduplicated.
    mock.assert_hits(3);
    Ok(())
}

#[test]
fn geolocation_failure_ends_the_relay() -> anyhow::Result<()> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(PUT).path("/v1/delivery/o-8/location");
        then.status(200);
    });

    let mut cmd = assert_cmd::Command::cargo_bin("kadai")?;
    cmd.args(["relay", "--order-id", "o-8", "--url", &server.base_url()])
        .write_stdin("12.9,77.6\nerror 1\n12.95,77.65\n");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("relay_outcome=failed writes=1"))
        .stderr(predicate::str::contains("You denied the request for Geolocation"));
    mock.assert_hits(1);
    Ok(())
}

/// A refused write is counted and the relay keeps going.
#[test]
fn refused_writes_do_not_stop_the_relay() -> anyhow::Result<()> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(PUT).path("/v1/delivery/missing/location");
        then.status(404).json_body(json!({"error": "order missing not found", "code": "not_found"}));
    });

    let mut cmd = assert_cmd::Command::cargo_bin("kadai")?;
    cmd.args(["relay", "--order-id", "missing", "--url", &server.base_url()])
        .write_stdin("12.9,77.6\n12.91,77.61\n");

    cmd.assert().success().stdout(predicate::str::contains(
        "relay_outcome=source_ended writes=0 failed_writes=2",
    ));
    mock.assert_hits(2);
    Ok(())
}
