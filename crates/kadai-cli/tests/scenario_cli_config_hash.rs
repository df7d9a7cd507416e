use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::path::PathBuf;

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
}

/// Same layers in, same hash out; an overlay changes both the hash and the
/// canonical JSON.
#[test]
fn config_hash_is_stable_and_layered() -> anyhow::Result<()> {
    let base = repo_root().join("config/base.yaml");
    let dir = tempfile::tempdir()?;
    let overlay = dir.path().join("local.yaml");
    std::fs::write(&overlay, "checkout:\n  flow: direct\n")?;

    let run = |paths: &[&std::path::Path]| -> anyhow::Result<String> {
        let mut cmd = assert_cmd::Command::cargo_bin("kadai")?;
        cmd.arg("config-hash").args(paths);
        let out = cmd.assert().success().get_output().stdout.clone();
        Ok(String::from_utf8(out)?)
    };

    let a = run(&[&base])?;
    let b = run(&[&base])?;
    assert_eq!(a, b);
    assert!(a.starts_with("config_hash="));
    assert!(a.contains("\"payment_proof\""));

    let layered = run(&[&base, &overlay])?;
    assert_ne!(a.lines().next(), layered.lines().next());
    assert!(layered.contains("\"direct\""));
    Ok(())
}

#[test]
fn config_hash_missing_file_fails() -> anyhow::Result<()> {
    let mut cmd = assert_cmd::Command::cargo_bin("kadai")?;
    cmd.args(["config-hash", "does/not/exist.yaml"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("failed to read yaml path"));
    Ok(())
}
