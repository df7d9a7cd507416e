use assert_cmd::prelude::*;
use kadai_db::{DocumentStore, PgStore};
use kadai_lifecycle::OrderStatus;
use kadai_schemas::{NewOrder, OrderItem};
use predicates::prelude::*;
use std::path::PathBuf;

fn base_config() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("config")
        .join("base.yaml")
}

/// Catalog and order commands refuse to run without a database.
#[test]
fn commands_require_database_url() -> anyhow::Result<()> {
    let mut cmd = assert_cmd::Command::cargo_bin("kadai")?;
    cmd.env("KADAI_CONFIG", base_config())
        .env_remove(kadai_db::ENV_DB_URL)
        .args(["orders", "list", "--queue", "payments"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("SECRETS_MISSING"))
        .stderr(predicate::str::contains(kadai_db::ENV_DB_URL));
    Ok(())
}

/// This test is DB-backed and is skipped if KADAI_DATABASE_URL is not set.
#[tokio::test]
async fn db_status_and_admin_walk() -> anyhow::Result<()> {
    let url = match std::env::var(kadai_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: KADAI_DATABASE_URL not set");
            return Ok(());
        }
    };

    let work = tempfile::tempdir()?;
    let kadai = |args: &[&str]| -> anyhow::Result<assert_cmd::Command> {
        let mut cmd = assert_cmd::Command::cargo_bin("kadai")?;
        cmd.current_dir(work.path())
            .env("KADAI_CONFIG", base_config())
            .env(kadai_db::ENV_DB_URL, &url)
            .args(args);
        Ok(cmd)
    };

    kadai(&["db", "migrate"])?
        .assert()
        .success()
        .stdout(predicate::str::contains("migrations_applied=true"));
    kadai(&["db", "status"])?.assert().success().stdout(predicate::str::contains(
        "db_ok=true has_products_table=true has_orders_table=true",
    ));

    let store = PgStore::connect(&url).await?;
    let order = store
        .insert_order(NewOrder {
            user_id: "cli-test".to_string(),
            customer_name: "Asha".to_string(),
            customer_phone: "9800000000".to_string(),
            customer_address: "12 Temple Road".to_string(),
            location: None,
            order_items: vec![OrderItem {
                product_id: "p-1".to_string(),
                name: "Filter coffee".to_string(),
                price: 12000,
                quantity: 1,
            }],
            total_price: 12000,
            payment_screenshot_url: None,
            status: OrderStatus::Pending,
        })
        .await?;

    kadai(&["orders", "actions", "--id", &order.id])?
        .assert()
        .success()
        .stdout(predicate::str::contains("status=pending"))
        .stdout(predicate::str::contains("actions=approve,reject"));

    // Two-step jumps are refused and nothing is written.
    kadai(&["orders", "apply", "--id", &order.id, "--action", "dispatch"])?
        .assert()
        .failure();
    assert_eq!(store.get_order(&order.id).await?.status, OrderStatus::Pending);

    kadai(&["orders", "apply", "--id", &order.id, "--action", "approve"])?
        .assert()
        .success()
        .stdout(predicate::str::contains("status=approved"));

    // The CLI wrote the audit trail relative to its working directory.
    kadai(&["audit", "verify"])?
        .assert()
        .success()
        .stdout(predicate::str::contains("audit_chain=valid lines=1"));

    Ok(())
}
