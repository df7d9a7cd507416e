//! `kadai orders ...`: admin order review from the terminal.
//!
//! Transitions go through the same [`OrderService`] the daemon uses, so the
//! lifecycle table and the audit trail apply unchanged.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use kadai_audit::AuditWriter;
use kadai_lifecycle::{AdminAction, Audience, OrderQueue};
use kadai_schemas::prices::format_minor;
use kadai_shop::OrderService;

use super::{load_config, open_store};

async fn service() -> Result<OrderService> {
    let cfg = load_config()?;
    let store = open_store(&cfg).await?;
    let audit = AuditWriter::resume(&cfg.audit.path, cfg.audit.hash_chain)
        .context("open audit log failed")?;
    Ok(OrderService::new(store, Some(Arc::new(Mutex::new(audit)))))
}

pub async fn list(queue: &str) -> Result<()> {
    let queue: OrderQueue = queue.parse().map_err(|e: String| anyhow!(e))?;
    let orders = service().await?.list_queue(queue).await?;
    println!("queue={} orders={}", queue.as_str(), orders.len());
    for o in orders {
        println!(
            "order id={} status={} total={} items={} placed={} customer={:?} phone={}",
            o.id,
            o.status.as_str(),
            format_minor(o.total_price),
            o.order_items.len(),
            o.order_date.to_rfc3339(),
            o.customer_name,
            o.customer_phone
        );
    }
    Ok(())
}

pub async fn actions(id: &str) -> Result<()> {
    let (order, actions) = service().await?.actions_for(id).await?;
    let names: Vec<&str> = actions.iter().map(|a| a.as_str()).collect();
    println!(
        "order_id={} status={} label={:?} actions={}",
        order.id,
        order.status.as_str(),
        order.status.label(Audience::Admin),
        names.join(",")
    );
    Ok(())
}

pub async fn apply(id: &str, action: &str, actor: &str) -> Result<()> {
    let action: AdminAction = action.parse().map_err(|e: String| anyhow!(e))?;
    let updated = service().await?.apply_action(id, action, actor).await?;
    println!(
        "order_id={} action={} status={}",
        updated.id,
        action,
        updated.status.as_str()
    );
    Ok(())
}
