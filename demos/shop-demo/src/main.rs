//! # Shop Demo
//!
//! Takes a payment and records an order inside one transaction, then repeats
//! the same order to show that the duplicate leaves no payment behind.
//!
//! ```bash
//! cargo run -p shop-demo
//! TXSCOPE_DATABASE_URL=postgres://shop@localhost/shop cargo run -p shop-demo
//! ```

mod shop;

use shop::{OrderRepository, PaymentRepository, ShopService};
use std::sync::Arc;
use txscope::prelude::*;

const DEFAULT_URL: &str = "sqlite://shop-demo.db?mode=rwc";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    txscope::observe::init_stdout_tracing();

    let mut config = PoolConfig::from_env()?;
    if config.url.is_empty() {
        config.url = DEFAULT_URL.to_string();
    }
    let pool = config.connect().await?;
    let db = Executor::new(pool.clone()).with_tracer(TracingTracer::new());

    let scope = Scope::new();
    shop::migrate(&db, &scope).await?;
    db.exec(&scope, "DELETE FROM orders", args![]).await?;
    db.exec(&scope, "DELETE FROM payment", args![]).await?;

    let runner: Arc<dyn QueryRunner> = Arc::new(db.clone());
    let service = ShopService::new(
        db,
        PaymentRepository::new(runner.clone()),
        OrderRepository::new(runner),
    );

    service.create_order(&scope, 12500, 123, 105).await?;
    tracing::info!(customer_id = 123, order_id = 105, "Order created");

    if let Err(e) = service.create_order(&scope, 9900, 123, 105).await {
        tracing::warn!(error = %e, "Duplicate order rejected");
    }

    let total = service.payments().total_for(&scope, 123).await?;
    let orders = service.orders().orders_for(&scope, 123).await?;
    tracing::info!(customer_id = 123, total, ?orders, "Customer state");

    pool.close().await;
    Ok(())
}
