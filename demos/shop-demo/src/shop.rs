//! Payment and order repositories plus the service that ties them together.
//!
//! The repositories only see a `QueryRunner` and the caller's `Scope`; they
//! neither know nor care whether a transaction is open.

use std::sync::Arc;
use txscope::prelude::*;

pub const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS payment (customer_id INTEGER NOT NULL, amount INTEGER NOT NULL)",
    "CREATE TABLE IF NOT EXISTS orders (customer_id INTEGER NOT NULL, order_id INTEGER NOT NULL UNIQUE)",
];

#[derive(Debug, thiserror::Error)]
pub enum ShopError {
    #[error("Price must be positive, got {0}")]
    InvalidPrice(i64),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Create the demo tables if they are missing.
pub async fn migrate(db: &dyn QueryRunner, scope: &Scope) -> DbResult<()> {
    for ddl in SCHEMA {
        db.exec(scope, ddl, args![]).await?;
    }
    Ok(())
}

// ============== Repositories ==============

#[derive(Clone)]
pub struct PaymentRepository {
    runner: Arc<dyn QueryRunner>,
}

impl PaymentRepository {
    pub fn new(runner: Arc<dyn QueryRunner>) -> Self {
        Self { runner }
    }

    pub async fn create_payment(&self, scope: &Scope, customer_id: i64, price: i64) -> DbResult<()> {
        self.runner
            .exec(
                scope,
                "INSERT INTO payment (customer_id, amount) VALUES ($1, $2)",
                args![customer_id, price],
            )
            .await?;
        Ok(())
    }

    pub async fn total_for(&self, scope: &Scope, customer_id: i64) -> DbResult<i64> {
        let (total,): (Option<i64>,) = self
            .runner
            .query_row(
                scope,
                "SELECT SUM(amount) FROM payment WHERE customer_id = $1",
                args![customer_id],
            )
            .await
            .scan()?;
        Ok(total.unwrap_or(0))
    }
}

#[derive(Clone)]
pub struct OrderRepository {
    runner: Arc<dyn QueryRunner>,
}

impl OrderRepository {
    pub fn new(runner: Arc<dyn QueryRunner>) -> Self {
        Self { runner }
    }

    pub async fn create_order(&self, scope: &Scope, customer_id: i64, order_id: i64) -> DbResult<()> {
        self.runner
            .exec(
                scope,
                "INSERT INTO orders (customer_id, order_id) VALUES ($1, $2)",
                args![customer_id, order_id],
            )
            .await?;
        Ok(())
    }

    pub async fn orders_for(&self, scope: &Scope, customer_id: i64) -> DbResult<Vec<i64>> {
        let rows: Vec<(i64,)> = self
            .runner
            .query(
                scope,
                "SELECT order_id FROM orders WHERE customer_id = $1 ORDER BY order_id",
                args![customer_id],
            )
            .await?
            .scan_all()
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

// ============== Service ==============

pub struct ShopService<T: Transactor> {
    transactor: T,
    payments: PaymentRepository,
    orders: OrderRepository,
}

impl<T: Transactor> ShopService<T> {
    pub fn new(transactor: T, payments: PaymentRepository, orders: OrderRepository) -> Self {
        Self {
            transactor,
            payments,
            orders,
        }
    }

    /// Take the payment and record the order atomically.
    pub async fn create_order(
        &self,
        scope: &Scope,
        price: i64,
        customer_id: i64,
        order_id: i64,
    ) -> Result<(), ShopError> {
        if price <= 0 {
            return Err(ShopError::InvalidPrice(price));
        }
        let payments = self.payments.clone();
        let orders = self.orders.clone();

        self.transactor
            .within_transaction(scope, |tx| async move {
                if let Err(e) = payments.create_payment(&tx, customer_id, price).await {
                    tracing::info!("failed to create payment, rolling back transaction...");
                    return Err(ShopError::from(e));
                }
                if let Err(e) = orders.create_order(&tx, customer_id, order_id).await {
                    tracing::info!("failed to create order, rolling back transaction...");
                    return Err(ShopError::from(e));
                }
                Ok::<_, ShopError>(())
            })
            .await
    }

    pub fn payments(&self) -> &PaymentRepository {
        &self.payments
    }

    pub fn orders(&self) -> &OrderRepository {
        &self.orders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn shop() -> (TempDir, ShopService<Executor>, Scope) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("shop.db").display());
        let pool = PoolConfig::new(url).connect().await.unwrap();
        let db = Executor::new(pool);
        let scope = Scope::new();
        migrate(&db, &scope).await.unwrap();

        let runner: Arc<dyn QueryRunner> = Arc::new(db.clone());
        let service = ShopService::new(
            db,
            PaymentRepository::new(runner.clone()),
            OrderRepository::new(runner),
        );
        (dir, service, scope)
    }

    #[tokio::test]
    async fn order_and_payment_are_recorded_together() {
        let (_dir, shop, scope) = shop().await;
        shop.create_order(&scope, 12500, 123, 105).await.unwrap();

        assert_eq!(shop.payments().total_for(&scope, 123).await.unwrap(), 12500);
        assert_eq!(shop.orders().orders_for(&scope, 123).await.unwrap(), vec![105]);
    }

    #[tokio::test]
    async fn duplicate_order_rolls_back_its_payment() {
        let (_dir, shop, scope) = shop().await;
        shop.create_order(&scope, 12500, 123, 105).await.unwrap();

        let err = shop.create_order(&scope, 9900, 123, 105).await.unwrap_err();
        assert!(matches!(err, ShopError::Db(DbError::Statement(_))));

        assert_eq!(shop.payments().total_for(&scope, 123).await.unwrap(), 12500);
        assert_eq!(shop.orders().orders_for(&scope, 123).await.unwrap(), vec![105]);
    }

    #[tokio::test]
    async fn invalid_price_never_opens_a_transaction() {
        let (_dir, shop, scope) = shop().await;
        let err = shop.create_order(&scope, 0, 123, 105).await.unwrap_err();
        assert!(matches!(err, ShopError::InvalidPrice(0)));
        assert_eq!(shop.payments().total_for(&scope, 123).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn service_logic_runs_without_transactions() {
        let (_dir, shop, scope) = shop().await;
        let direct = ShopService::new(
            DirectTransactor::new(),
            shop.payments().clone(),
            shop.orders().clone(),
        );

        direct.create_order(&scope, 500, 7, 1).await.unwrap();
        assert_eq!(direct.payments().total_for(&scope, 7).await.unwrap(), 500);
    }
}
