#![allow(dead_code)]

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use stock_ledger::config::AppConfig;
use stock_ledger::db;
use stock_ledger::entities::stock_batch::{self, Entity as StockBatchEntity};
use stock_ledger::events::{self, Event, EventSender};
use stock_ledger::services::receipts::{PurchaseInput, PurchaseLineInput, ReceiptService};
use stock_ledger::services::reporting::ReportingService;
use stock_ledger::services::sales::{SaleInput, SaleLineInput, SaleService};

/// Test harness wiring the ledger services to an in-memory SQLite database.
///
/// The pool is pinned to a single connection so every operation shares the
/// same in-memory database and concurrent transactions serialize on it.
pub struct TestLedger {
    pub db: Arc<DatabaseConnection>,
    pub receipts: ReceiptService,
    pub sales: SaleService,
    pub reporting: ReportingService,
    event_task: Option<tokio::task::JoinHandle<()>>,
}

impl TestLedger {
    /// Fresh ledger with a background event consumer.
    pub async fn new() -> Self {
        let (mut ledger, rx) = Self::build().await;
        ledger.event_task = Some(tokio::spawn(events::process_events(rx)));
        ledger
    }

    /// Fresh ledger that hands the event receiver to the test, so emitted
    /// events can be asserted on directly.
    pub async fn with_event_capture() -> (Self, mpsc::Receiver<Event>) {
        Self::build().await
    }

    async fn build() -> (Self, mpsc::Receiver<Event>) {
        stock_ledger::logging::init_tracing("warn");

        let mut cfg = AppConfig::new("sqlite::memory:".to_string());
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.auto_migrate = true;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");

        let db_arc = Arc::new(pool);
        let (tx, rx) = mpsc::channel(256);
        let sender = EventSender::new(tx);

        let ledger = Self {
            receipts: ReceiptService::new(db_arc.clone(), Some(sender.clone())),
            sales: SaleService::new(db_arc.clone(), Some(sender)),
            reporting: ReportingService::new(db_arc.clone()),
            db: db_arc,
            event_task: None,
        };

        (ledger, rx)
    }

    /// Records a single-line purchase and returns `(purchase_id, batch_id)`.
    pub async fn receive(
        &self,
        product_id: Uuid,
        qty: Decimal,
        unit_cost: Decimal,
        received_at: NaiveDate,
    ) -> (i64, i64) {
        self.receive_variant(product_id, None, qty, unit_cost, received_at)
            .await
    }

    pub async fn receive_variant(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        qty: Decimal,
        unit_cost: Decimal,
        received_at: NaiveDate,
    ) -> (i64, i64) {
        let (purchase, lines) = self
            .receipts
            .create_purchase(PurchaseInput {
                reference: None,
                purchased_at: received_at,
                lines: vec![PurchaseLineInput {
                    product_id,
                    variant_id,
                    qty,
                    unit_cost,
                }],
            })
            .await
            .expect("seed purchase");

        let batch = StockBatchEntity::find()
            .filter(stock_batch::Column::PurchaseLineId.eq(lines[0].id))
            .one(&*self.db)
            .await
            .expect("query seeded batch")
            .expect("seeded batch exists");

        (purchase.id, batch.id)
    }

    /// Convenience single-line sale input.
    pub fn sale_of(
        product_id: Uuid,
        qty: Decimal,
        price: Decimal,
        sold_at: NaiveDate,
    ) -> SaleInput {
        SaleInput {
            reference: None,
            sold_at,
            lines: vec![SaleLineInput {
                product_id,
                variant_id: None,
                qty,
                price,
                discount: Decimal::ZERO,
            }],
        }
    }

    /// Loads a batch by id.
    pub async fn batch(&self, batch_id: i64) -> stock_batch::Model {
        StockBatchEntity::find_by_id(batch_id)
            .one(&*self.db)
            .await
            .expect("query batch")
            .expect("batch exists")
    }
}

impl Drop for TestLedger {
    fn drop(&mut self) {
        if let Some(task) = &self.event_task {
            task.abort();
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}
