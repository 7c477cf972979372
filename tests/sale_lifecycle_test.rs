mod common;

use chrono::Utc;
use common::{date, TestLedger};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use stock_ledger::entities::sale_line::{self, Entity as SaleLineEntity};
use stock_ledger::entities::stock_batch;
use stock_ledger::entities::usage_record::{self, Entity as UsageRecordEntity};
use stock_ledger::events::Event;
use stock_ledger::services::sales::{SaleInput, SaleLineInput};
use stock_ledger::ServiceError;

#[tokio::test]
async fn update_sale_reverses_then_reallocates() {
    let ledger = TestLedger::new().await;
    let product = Uuid::new_v4();

    let (_, batch) = ledger
        .receive(product, dec!(10), dec!(5.00), date(2024, 1, 1))
        .await;

    let (sale, old_lines) = ledger
        .sales
        .create_sale(TestLedger::sale_of(
            product,
            dec!(8),
            dec!(9.00),
            date(2024, 1, 5),
        ))
        .await
        .expect("create sale");
    assert_eq!(ledger.batch(batch).await.qty_out, dec!(8));

    let (updated, new_lines) = ledger
        .sales
        .update_sale(
            sale.id,
            TestLedger::sale_of(product, dec!(3), dec!(9.00), date(2024, 1, 5)),
        )
        .await
        .expect("update sale");

    // Net effect: only the new allocation remains.
    assert_eq!(ledger.batch(batch).await.qty_out, dec!(3));
    assert_eq!(updated.total, dec!(27.00));

    let orphaned = UsageRecordEntity::find()
        .filter(usage_record::Column::SaleLineId.eq(old_lines[0].id))
        .all(&*ledger.db)
        .await
        .expect("query old usage records");
    assert!(orphaned.is_empty(), "old lines keep no usage records");

    let lines = SaleLineEntity::find()
        .filter(sale_line::Column::SaleId.eq(sale.id))
        .all(&*ledger.db)
        .await
        .expect("query sale lines");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].id, new_lines[0].id);

    let (fetched, fetched_lines) = ledger.sales.get_sale(sale.id).await.expect("get sale");
    assert_eq!(fetched.total, dec!(27.00));
    assert_eq!(fetched_lines.len(), 1);
}

#[tokio::test]
async fn failed_update_rolls_back_to_previous_state() {
    let ledger = TestLedger::new().await;
    let product = Uuid::new_v4();

    let (_, batch) = ledger
        .receive(product, dec!(10), dec!(5.00), date(2024, 1, 1))
        .await;

    let (sale, lines) = ledger
        .sales
        .create_sale(TestLedger::sale_of(
            product,
            dec!(6),
            dec!(9.00),
            date(2024, 1, 5),
        ))
        .await
        .expect("create sale");

    let err = ledger
        .sales
        .update_sale(
            sale.id,
            TestLedger::sale_of(product, dec!(50), dec!(9.00), date(2024, 1, 5)),
        )
        .await
        .expect_err("only 10 ever received");
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    // Pre-update state is fully intact, including batch quantities and the
    // original usage records.
    assert_eq!(ledger.batch(batch).await.qty_out, dec!(6));
    let records = UsageRecordEntity::find()
        .filter(usage_record::Column::SaleLineId.eq(lines[0].id))
        .all(&*ledger.db)
        .await
        .expect("query usage records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].qty, dec!(6));
}

#[tokio::test]
async fn delete_sale_is_always_refused() {
    let ledger = TestLedger::new().await;
    let product = Uuid::new_v4();

    ledger
        .receive(product, dec!(5), dec!(5.00), date(2024, 1, 1))
        .await;
    let (sale, _) = ledger
        .sales
        .create_sale(TestLedger::sale_of(
            product,
            dec!(1),
            dec!(9.00),
            date(2024, 1, 2),
        ))
        .await
        .expect("create sale");

    let err = ledger
        .sales
        .delete_sale(sale.id)
        .await
        .expect_err("sales are permanent");
    assert!(matches!(err, ServiceError::OperationNotPermitted(_)));

    // The refusal is unconditional, not a state check.
    let err = ledger
        .sales
        .delete_sale(9999)
        .await
        .expect_err("even unknown ids are refused");
    assert!(matches!(err, ServiceError::OperationNotPermitted(_)));
}

/// COGS is snapshotted at consumption time: editing the batch's cost
/// afterwards does not change what the sale already recorded.
#[tokio::test]
async fn recorded_cogs_is_immune_to_later_cost_edits() {
    let ledger = TestLedger::new().await;
    let product = Uuid::new_v4();

    let (_, batch_id) = ledger
        .receive(product, dec!(10), dec!(5.00), date(2024, 1, 1))
        .await;

    let (_, lines) = ledger
        .sales
        .create_sale(TestLedger::sale_of(
            product,
            dec!(4),
            dec!(9.00),
            date(2024, 1, 2),
        ))
        .await
        .expect("create sale");

    let batch = ledger.batch(batch_id).await;
    let mut active: stock_batch::ActiveModel = batch.into();
    active.unit_cost = Set(dec!(99.00));
    active.updated_at = Set(Utc::now());
    active.update(&*ledger.db).await.expect("edit batch cost");

    let cogs = ledger
        .sales
        .line_cost_of_goods(lines[0].id)
        .await
        .expect("line cogs");
    assert_eq!(cogs, dec!(20.00));
}

#[tokio::test]
async fn sale_profit_breaks_down_revenue_and_cogs() {
    let ledger = TestLedger::new().await;
    let product = Uuid::new_v4();

    ledger
        .receive(product, dec!(10), dec!(5.00), date(2024, 1, 1))
        .await;

    let (sale, _) = ledger
        .sales
        .create_sale(SaleInput {
            reference: Some("S-100".to_string()),
            sold_at: date(2024, 1, 5),
            lines: vec![SaleLineInput {
                product_id: product,
                variant_id: None,
                qty: dec!(4),
                price: dec!(9.00),
                discount: dec!(1.00),
            }],
        })
        .await
        .expect("create sale");

    let profit = ledger
        .reporting
        .sale_profit(sale.id)
        .await
        .expect("sale profit");

    assert_eq!(profit.revenue, dec!(35.00)); // 4 * 9.00 - 1.00
    assert_eq!(profit.cost_of_goods, dec!(20.00)); // 4 * 5.00
    assert_eq!(profit.profit, dec!(15.00));
    assert_eq!(profit.lines.len(), 1);
    assert_eq!(profit.lines[0].cost_of_goods, dec!(20.00));

    assert_eq!(
        ledger
            .reporting
            .sale_cost_of_goods(sale.id)
            .await
            .expect("sale cogs"),
        dec!(20.00)
    );
}

#[tokio::test]
async fn invalid_sale_input_persists_nothing() {
    let ledger = TestLedger::new().await;
    let product = Uuid::new_v4();

    ledger
        .receive(product, dec!(5), dec!(5.00), date(2024, 1, 1))
        .await;

    let err = ledger
        .sales
        .create_sale(TestLedger::sale_of(
            product,
            Decimal::ZERO,
            dec!(9.00),
            date(2024, 1, 2),
        ))
        .await
        .expect_err("zero quantity is invalid");
    assert!(matches!(err, ServiceError::ValidationError(_)));

    let err = ledger
        .sales
        .create_sale(SaleInput {
            reference: None,
            sold_at: date(2024, 1, 2),
            lines: vec![],
        })
        .await
        .expect_err("empty sales are invalid");
    assert!(matches!(err, ServiceError::ValidationError(_)));

    let sales = stock_ledger::entities::sale::Entity::find()
        .all(&*ledger.db)
        .await
        .expect("query sales");
    assert!(sales.is_empty());
}

#[tokio::test]
async fn events_are_emitted_after_successful_commit() {
    let (ledger, mut rx) = TestLedger::with_event_capture().await;
    let product = Uuid::new_v4();

    ledger
        .receive(product, dec!(5), dec!(5.00), date(2024, 1, 1))
        .await;

    // Purchase events first: recorded, batch received, batches changed.
    let mut saw_purchase = false;
    let mut saw_batches_changed = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            Event::PurchaseRecorded { .. } => saw_purchase = true,
            Event::BatchesChanged { product_id, .. } => {
                assert_eq!(product_id, product);
                saw_batches_changed = true;
            }
            _ => {}
        }
    }
    assert!(saw_purchase);
    assert!(saw_batches_changed);

    // A failed sale emits nothing.
    let _ = ledger
        .sales
        .create_sale(TestLedger::sale_of(
            product,
            dec!(50),
            dec!(9.00),
            date(2024, 1, 2),
        ))
        .await
        .expect_err("insufficient stock");
    assert!(rx.try_recv().is_err(), "rolled-back sale must emit nothing");

    // A committed sale emits SaleCreated plus allocation events.
    let (sale, _) = ledger
        .sales
        .create_sale(TestLedger::sale_of(
            product,
            dec!(2),
            dec!(9.00),
            date(2024, 1, 2),
        ))
        .await
        .expect("create sale");

    let mut saw_sale_created = false;
    let mut saw_allocated = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            Event::SaleCreated { sale_id, .. } => {
                assert_eq!(sale_id, sale.id);
                saw_sale_created = true;
            }
            Event::StockAllocated { batch_ids, .. } => {
                assert_eq!(batch_ids.len(), 1);
                saw_allocated = true;
            }
            _ => {}
        }
    }
    assert!(saw_sale_created);
    assert!(saw_allocated);
}
