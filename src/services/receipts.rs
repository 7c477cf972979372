//! Purchase recording and the receipt side of the ledger.
//!
//! Every purchase line owns exactly one stock batch, created with it. Once
//! any batch originating from a purchase has been consumed by a sale, the
//! whole purchase is immutable: a single consumed batch locks every line,
//! not just the touched one.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter, TransactionTrait,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::entities::{
    purchase::{self, Entity as PurchaseEntity},
    purchase_line::{self, Entity as PurchaseLineEntity},
    stock_batch::{self, Entity as StockBatchEntity},
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::validate_positive;

/// One requested purchase line.
#[derive(Debug, Clone, Validate)]
pub struct PurchaseLineInput {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    #[validate(custom = "validate_positive")]
    pub qty: Decimal,
    #[validate(custom = "validate_positive")]
    pub unit_cost: Decimal,
}

/// A purchase to record: header fields plus at least one line.
#[derive(Debug, Clone, Validate)]
pub struct PurchaseInput {
    pub reference: Option<String>,
    pub purchased_at: NaiveDate,
    #[validate]
    pub lines: Vec<PurchaseLineInput>,
}

impl PurchaseInput {
    fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;
        if self.lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "a purchase needs at least one line".to_string(),
            ));
        }
        Ok(())
    }
}

/// Records incoming stock and guards purchase mutation.
#[derive(Clone)]
pub struct ReceiptService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<EventSender>,
}

impl ReceiptService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Creates the 1:1 stock batch for a freshly inserted purchase line.
    ///
    /// The batch starts with `qty_out = 0` and has no stock-level side
    /// effects beyond its own insertion.
    pub async fn record_receipt(
        txn: &DatabaseTransaction,
        line: &purchase_line::Model,
        received_at: NaiveDate,
    ) -> Result<stock_batch::Model, ServiceError> {
        if line.qty <= Decimal::ZERO || line.unit_cost <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "receipt requires positive quantity and cost, got qty={} cost={}",
                line.qty, line.unit_cost
            )));
        }

        let batch = stock_batch::ActiveModel {
            product_id: Set(line.product_id),
            variant_id: Set(line.variant_id),
            purchase_line_id: Set(line.id),
            qty_in: Set(line.qty),
            qty_out: Set(Decimal::ZERO),
            unit_cost: Set(line.unit_cost),
            received_at: Set(received_at),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(txn)
        .await
        .map_err(ServiceError::db_error)?;

        Ok(batch)
    }

    /// Records a purchase: header, lines, and one batch per line, in one
    /// transaction.
    #[instrument(skip(self, input))]
    pub async fn create_purchase(
        &self,
        input: PurchaseInput,
    ) -> Result<(purchase::Model, Vec<purchase_line::Model>), ServiceError> {
        input.check()?;

        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let (created, lines, batches) = Self::insert_purchase(&txn, &input).await?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::PurchaseRecorded {
                    purchase_id: created.id,
                    total: created.total,
                })
                .await;
            for batch in &batches {
                sender
                    .send_or_log(Event::BatchReceived {
                        batch_id: batch.id,
                        product_id: batch.product_id,
                        variant_id: batch.variant_id,
                        qty: batch.qty_in,
                    })
                    .await;
            }
            emit_batches_changed(sender, &input.lines).await;
        }

        info!(
            purchase_id = created.id,
            lines = lines.len(),
            total = %created.total,
            "Purchase recorded"
        );

        Ok((created, lines))
    }

    /// Replaces a purchase's lines and batches. Refused with `LedgerLocked`
    /// when any of its batches has been consumed.
    #[instrument(skip(self, input))]
    pub async fn update_purchase(
        &self,
        purchase_id: i64,
        input: PurchaseInput,
    ) -> Result<(purchase::Model, Vec<purchase_line::Model>), ServiceError> {
        input.check()?;

        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let existing = PurchaseEntity::find_by_id(purchase_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("purchase {} not found", purchase_id)))?;

        Self::ensure_unlocked(&txn, purchase_id).await?;

        let old_lines = Self::delete_lines_and_batches(&txn, purchase_id).await?;

        let mut total = Decimal::ZERO;
        let mut lines = Vec::with_capacity(input.lines.len());
        for line_input in &input.lines {
            let line = Self::insert_line(&txn, purchase_id, line_input).await?;
            Self::record_receipt(&txn, &line, input.purchased_at).await?;
            total += line.subtotal;
            lines.push(line);
        }

        let mut active: purchase::ActiveModel = existing.into();
        active.reference = Set(input.reference.clone());
        active.purchased_at = Set(input.purchased_at);
        active.total = Set(total);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await.map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::PurchaseUpdated(purchase_id)).await;
            emit_batches_changed(sender, &input.lines).await;
            for (product_id, variant_id) in distinct_scopes(&old_lines) {
                sender
                    .send_or_log(Event::BatchesChanged {
                        product_id,
                        variant_id,
                    })
                    .await;
            }
        }

        info!(purchase_id, "Purchase updated");

        Ok((updated, lines))
    }

    /// Deletes a purchase with its lines and never-consumed batches.
    /// Refused with `LedgerLocked` when any batch has been consumed.
    #[instrument(skip(self))]
    pub async fn delete_purchase(&self, purchase_id: i64) -> Result<(), ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let existing = PurchaseEntity::find_by_id(purchase_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("purchase {} not found", purchase_id)))?;

        Self::ensure_unlocked(&txn, purchase_id).await?;

        let old_lines = Self::delete_lines_and_batches(&txn, purchase_id).await?;

        let active: purchase::ActiveModel = existing.into();
        active.delete(&txn).await.map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::PurchaseDeleted(purchase_id)).await;
            for (product_id, variant_id) in distinct_scopes(&old_lines) {
                sender
                    .send_or_log(Event::BatchesChanged {
                        product_id,
                        variant_id,
                    })
                    .await;
            }
        }

        info!(purchase_id, "Purchase deleted");

        Ok(())
    }

    /// Whether the purchase is immutable: true iff any batch originating
    /// from its lines has `qty_out > 0`.
    #[instrument(skip(self))]
    pub async fn purchase_is_locked(&self, purchase_id: i64) -> Result<bool, ServiceError> {
        Self::is_locked_on(&*self.db, purchase_id).await
    }

    /// Fetches a purchase with its lines.
    pub async fn get_purchase(
        &self,
        purchase_id: i64,
    ) -> Result<(purchase::Model, Vec<purchase_line::Model>), ServiceError> {
        let db = &*self.db;

        let header = PurchaseEntity::find_by_id(purchase_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("purchase {} not found", purchase_id)))?;

        let lines = PurchaseLineEntity::find()
            .filter(purchase_line::Column::PurchaseId.eq(purchase_id))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok((header, lines))
    }

    async fn insert_purchase(
        txn: &DatabaseTransaction,
        input: &PurchaseInput,
    ) -> Result<
        (
            purchase::Model,
            Vec<purchase_line::Model>,
            Vec<stock_batch::Model>,
        ),
        ServiceError,
    > {
        let header = purchase::ActiveModel {
            reference: Set(input.reference.clone()),
            purchased_at: Set(input.purchased_at),
            total: Set(Decimal::ZERO),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(txn)
        .await
        .map_err(ServiceError::db_error)?;

        let mut total = Decimal::ZERO;
        let mut lines = Vec::with_capacity(input.lines.len());
        let mut batches = Vec::with_capacity(input.lines.len());

        for line_input in &input.lines {
            let line = Self::insert_line(txn, header.id, line_input).await?;
            let batch = Self::record_receipt(txn, &line, input.purchased_at).await?;
            total += line.subtotal;
            lines.push(line);
            batches.push(batch);
        }

        let mut active: purchase::ActiveModel = header.into();
        active.total = Set(total);
        let header = active.update(txn).await.map_err(ServiceError::db_error)?;

        Ok((header, lines, batches))
    }

    async fn insert_line(
        txn: &DatabaseTransaction,
        purchase_id: i64,
        input: &PurchaseLineInput,
    ) -> Result<purchase_line::Model, ServiceError> {
        let subtotal = (input.qty * input.unit_cost).round_dp(2);

        purchase_line::ActiveModel {
            purchase_id: Set(purchase_id),
            product_id: Set(input.product_id),
            variant_id: Set(input.variant_id),
            qty: Set(input.qty),
            unit_cost: Set(input.unit_cost),
            subtotal: Set(subtotal),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(txn)
        .await
        .map_err(ServiceError::db_error)
    }

    /// Coarse mutation guard: a single consumed batch locks the entire
    /// purchase.
    async fn ensure_unlocked(
        txn: &DatabaseTransaction,
        purchase_id: i64,
    ) -> Result<(), ServiceError> {
        if Self::is_locked_on(txn, purchase_id).await? {
            return Err(ServiceError::LedgerLocked(format!(
                "purchase {} has consumed stock and can no longer be edited or deleted",
                purchase_id
            )));
        }
        Ok(())
    }

    async fn is_locked_on<C: ConnectionTrait>(
        conn: &C,
        purchase_id: i64,
    ) -> Result<bool, ServiceError> {
        let line_ids: Vec<i64> = PurchaseLineEntity::find()
            .filter(purchase_line::Column::PurchaseId.eq(purchase_id))
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|line| line.id)
            .collect();

        if line_ids.is_empty() {
            return Ok(false);
        }

        let consumed = StockBatchEntity::find()
            .filter(stock_batch::Column::PurchaseLineId.is_in(line_ids))
            .filter(stock_batch::Column::QtyOut.gt(Decimal::ZERO))
            .count(conn)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(consumed > 0)
    }

    async fn delete_lines_and_batches(
        txn: &DatabaseTransaction,
        purchase_id: i64,
    ) -> Result<Vec<purchase_line::Model>, ServiceError> {
        let lines = PurchaseLineEntity::find()
            .filter(purchase_line::Column::PurchaseId.eq(purchase_id))
            .all(txn)
            .await
            .map_err(ServiceError::db_error)?;

        let line_ids: Vec<i64> = lines.iter().map(|line| line.id).collect();

        if !line_ids.is_empty() {
            StockBatchEntity::delete_many()
                .filter(stock_batch::Column::PurchaseLineId.is_in(line_ids.clone()))
                .exec(txn)
                .await
                .map_err(ServiceError::db_error)?;

            PurchaseLineEntity::delete_many()
                .filter(purchase_line::Column::Id.is_in(line_ids))
                .exec(txn)
                .await
                .map_err(ServiceError::db_error)?;
        }

        Ok(lines)
    }
}

async fn emit_batches_changed(sender: &EventSender, lines: &[PurchaseLineInput]) {
    let mut seen = HashSet::new();
    for line in lines {
        if seen.insert((line.product_id, line.variant_id)) {
            sender
                .send_or_log(Event::BatchesChanged {
                    product_id: line.product_id,
                    variant_id: line.variant_id,
                })
                .await;
        }
    }
}

fn distinct_scopes(lines: &[purchase_line::Model]) -> Vec<(Uuid, Option<Uuid>)> {
    let mut seen = HashSet::new();
    lines
        .iter()
        .filter(|line| seen.insert((line.product_id, line.variant_id)))
        .map(|line| (line.product_id, line.variant_id))
        .collect()
}
