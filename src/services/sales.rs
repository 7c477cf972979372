//! Sale transaction coordination.
//!
//! Creating a sale persists the header and lines and allocates stock for
//! every line inside one transaction; any failure aborts the whole sale.
//! Updating fully reverses every existing line, then re-allocates the new
//! lines, so the net effect is atomic from the outside. Sales are never
//! deletable: deletion would break the FIFO audit trail.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, TransactionTrait,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::entities::{
    sale::{self, Entity as SaleEntity},
    sale_line::{self, Entity as SaleLineEntity},
    usage_record::{self, Entity as UsageRecordEntity},
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::allocation;
use crate::services::{validate_non_negative, validate_positive};

/// One requested sale line. Price and discount are externally supplied; the
/// ledger only validates their sign and the positive quantity.
#[derive(Debug, Clone, Validate)]
pub struct SaleLineInput {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    #[validate(custom = "validate_positive")]
    pub qty: Decimal,
    #[validate(custom = "validate_non_negative")]
    pub price: Decimal,
    #[validate(custom = "validate_non_negative")]
    pub discount: Decimal,
}

/// A sale to record: header fields plus at least one line.
#[derive(Debug, Clone, Validate)]
pub struct SaleInput {
    pub reference: Option<String>,
    pub sold_at: NaiveDate,
    #[validate]
    pub lines: Vec<SaleLineInput>,
}

impl SaleInput {
    fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;
        if self.lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "a sale needs at least one line".to_string(),
            ));
        }
        Ok(())
    }
}

/// Coordinates sale creation and update against the FIFO ledger.
#[derive(Clone)]
pub struct SaleService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<EventSender>,
}

impl SaleService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Creates a sale and allocates stock for every line, all in one
    /// transaction. `InsufficientStock` or validation failure leaves no
    /// header, no lines and no batch mutation behind.
    #[instrument(skip(self, input))]
    pub async fn create_sale(
        &self,
        input: SaleInput,
    ) -> Result<(sale::Model, Vec<sale_line::Model>), ServiceError> {
        input.check()?;

        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let header = sale::ActiveModel {
            reference: Set(input.reference.clone()),
            sold_at: Set(input.sold_at),
            total: Set(Decimal::ZERO),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        let (lines, allocations) = Self::insert_and_allocate(&txn, header.id, &input.lines).await?;

        let total: Decimal = lines.iter().map(|line| line.subtotal).sum();
        let mut active: sale::ActiveModel = header.into();
        active.total = Set(total);
        let header = active.update(&txn).await.map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::SaleCreated {
                    sale_id: header.id,
                    total: header.total,
                })
                .await;
            for (line, records) in lines.iter().zip(&allocations) {
                sender
                    .send_or_log(Event::StockAllocated {
                        sale_line_id: line.id,
                        product_id: line.product_id,
                        variant_id: line.variant_id,
                        qty: line.qty,
                        batch_ids: records.iter().map(|r| r.stock_batch_id).collect(),
                    })
                    .await;
            }
            emit_batches_changed(sender, &input.lines).await;
        }

        info!(
            sale_id = header.id,
            lines = lines.len(),
            total = %header.total,
            "Sale created"
        );

        Ok((header, lines))
    }

    /// Replaces a sale's lines: reverses every existing line, deletes them,
    /// then inserts and allocates the new lines, all in one transaction.
    ///
    /// Every line is reversed and re-allocated even if unchanged; diffing
    /// old against new lines could reorder FIFO consumption.
    #[instrument(skip(self, input))]
    pub async fn update_sale(
        &self,
        sale_id: i64,
        input: SaleInput,
    ) -> Result<(sale::Model, Vec<sale_line::Model>), ServiceError> {
        input.check()?;

        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let existing = SaleEntity::find_by_id(sale_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("sale {} not found", sale_id)))?;

        let old_lines = SaleLineEntity::find()
            .filter(sale_line::Column::SaleId.eq(sale_id))
            .all(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        for line in &old_lines {
            allocation::reverse(&txn, line.id).await?;
        }

        SaleLineEntity::delete_many()
            .filter(sale_line::Column::SaleId.eq(sale_id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        let (lines, _allocations) = Self::insert_and_allocate(&txn, sale_id, &input.lines).await?;

        let total: Decimal = lines.iter().map(|line| line.subtotal).sum();
        let mut active: sale::ActiveModel = existing.into();
        active.reference = Set(input.reference.clone());
        active.sold_at = Set(input.sold_at);
        active.total = Set(total);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await.map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::SaleUpdated(sale_id)).await;
            for line in &old_lines {
                sender
                    .send_or_log(Event::StockReversed {
                        sale_line_id: line.id,
                    })
                    .await;
            }
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

        info!(sale_id, lines = lines.len(), "Sale updated");

        Ok((updated, lines))
    }

    /// Sales are never deletable once created. Deletion would break the
    /// FIFO audit trail; this is a permanent design decision, so the
    /// refusal does not depend on the sale's state.
    #[instrument(skip(self))]
    pub async fn delete_sale(&self, sale_id: i64) -> Result<(), ServiceError> {
        Err(ServiceError::OperationNotPermitted(format!(
            "sale {} cannot be deleted; sales are permanent ledger entries",
            sale_id
        )))
    }

    /// Cost of goods sold for one sale line: the sum of `qty * unit_cost`
    /// over its usage records, with costs as they were at consumption time.
    #[instrument(skip(self))]
    pub async fn line_cost_of_goods(&self, sale_line_id: i64) -> Result<Decimal, ServiceError> {
        let records = UsageRecordEntity::find()
            .filter(usage_record::Column::SaleLineId.eq(sale_line_id))
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(records.iter().map(usage_record::Model::cost).sum())
    }

    /// Fetches a sale with its lines.
    pub async fn get_sale(
        &self,
        sale_id: i64,
    ) -> Result<(sale::Model, Vec<sale_line::Model>), ServiceError> {
        let db = &*self.db;

        let header = SaleEntity::find_by_id(sale_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("sale {} not found", sale_id)))?;

        let lines = SaleLineEntity::find()
            .filter(sale_line::Column::SaleId.eq(sale_id))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok((header, lines))
    }

    async fn insert_and_allocate(
        txn: &DatabaseTransaction,
        sale_id: i64,
        inputs: &[SaleLineInput],
    ) -> Result<(Vec<sale_line::Model>, Vec<Vec<usage_record::Model>>), ServiceError> {
        let mut lines = Vec::with_capacity(inputs.len());
        let mut allocations = Vec::with_capacity(inputs.len());

        for input in inputs {
            let subtotal = (input.qty * input.price - input.discount).round_dp(2);

            let line = sale_line::ActiveModel {
                sale_id: Set(sale_id),
                product_id: Set(input.product_id),
                variant_id: Set(input.variant_id),
                qty: Set(input.qty),
                price: Set(input.price),
                discount: Set(input.discount),
                subtotal: Set(subtotal),
                created_at: Set(Utc::now()),
                updated_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(txn)
            .await
            .map_err(ServiceError::db_error)?;

            let records = allocation::allocate(txn, &line).await?;
            lines.push(line);
            allocations.push(records);
        }

        Ok((lines, allocations))
    }
}

async fn emit_batches_changed(sender: &EventSender, lines: &[SaleLineInput]) {
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

fn distinct_scopes(lines: &[sale_line::Model]) -> Vec<(Uuid, Option<Uuid>)> {
    let mut seen = HashSet::new();
    lines
        .iter()
        .filter(|line| seen.insert((line.product_id, line.variant_id)))
        .map(|line| (line.product_id, line.variant_id))
        .collect()
}
