//! FIFO allocation and reversal.
//!
//! Both operations run inside a caller-owned transaction so that a sale's
//! lines commit or roll back as one unit. `allocate` is all-or-nothing: on
//! `InsufficientStock` the caller rolls back, which also discards the
//! partial `qty_out` increments made while walking the batch list.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use tracing::debug;
use uuid::Uuid;

use crate::entities::{
    sale_line,
    stock_batch::{self, Entity as StockBatchEntity},
    usage_record::{self, Entity as UsageRecordEntity},
};
use crate::errors::ServiceError;

/// Fetches the available batches for `(product_id, variant_id)` in FIFO
/// order and takes exclusive row locks on them for the lifetime of `txn`.
///
/// The sort is re-evaluated fresh on every call; the `(received_at, id)`
/// key gives a deterministic total order. On PostgreSQL the lock maps to
/// `SELECT ... FOR UPDATE`; SQLite ignores the clause and serializes
/// writers instead.
async fn lock_available_batches(
    txn: &DatabaseTransaction,
    product_id: Uuid,
    variant_id: Option<Uuid>,
) -> Result<Vec<stock_batch::Model>, ServiceError> {
    let mut query = StockBatchEntity::find()
        .filter(stock_batch::Column::ProductId.eq(product_id))
        .filter(Expr::col(stock_batch::Column::QtyOut).lt(Expr::col(stock_batch::Column::QtyIn)));

    // A variant-less request only consumes variant-less batches and vice
    // versa; the two stock pools never mix.
    query = match variant_id {
        Some(variant) => query.filter(stock_batch::Column::VariantId.eq(variant)),
        None => query.filter(stock_batch::Column::VariantId.is_null()),
    };

    query
        .order_by_asc(stock_batch::Column::ReceivedAt)
        .order_by_asc(stock_batch::Column::Id)
        .lock_exclusive()
        .all(txn)
        .await
        .map_err(ServiceError::db_error)
}

/// Allocates a sale line's quantity against the oldest available batches.
///
/// Walks the locked FIFO list, consuming `min(remaining, still_needed)` from
/// each batch and writing one usage record per batch touched, with the unit
/// cost snapshotted from the batch. Returns `InsufficientStock` if the list
/// is exhausted first; the caller must then roll back the transaction.
pub async fn allocate(
    txn: &DatabaseTransaction,
    line: &sale_line::Model,
) -> Result<Vec<usage_record::Model>, ServiceError> {
    if line.qty <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "allocation quantity must be positive, got {}",
            line.qty
        )));
    }

    let batches = lock_available_batches(txn, line.product_id, line.variant_id).await?;

    let mut still_needed = line.qty;
    let mut records = Vec::new();

    for batch in batches {
        if still_needed <= Decimal::ZERO {
            break;
        }

        let take = batch.remaining().min(still_needed);
        debug!(
            batch_id = batch.id,
            take = %take,
            remaining = %batch.remaining(),
            "Consuming batch"
        );

        let mut active: stock_batch::ActiveModel = batch.clone().into();
        active.qty_out = Set(batch.qty_out + take);
        active.updated_at = Set(Utc::now());
        active.update(txn).await.map_err(ServiceError::db_error)?;

        let record = usage_record::ActiveModel {
            sale_line_id: Set(line.id),
            stock_batch_id: Set(batch.id),
            qty: Set(take),
            unit_cost: Set(batch.unit_cost),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(txn)
        .await
        .map_err(ServiceError::db_error)?;

        records.push(record);
        still_needed -= take;
    }

    if still_needed > Decimal::ZERO {
        return Err(ServiceError::InsufficientStock(format!(
            "product {}: requested {}, short by {}",
            line.product_id, line.qty, still_needed
        )));
    }

    Ok(records)
}

/// Undoes a prior allocation by replaying the line's usage records.
///
/// Each referenced batch's `qty_out` is decremented by the recorded
/// quantity, then the records are deleted. Applied to the unmodified record
/// set this is the exact inverse of `allocate`: every touched batch returns
/// to its pre-allocation `qty_out`, bit-for-bit in fixed point.
pub async fn reverse(txn: &DatabaseTransaction, sale_line_id: i64) -> Result<(), ServiceError> {
    let records = UsageRecordEntity::find()
        .filter(usage_record::Column::SaleLineId.eq(sale_line_id))
        .all(txn)
        .await
        .map_err(ServiceError::db_error)?;

    for record in &records {
        let batch = StockBatchEntity::find_by_id(record.stock_batch_id)
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "usage record {} references missing batch {}",
                    record.id, record.stock_batch_id
                ))
            })?;

        if batch.qty_out < record.qty {
            return Err(ServiceError::InternalError(format!(
                "reversing usage record {} would drive batch {} qty_out below zero",
                record.id, batch.id
            )));
        }

        let mut active: stock_batch::ActiveModel = batch.clone().into();
        active.qty_out = Set(batch.qty_out - record.qty);
        active.updated_at = Set(Utc::now());
        active.update(txn).await.map_err(ServiceError::db_error)?;

        debug!(
            batch_id = batch.id,
            restored = %record.qty,
            "Restored batch consumption"
        );
    }

    UsageRecordEntity::delete_many()
        .filter(usage_record::Column::SaleLineId.eq(sale_line_id))
        .exec(txn)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(())
}
