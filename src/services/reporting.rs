//! Read-only ledger outputs: stock-on-hand, COGS and profit aggregation.
//!
//! The reporting side never writes to ledger tables. Reads take no locks;
//! stock-on-hand is an eventually-consistent snapshot.

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::entities::{
    sale::Entity as SaleEntity,
    sale_line::{self, Entity as SaleLineEntity},
    stock_batch::{self, Entity as StockBatchEntity},
    usage_record::{self, Entity as UsageRecordEntity},
};
use crate::errors::ServiceError;

/// Remaining quantity and cost of one open batch, FIFO order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchBalance {
    pub batch_id: i64,
    pub received_at: chrono::NaiveDate,
    pub unit_cost: Decimal,
    pub qty_in: Decimal,
    pub qty_out: Decimal,
    pub remaining: Decimal,
}

/// Revenue, cost and profit for one sale line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineProfit {
    pub sale_line_id: i64,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub revenue: Decimal,
    pub cost_of_goods: Decimal,
    pub profit: Decimal,
}

/// Profit summary for a whole sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleProfit {
    pub sale_id: i64,
    pub revenue: Decimal,
    pub cost_of_goods: Decimal,
    pub profit: Decimal,
    pub lines: Vec<LineProfit>,
}

/// Read-only aggregation over batches and usage records.
#[derive(Clone)]
pub struct ReportingService {
    db: Arc<DatabaseConnection>,
}

impl ReportingService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Stock on hand for `(product, variant)`: the sum of every batch's
    /// remaining quantity.
    #[instrument(skip(self))]
    pub async fn stock_on_hand(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
    ) -> Result<Decimal, ServiceError> {
        let batches = self.batches_for(product_id, variant_id).await?;
        Ok(batches.iter().map(stock_batch::Model::remaining).sum())
    }

    /// Open batches for `(product, variant)` in FIFO order, with their
    /// remaining quantities.
    #[instrument(skip(self))]
    pub async fn batch_balances(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
    ) -> Result<Vec<BatchBalance>, ServiceError> {
        let batches = self.batches_for(product_id, variant_id).await?;

        Ok(batches
            .into_iter()
            .filter(|batch| batch.is_available())
            .map(|batch| BatchBalance {
                batch_id: batch.id,
                received_at: batch.received_at,
                unit_cost: batch.unit_cost,
                qty_in: batch.qty_in,
                qty_out: batch.qty_out,
                remaining: batch.remaining(),
            })
            .collect())
    }

    /// Cost of goods sold for a whole sale.
    #[instrument(skip(self))]
    pub async fn sale_cost_of_goods(&self, sale_id: i64) -> Result<Decimal, ServiceError> {
        Ok(self.sale_profit(sale_id).await?.cost_of_goods)
    }

    /// Revenue, COGS and profit for a sale, broken down per line.
    #[instrument(skip(self))]
    pub async fn sale_profit(&self, sale_id: i64) -> Result<SaleProfit, ServiceError> {
        let db = &*self.db;

        let header = SaleEntity::find_by_id(sale_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("sale {} not found", sale_id)))?;

        let sale_lines = SaleLineEntity::find()
            .filter(sale_line::Column::SaleId.eq(sale_id))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut lines = Vec::with_capacity(sale_lines.len());
        let mut revenue = Decimal::ZERO;
        let mut cost_of_goods = Decimal::ZERO;

        for line in sale_lines {
            let records = UsageRecordEntity::find()
                .filter(usage_record::Column::SaleLineId.eq(line.id))
                .all(db)
                .await
                .map_err(ServiceError::db_error)?;

            let line_cost: Decimal = records.iter().map(usage_record::Model::cost).sum();

            revenue += line.subtotal;
            cost_of_goods += line_cost;
            lines.push(LineProfit {
                sale_line_id: line.id,
                product_id: line.product_id,
                variant_id: line.variant_id,
                revenue: line.subtotal,
                cost_of_goods: line_cost,
                profit: line.subtotal - line_cost,
            });
        }

        Ok(SaleProfit {
            sale_id: header.id,
            revenue,
            cost_of_goods,
            profit: revenue - cost_of_goods,
            lines,
        })
    }

    async fn batches_for(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
    ) -> Result<Vec<stock_batch::Model>, ServiceError> {
        let mut query =
            StockBatchEntity::find().filter(stock_batch::Column::ProductId.eq(product_id));

        query = match variant_id {
            Some(variant) => query.filter(stock_batch::Column::VariantId.eq(variant)),
            None => query.filter(stock_batch::Column::VariantId.is_null()),
        };

        query
            .order_by_asc(stock_batch::Column::ReceivedAt)
            .order_by_asc(stock_batch::Column::Id)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }
}
