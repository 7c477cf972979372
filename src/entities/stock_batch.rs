use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One discrete lot of stock received at a specific time and unit cost.
///
/// Mutated only by allocation (`qty_out` increases) and reversal (`qty_out`
/// decreases). `0 <= qty_out <= qty_in` holds at all times. FIFO consumption
/// order is `(received_at ASC, id ASC)`; the id tie-break makes the order
/// deterministic for batches received on the same date.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_batches")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub purchase_line_id: i64,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub qty_in: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub qty_out: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub unit_cost: Decimal,
    pub received_at: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::purchase_line::Entity",
        from = "Column::PurchaseLineId",
        to = "super::purchase_line::Column::Id"
    )]
    PurchaseLine,
    #[sea_orm(has_many = "super::usage_record::Entity")]
    UsageRecords,
}

impl Related<super::purchase_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseLine.def()
    }
}

impl Related<super::usage_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UsageRecords.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Quantity not yet consumed by any sale.
    pub fn remaining(&self) -> Decimal {
        self.qty_in - self.qty_out
    }

    /// A batch is available while any quantity remains.
    pub fn is_available(&self) -> bool {
        self.remaining() > Decimal::ZERO
    }

    /// Whether any consumption has ever been recorded against this batch.
    pub fn is_consumed(&self) -> bool {
        self.qty_out > Decimal::ZERO
    }
}
