use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Audit/undo entry linking a sale line to one batch it consumed.
///
/// `unit_cost` is copied from the batch at consumption time, so recorded
/// cost of goods sold is a point-in-time snapshot, immune to later cost
/// edits. For a committed sale line the record quantities sum to exactly
/// the line quantity.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "usage_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub sale_line_id: i64,
    pub stock_batch_id: i64,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub qty: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub unit_cost: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sale_line::Entity",
        from = "Column::SaleLineId",
        to = "super::sale_line::Column::Id"
    )]
    SaleLine,
    #[sea_orm(
        belongs_to = "super::stock_batch::Entity",
        from = "Column::StockBatchId",
        to = "super::stock_batch::Column::Id"
    )]
    StockBatch,
}

impl Related<super::sale_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SaleLine.def()
    }
}

impl Related<super::stock_batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockBatch.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Cost contribution of this consumption: `qty * unit_cost`.
    pub fn cost(&self) -> Decimal {
        self.qty * self.unit_cost
    }
}
