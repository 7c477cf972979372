use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_purchase_tables::Migration),
            Box::new(m20240101_000002_create_stock_batches_table::Migration),
            Box::new(m20240101_000003_create_sale_tables::Migration),
            Box::new(m20240101_000004_create_usage_records_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_purchase_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_purchase_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Purchases::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Purchases::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Purchases::Reference).string().null())
                        .col(ColumnDef::new(Purchases::PurchasedAt).date().not_null())
                        .col(
                            ColumnDef::new(Purchases::Total)
                                .decimal_len(19, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Purchases::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Purchases::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseLines::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(PurchaseLines::PurchaseId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseLines::ProductId).uuid().not_null())
                        .col(ColumnDef::new(PurchaseLines::VariantId).uuid().null())
                        .col(
                            ColumnDef::new(PurchaseLines::Qty)
                                .decimal_len(19, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseLines::UnitCost)
                                .decimal_len(19, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseLines::Subtotal)
                                .decimal_len(19, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseLines::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseLines::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_lines_purchase_id")
                                .from(PurchaseLines::Table, PurchaseLines::PurchaseId)
                                .to(Purchases::Table, Purchases::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_lines_purchase_id")
                        .table(PurchaseLines::Table)
                        .col(PurchaseLines::PurchaseId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PurchaseLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Purchases::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Purchases {
        Table,
        Id,
        Reference,
        PurchasedAt,
        Total,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum PurchaseLines {
        Table,
        Id,
        PurchaseId,
        ProductId,
        VariantId,
        Qty,
        UnitCost,
        Subtotal,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_stock_batches_table {

    use sea_orm_migration::prelude::*;

    use super::m20240101_000001_create_purchase_tables::PurchaseLines;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_stock_batches_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockBatches::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockBatches::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(StockBatches::ProductId).uuid().not_null())
                        .col(ColumnDef::new(StockBatches::VariantId).uuid().null())
                        .col(
                            ColumnDef::new(StockBatches::PurchaseLineId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockBatches::QtyIn)
                                .decimal_len(19, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockBatches::QtyOut)
                                .decimal_len(19, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockBatches::UnitCost)
                                .decimal_len(19, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockBatches::ReceivedAt).date().not_null())
                        .col(
                            ColumnDef::new(StockBatches::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockBatches::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_batches_purchase_line_id")
                                .from(StockBatches::Table, StockBatches::PurchaseLineId)
                                .to(PurchaseLines::Table, PurchaseLines::Id),
                        )
                        .to_owned(),
                )
                .await?;

            // Covering index for the FIFO scan: (product, variant, received_at, id)
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_batches_fifo")
                        .table(StockBatches::Table)
                        .col(StockBatches::ProductId)
                        .col(StockBatches::VariantId)
                        .col(StockBatches::ReceivedAt)
                        .col(StockBatches::Id)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_batches_purchase_line_id")
                        .table(StockBatches::Table)
                        .col(StockBatches::PurchaseLineId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockBatches::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum StockBatches {
        Table,
        Id,
        ProductId,
        VariantId,
        PurchaseLineId,
        QtyIn,
        QtyOut,
        UnitCost,
        ReceivedAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_sale_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_sale_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Sales::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Sales::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Sales::Reference).string().null())
                        .col(ColumnDef::new(Sales::SoldAt).date().not_null())
                        .col(
                            ColumnDef::new(Sales::Total)
                                .decimal_len(19, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Sales::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Sales::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SaleLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SaleLines::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(SaleLines::SaleId).big_integer().not_null())
                        .col(ColumnDef::new(SaleLines::ProductId).uuid().not_null())
                        .col(ColumnDef::new(SaleLines::VariantId).uuid().null())
                        .col(ColumnDef::new(SaleLines::Qty).decimal_len(19, 2).not_null())
                        .col(
                            ColumnDef::new(SaleLines::Price)
                                .decimal_len(19, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SaleLines::Discount)
                                .decimal_len(19, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SaleLines::Subtotal)
                                .decimal_len(19, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(SaleLines::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(SaleLines::UpdatedAt).timestamp().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sale_lines_sale_id")
                                .from(SaleLines::Table, SaleLines::SaleId)
                                .to(Sales::Table, Sales::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_sale_lines_sale_id")
                        .table(SaleLines::Table)
                        .col(SaleLines::SaleId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SaleLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Sales::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Sales {
        Table,
        Id,
        Reference,
        SoldAt,
        Total,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum SaleLines {
        Table,
        Id,
        SaleId,
        ProductId,
        VariantId,
        Qty,
        Price,
        Discount,
        Subtotal,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000004_create_usage_records_table {

    use sea_orm_migration::prelude::*;

    use super::m20240101_000002_create_stock_batches_table::StockBatches;
    use super::m20240101_000003_create_sale_tables::SaleLines;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_usage_records_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(UsageRecords::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(UsageRecords::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(UsageRecords::SaleLineId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(UsageRecords::StockBatchId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(UsageRecords::Qty)
                                .decimal_len(19, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(UsageRecords::UnitCost)
                                .decimal_len(19, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(UsageRecords::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_usage_records_sale_line_id")
                                .from(UsageRecords::Table, UsageRecords::SaleLineId)
                                .to(SaleLines::Table, SaleLines::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_usage_records_stock_batch_id")
                                .from(UsageRecords::Table, UsageRecords::StockBatchId)
                                .to(StockBatches::Table, StockBatches::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_usage_records_sale_line_id")
                        .table(UsageRecords::Table)
                        .col(UsageRecords::SaleLineId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_usage_records_stock_batch_id")
                        .table(UsageRecords::Table)
                        .col(UsageRecords::StockBatchId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(UsageRecords::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum UsageRecords {
        Table,
        Id,
        SaleLineId,
        StockBatchId,
        Qty,
        UnitCost,
        CreatedAt,
    }
}
