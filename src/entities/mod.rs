pub mod purchase;
pub mod purchase_line;
pub mod sale;
pub mod sale_line;
pub mod stock_batch;
pub mod usage_record;
