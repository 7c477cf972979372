//! Stock Ledger Library
//!
//! FIFO inventory costing: discrete stock batches are created when purchases
//! are received, consumed oldest-first by sales, and restored exactly when a
//! sale is edited or replaced. Cost of goods sold is snapshotted per
//! consumption, so it is immune to later cost edits.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
// `MigrationTrait` elides the `SchemaManager` lifetime in its definition, so
// impls must elide it too (E0195 under async_trait otherwise).
#[allow(elided_lifetimes_in_paths)]
pub mod migrator;
pub mod services;

pub use errors::ServiceError;
pub use events::{Event, EventSender};
