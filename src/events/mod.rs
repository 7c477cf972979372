use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the ledger after a successful commit.
///
/// `BatchesChanged` is the cache-invalidation signal: any layer caching
/// stock-on-hand for a product subscribes to it instead of hooking into
/// entity save/delete. Events are never emitted for rolled-back transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Purchase events
    PurchaseRecorded {
        purchase_id: i64,
        total: Decimal,
    },
    PurchaseUpdated(i64),
    PurchaseDeleted(i64),
    BatchReceived {
        batch_id: i64,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        qty: Decimal,
    },

    // Sale events
    SaleCreated {
        sale_id: i64,
        total: Decimal,
    },
    SaleUpdated(i64),
    StockAllocated {
        sale_line_id: i64,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        qty: Decimal,
        batch_ids: Vec<i64>,
    },
    StockReversed {
        sale_line_id: i64,
    },

    // Cache invalidation signal
    BatchesChanged {
        product_id: Uuid,
        variant_id: Option<Uuid>,
    },
}

/// Cloneable handle for emitting ledger events.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, failing if the channel is closed or full.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when delivery is
    /// impossible. Used after commit, where the ledger mutation has already
    /// succeeded and must not be reported as failed.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "Dropped ledger event");
        }
    }
}

/// Consumes ledger events and logs them. Cache layers and reporting
/// subscribers plug in here.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting ledger event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::BatchesChanged {
                product_id,
                variant_id,
            } => {
                info!(
                    product_id = %product_id,
                    variant_id = ?variant_id,
                    "Batches changed"
                );
            }
            Event::StockAllocated {
                sale_line_id,
                qty,
                batch_ids,
                ..
            } => {
                info!(
                    sale_line_id = %sale_line_id,
                    qty = %qty,
                    batches = batch_ids.len(),
                    "Stock allocated"
                );
            }
            other => match serde_json::to_string(other) {
                Ok(payload) => info!(%payload, "Ledger event"),
                Err(e) => warn!(error = %e, "Unserializable ledger event"),
            },
        }
    }

    info!("Ledger event processing loop stopped");
}
