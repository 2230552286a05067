use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, waiting for channel capacity.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Publishes without waiting; a full or closed channel drops the event with a warning.
    ///
    /// Used after a transaction has committed, where a lost notification must not fail the request.
    pub fn send_or_log(&self, event: Event) {
        if let Err(e) = self.sender.try_send(event) {
            warn!("Dropping event: {}", e);
        }
    }
}

/// Domain events published after state changes are committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // Cart events
    CartCreated { cart_id: Uuid, owner_id: Uuid },
    CartUpdated(Uuid),
    CartFinalized { cart_id: Uuid, order_id: Uuid },

    // Order events
    OrderCreated { order_id: Uuid, order_number: String },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },

    // Stock events
    StockDecremented {
        product_id: Uuid,
        quantity: i32,
        order_id: Uuid,
    },
    LineBackordered {
        product_id: Uuid,
        requested: i32,
        available: i32,
        order_id: Uuid,
    },
    StockAdjusted { product_id: Uuid, stock: i32 },

    // Catalogue events
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeleted(Uuid),
    ProductsImported { created: usize, updated: usize, failed: usize },
    CategoryCreated(Uuid),
    CategoryDeleted(Uuid),

    // Account events
    UserCreated { user_id: Uuid, role: String },
    UserActivationChanged { user_id: Uuid, is_active: bool },
    BrandingUpdated,
}

/// Creates an event channel of the given capacity.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Drains the channel until every sender is dropped, logging each event.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::LineBackordered {
                product_id,
                requested,
                available,
                order_id,
            } => warn!(
                %product_id,
                %order_id,
                requested,
                available,
                "Line exceeded stock and was backordered"
            ),
            Event::OrderCreated {
                order_id,
                order_number,
            } => info!(%order_id, %order_number, "Order created"),
            other => info!(event = ?other, "Event processed"),
        }
    }

    info!("Event processing loop stopped");
}
