use crate::{
    auth::Session,
    config::{AppConfig, OverStockPolicy},
    entities::{
        cart,
        order::{self, OrderLine, OrderLines, OrderStatus},
        product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Checkout service for converting carts to orders.
///
/// Checkout runs in a single database transaction:
///
/// 1. the cart is loaded and must be active and non-empty;
/// 2. an order number is assigned from the monthly sequence;
/// 3. stock is decremented for every line whose quantity is on hand, with a
///    compare-and-set update so concurrent checkouts never oversell;
/// 4. the order is inserted with a snapshot of the lines;
/// 5. the cart is marked finalized.
///
/// Lines that ask for more than is on hand follow the configured [`OverStockPolicy`].
/// Any failure rolls the whole checkout back.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

/// Checkout request
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CheckoutInput {
    /// Cart to check out; defaults to the caller's active cart.
    pub cart_id: Option<Uuid>,
    /// Order notes; defaults to the notes saved on the cart.
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// A line that could not be served from stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackorderedLine {
    pub product_id: Uuid,
    pub requested: i32,
    pub available: i32,
}

/// Result of a successful checkout
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOutcome {
    pub order: order::Model,
    pub cart_id: Uuid,
    pub backordered: Vec<BackorderedLine>,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            event_sender,
            config,
        }
    }

    pub fn over_stock_policy(&self) -> OverStockPolicy {
        self.config.checkout.over_stock_policy
    }

    /// Converts the caller's cart into a pending order.
    ///
    /// # Errors
    ///
    /// * `ServiceError::NotFound` - no such cart for the caller, or a line's product is gone
    /// * `ServiceError::InvalidOperation` - the cart was already checked out
    /// * `ServiceError::ValidationError` - the cart has no lines
    /// * `ServiceError::InsufficientStock` - a line exceeds stock under the `reject` policy
    /// * `ServiceError::Conflict` - a concurrent checkout took the same order number
    #[instrument(skip(self, session), fields(owner_id = %session.user_id))]
    pub async fn checkout(
        &self,
        session: &Session,
        input: CheckoutInput,
    ) -> Result<CheckoutOutcome, ServiceError> {
        input.validate()?;
        let policy = self.over_stock_policy();

        let txn = self.db.begin().await?;

        let cart = Self::load_cart(&txn, session.user_id, input.cart_id).await?;
        if cart.is_finalized {
            return Err(ServiceError::InvalidOperation(format!(
                "Cart {} has already been checked out",
                cart.id
            )));
        }
        if cart.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "Cannot check out an empty cart".to_string(),
            ));
        }

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order_number = Self::next_order_number(&txn, now).await?;

        let mut lines = Vec::with_capacity(cart.items.len());
        let mut decremented = Vec::new();
        let mut backordered = Vec::new();

        for line in cart.items.iter() {
            if Self::decrement_stock(&txn, line.product_id, line.quantity, now).await? {
                decremented.push((line.product_id, line.quantity));
                lines.push(OrderLine::from_cart_line(line, false));
                continue;
            }

            // The guarded decrement is the only stock check, so a concurrent checkout that
            // took the stock first lands here like any other over-stock line.
            let product = product::Entity::find_by_id(line.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "Product {} ({}) no longer exists",
                        line.name, line.product_id
                    ))
                })?;

            match policy {
                OverStockPolicy::Reject => {
                    return Err(ServiceError::InsufficientStock(format!(
                        "{} has {} in stock, {} requested",
                        product.code, product.stock, line.quantity
                    )));
                }
                OverStockPolicy::Backorder => {
                    backordered.push(BackorderedLine {
                        product_id: product.id,
                        requested: line.quantity,
                        available: product.stock,
                    });
                    lines.push(OrderLine::from_cart_line(line, true));
                }
            }
        }

        let lines = OrderLines(lines);
        let notes = input
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .or_else(|| cart.notes.clone());

        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.clone()),
            owner_id: Set(session.user_id),
            seller_id: Set(session.seller_id),
            total: Set(lines.total()),
            items: Set(lines),
            status: Set(OrderStatus::Pending),
            notes: Set(notes),
            created_at: Set(now),
            completed_at: Set(None),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            ServiceError::from_write(e, || {
                format!("Order number {} was taken by a concurrent checkout", order_number)
            })
        })?;

        // Guarded on `is_finalized = false` so two checkouts of one cart cannot both commit.
        let finalized = cart::Entity::update_many()
            .col_expr(cart::Column::IsFinalized, Expr::value(true))
            .col_expr(cart::Column::UpdatedAt, Expr::value(now))
            .filter(cart::Column::Id.eq(cart.id))
            .filter(cart::Column::IsFinalized.eq(false))
            .exec(&txn)
            .await?;
        if finalized.rows_affected == 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "Cart {} has already been checked out",
                cart.id
            )));
        }

        txn.commit().await?;

        for (product_id, quantity) in decremented {
            self.event_sender.send_or_log(Event::StockDecremented {
                product_id,
                quantity,
                order_id,
            });
        }
        for line in &backordered {
            warn!(
                product_id = %line.product_id,
                requested = line.requested,
                available = line.available,
                "Line exceeds stock; stock left unchanged"
            );
            self.event_sender.send_or_log(Event::LineBackordered {
                product_id: line.product_id,
                requested: line.requested,
                available: line.available,
                order_id,
            });
        }
        self.event_sender.send_or_log(Event::OrderCreated {
            order_id,
            order_number: order.order_number.clone(),
        });
        self.event_sender.send_or_log(Event::CartFinalized {
            cart_id: cart.id,
            order_id,
        });

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total,
            "Checkout completed"
        );

        Ok(CheckoutOutcome {
            order,
            cart_id: cart.id,
            backordered,
        })
    }

    async fn load_cart<C>(
        conn: &C,
        owner_id: Uuid,
        cart_id: Option<Uuid>,
    ) -> Result<cart::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        let query = cart::Entity::find().filter(cart::Column::OwnerId.eq(owner_id));
        let cart = match cart_id {
            Some(id) => query.filter(cart::Column::Id.eq(id)).one(conn).await?,
            None => {
                query
                    .filter(cart::Column::IsFinalized.eq(false))
                    .order_by_desc(cart::Column::CreatedAt)
                    .one(conn)
                    .await?
            }
        };

        cart.ok_or_else(|| match cart_id {
            Some(id) => ServiceError::NotFound(format!("Cart {} not found", id)),
            None => ServiceError::NotFound("No active cart".to_string()),
        })
    }

    /// Decrements stock only while it still covers `quantity`; returns whether it did.
    pub(crate) async fn decrement_stock<C>(
        conn: &C,
        product_id: Uuid,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError>
    where
        C: ConnectionTrait,
    {
        let result = product::Entity::update_many()
            .col_expr(
                product::Column::Stock,
                Expr::col(product::Column::Stock).sub(quantity),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(now))
            .filter(product::Column::Id.eq(product_id))
            .filter(product::Column::Stock.gte(quantity))
            .exec(conn)
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn next_order_number<C>(conn: &C, now: DateTime<Utc>) -> Result<String, ServiceError>
    where
        C: ConnectionTrait,
    {
        let prefix = order_number_prefix(now);
        let existing = order::Entity::find()
            .filter(order::Column::OrderNumber.starts_with(prefix.as_str()))
            .count(conn)
            .await?;
        Ok(format_order_number(&prefix, existing + 1))
    }
}

/// `YYYYMM` of the month an order is placed in.
pub fn order_number_prefix(now: DateTime<Utc>) -> String {
    now.format("%Y%m").to_string()
}

/// Order number for the `sequence`-th order of the month, zero padded to four digits.
pub fn format_order_number(prefix: &str, sequence: u64) -> String {
    format!("{}{:04}", prefix, sequence)
}
