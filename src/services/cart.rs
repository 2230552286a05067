use crate::{
    entities::{
        cart::{self, CartLine, CartLines},
        product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Shopping cart service.
///
/// Each owner has at most one active (non-finalized) cart, created lazily by
/// [`CartService::get_or_create`]. Lines are kept in insertion order and the cart total is
/// recomputed from the lines on every mutation, so `total == Σ unit_price × quantity` holds
/// for every stored cart.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: i32 = 100_000;

/// Input for adding a product to the cart
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddToCartInput {
    pub product_id: Uuid,
    #[validate(range(
        min = 1,
        max = 100000,
        message = "Quantity must be between 1 and 100000"
    ))]
    pub quantity: i32,
}

/// Input for changing the quantity of a line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateQuantityInput {
    pub quantity: i32,
}

/// Input for the free-text cart notes
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SaveNotesInput {
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// A cart line joined with the product's current state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLineView {
    pub product_id: Uuid,
    pub code: String,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    /// Current stock, or the snapshot taken when the line was added if the product is gone.
    pub stock: i32,
    pub line_total: Decimal,
    /// The line asks for more than is on hand and will be treated as a quote at checkout.
    pub exceeds_stock: bool,
    pub product_available: bool,
}

/// Cart as shown to its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartView {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub items: Vec<CartLineView>,
    pub total: Decimal,
    pub notes: Option<String>,
    pub is_finalized: bool,
    pub updated_at: DateTime<Utc>,
}

impl CartService {
    /// Creates a new `CartService` instance.
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Returns the owner's newest active cart, creating an empty one when there is none.
    #[instrument(skip(self))]
    pub async fn get_or_create(&self, owner_id: Uuid) -> Result<cart::Model, ServiceError> {
        let (cart, created) = Self::get_or_create_in(&*self.db, owner_id).await?;
        if created {
            self.publish_created(&cart);
        }
        Ok(cart)
    }

    /// Returns the cart with every line enriched with the product's current code and stock.
    ///
    /// Lines whose product has been deleted keep their snapshot values and are flagged with
    /// `product_available = false`.
    #[instrument(skip(self))]
    pub async fn view(&self, owner_id: Uuid) -> Result<CartView, ServiceError> {
        let cart = self.get_or_create(owner_id).await?;

        let product_ids: Vec<Uuid> = cart.items.iter().map(|line| line.product_id).collect();
        let products: HashMap<Uuid, product::Model> = if product_ids.is_empty() {
            HashMap::new()
        } else {
            product::Entity::find()
                .filter(product::Column::Id.is_in(product_ids))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|p| (p.id, p))
                .collect()
        };

        let items = cart
            .items
            .iter()
            .map(|line| enrich_line(line, products.get(&line.product_id)))
            .collect();

        Ok(CartView {
            id: cart.id,
            owner_id: cart.owner_id,
            items,
            total: cart.total,
            notes: cart.notes,
            is_finalized: cart.is_finalized,
            updated_at: cart.updated_at,
        })
    }

    /// Adds a product to the cart or increases the quantity of its existing line.
    ///
    /// A new line snapshots the product's code, name, price and stock at the time of adding.
    ///
    /// # Errors
    ///
    /// * `ServiceError::ValidationError` - quantity below 1, or the line would exceed
    ///   [`MAX_LINE_QUANTITY`]
    /// * `ServiceError::NotFound` - the product does not exist
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        owner_id: Uuid,
        input: AddToCartInput,
    ) -> Result<cart::Model, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;
        let (cart, created) = Self::get_or_create_in(&txn, owner_id).await?;

        let product = product::Entity::find_by_id(input.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        let mut lines = cart.items.clone();
        match lines.find_mut(product.id) {
            Some(line) => {
                line.quantity = line
                    .quantity
                    .checked_add(input.quantity)
                    .filter(|quantity| *quantity <= MAX_LINE_QUANTITY)
                    .ok_or_else(quantity_too_large)?;
            }
            None => lines.push(CartLine {
                product_id: product.id,
                code: product.code.clone(),
                name: product.name.clone(),
                unit_price: product.price,
                quantity: input.quantity,
                stock_snapshot: product.stock,
            }),
        }

        let cart = Self::save_lines(&txn, cart, lines).await?;
        txn.commit().await?;

        if created {
            self.publish_created(&cart);
        }
        self.event_sender.send_or_log(Event::CartUpdated(cart.id));

        info!(cart_id = %cart.id, product_id = %product.id, "Added product to cart");
        Ok(cart)
    }

    /// Sets the quantity of a line; `0` removes it.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        owner_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<cart::Model, ServiceError> {
        if quantity < 0 {
            return Err(ServiceError::ValidationError(
                "Quantity cannot be negative".to_string(),
            ));
        }
        if quantity > MAX_LINE_QUANTITY {
            return Err(quantity_too_large());
        }

        let txn = self.db.begin().await?;
        let (cart, _) = Self::get_or_create_in(&txn, owner_id).await?;

        let mut lines = cart.items.clone();
        if quantity == 0 {
            if !lines.remove(product_id) {
                return Err(line_not_found(product_id));
            }
        } else {
            let line = lines
                .find_mut(product_id)
                .ok_or_else(|| line_not_found(product_id))?;
            line.quantity = quantity;
        }

        let cart = Self::save_lines(&txn, cart, lines).await?;
        txn.commit().await?;

        self.event_sender.send_or_log(Event::CartUpdated(cart.id));
        Ok(cart)
    }

    /// Removes the line for `product_id`.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        owner_id: Uuid,
        product_id: Uuid,
    ) -> Result<cart::Model, ServiceError> {
        self.update_quantity(owner_id, product_id, 0).await
    }

    /// Empties the cart, keeping its notes.
    #[instrument(skip(self))]
    pub async fn clear(&self, owner_id: Uuid) -> Result<cart::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let (cart, _) = Self::get_or_create_in(&txn, owner_id).await?;
        let cart = Self::save_lines(&txn, cart, CartLines::default()).await?;
        txn.commit().await?;

        self.event_sender.send_or_log(Event::CartUpdated(cart.id));
        Ok(cart)
    }

    /// Stores the cart notes; blank notes are cleared.
    #[instrument(skip(self, input))]
    pub async fn save_notes(
        &self,
        owner_id: Uuid,
        input: SaveNotesInput,
    ) -> Result<cart::Model, ServiceError> {
        input.validate()?;
        let notes = input
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let txn = self.db.begin().await?;
        let (cart, _) = Self::get_or_create_in(&txn, owner_id).await?;
        let mut active: cart::ActiveModel = cart.into();
        active.notes = Set(notes);
        active.updated_at = Set(Utc::now());
        let cart = active.update(&txn).await?;
        txn.commit().await?;

        Ok(cart)
    }

    /// Finds the newest active cart of `owner_id` on `conn`, inserting one if needed.
    ///
    /// Returns the cart and whether it was created.
    pub(crate) async fn get_or_create_in<C>(
        conn: &C,
        owner_id: Uuid,
    ) -> Result<(cart::Model, bool), ServiceError>
    where
        C: ConnectionTrait,
    {
        if let Some(cart) = Self::find_active_in(conn, owner_id).await? {
            return Ok((cart, false));
        }

        let now = Utc::now();
        let cart = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(owner_id),
            items: Set(CartLines::default()),
            total: Set(Decimal::ZERO),
            notes: Set(None),
            is_finalized: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await?;

        Ok((cart, true))
    }

    pub(crate) async fn find_active_in<C>(
        conn: &C,
        owner_id: Uuid,
    ) -> Result<Option<cart::Model>, ServiceError>
    where
        C: ConnectionTrait,
    {
        Ok(cart::Entity::find()
            .filter(cart::Column::OwnerId.eq(owner_id))
            .filter(cart::Column::IsFinalized.eq(false))
            .order_by_desc(cart::Column::CreatedAt)
            .one(conn)
            .await?)
    }

    async fn save_lines<C>(
        conn: &C,
        cart: cart::Model,
        lines: CartLines,
    ) -> Result<cart::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        let total = lines.total();
        let mut active: cart::ActiveModel = cart.into();
        active.items = Set(lines);
        active.total = Set(total);
        active.updated_at = Set(Utc::now());
        Ok(active.update(conn).await?)
    }

    fn publish_created(&self, cart: &cart::Model) {
        self.event_sender.send_or_log(Event::CartCreated {
            cart_id: cart.id,
            owner_id: cart.owner_id,
        });
    }
}

fn quantity_too_large() -> ServiceError {
    ServiceError::ValidationError(format!(
        "A cart line cannot hold more than {} units",
        MAX_LINE_QUANTITY
    ))
}

fn line_not_found(product_id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("Product {} is not in the cart", product_id))
}

fn enrich_line(line: &CartLine, product: Option<&product::Model>) -> CartLineView {
    let (code, stock) = match product {
        Some(p) => (p.code.clone(), p.stock),
        None => (line.code.clone(), line.stock_snapshot),
    };

    CartLineView {
        product_id: line.product_id,
        code,
        name: line.name.clone(),
        unit_price: line.unit_price,
        quantity: line.quantity,
        stock,
        line_total: line.line_total(),
        exceeds_stock: line.quantity > stock,
        product_available: product.is_some(),
    }
}
