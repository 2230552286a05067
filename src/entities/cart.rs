use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One product line of a cart.
///
/// `code`, `name`, `unit_price` and `stock_snapshot` are copied from the product when the
/// line is first added and are not refreshed afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub code: String,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub stock_snapshot: i32,
}

impl CartLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Ordered list of cart lines, stored as a JSON column.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct CartLines(pub Vec<CartLine>);

impl CartLines {
    /// Sum of `unit_price * quantity` over every line.
    pub fn total(&self) -> Decimal {
        self.0.iter().map(CartLine::line_total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CartLine> {
        self.0.iter()
    }

    pub fn find_mut(&mut self, product_id: Uuid) -> Option<&mut CartLine> {
        self.0.iter_mut().find(|line| line.product_id == product_id)
    }

    /// Removes the line for `product_id`, returning whether one existed.
    pub fn remove(&mut self, product_id: Uuid) -> bool {
        let before = self.0.len();
        self.0.retain(|line| line.product_id != product_id);
        self.0.len() != before
    }

    pub fn push(&mut self, line: CartLine) {
        self.0.push(line);
    }
}

/// Shopping cart entity
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "carts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub owner_id: Uuid,
    #[sea_orm(column_type = "Json")]
    pub items: CartLines,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub total: Decimal,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub is_finalized: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
