use super::cart::CartLine;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order lifecycle status.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Pending, Cancelled) | (Processing, Completed) | (Processing, Cancelled)
        )
    }
}

/// Snapshot of a cart line taken at checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub code: String,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub stock_snapshot: i32,
    /// Quantity exceeded stock at checkout; stock was left untouched.
    #[serde(default)]
    pub backordered: bool,
}

impl OrderLine {
    pub fn from_cart_line(line: &CartLine, backordered: bool) -> Self {
        Self {
            product_id: line.product_id,
            code: line.code.clone(),
            name: line.name.clone(),
            unit_price: line.unit_price,
            quantity: line.quantity,
            stock_snapshot: line.stock_snapshot,
            backordered,
        }
    }

    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct OrderLines(pub Vec<OrderLine>);

impl OrderLines {
    pub fn total(&self) -> Decimal {
        self.0.iter().map(OrderLine::line_total).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OrderLine> {
        self.0.iter()
    }

    pub fn backordered(&self) -> impl Iterator<Item = &OrderLine> {
        self.0.iter().filter(|line| line.backordered)
    }
}

/// The `orders` table.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Human-facing number, `YYYYMM` followed by a four digit monthly sequence.
    #[sea_orm(unique)]
    pub order_number: String,
    pub owner_id: Uuid,
    #[sea_orm(nullable)]
    pub seller_id: Option<Uuid>,
    #[sea_orm(column_type = "Json")]
    pub items: OrderLines,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub total: Decimal,
    pub status: OrderStatus,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    #[sea_orm(nullable)]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn allowed_transitions() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Cancelled));
    }

    #[test]
    fn rejected_transitions() {
        use OrderStatus::*;
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Cancelled.can_transition_to(Pending));
    }

    #[test]
    fn order_line_keeps_cart_snapshot() {
        let cart_line = CartLine {
            product_id: Uuid::new_v4(),
            code: "B-7".into(),
            name: "Bolt".into(),
            unit_price: dec!(20.00),
            quantity: 5,
            stock_snapshot: 2,
        };
        let line = OrderLine::from_cart_line(&cart_line, true);
        assert_eq!(line.line_total(), dec!(100.00));
        assert!(line.backordered);
        assert_eq!(OrderLines(vec![line]).backordered().count(), 1);
    }
}
