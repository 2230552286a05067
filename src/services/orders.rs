use super::page_index;
use crate::{
    auth::Session,
    entities::{
        order::{self, OrderStatus},
        user::Role,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, Iterable, PaginatorTrait,
    QueryFilter, QueryOrder, Select, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Role-scoped access to orders.
///
/// Customers see their own orders, sellers see the orders placed for them and staff see
/// everything. Orders outside the caller's scope behave as if they did not exist.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusInput {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub status: OrderStatus,
    pub count: u64,
    pub total: Decimal,
}

/// Totals over the orders visible to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReport {
    pub by_status: Vec<StatusSummary>,
    pub order_count: u64,
    pub total_value: Decimal,
}

impl OrderReport {
    pub fn from_orders<'a>(orders: impl IntoIterator<Item = &'a order::Model>) -> Self {
        let mut by_status: Vec<StatusSummary> = OrderStatus::iter()
            .map(|status| StatusSummary {
                status,
                count: 0,
                total: Decimal::ZERO,
            })
            .collect();

        for order in orders {
            if let Some(summary) = by_status.iter_mut().find(|s| s.status == order.status) {
                summary.count += 1;
                summary.total += order.total;
            }
        }

        Self {
            order_count: by_status.iter().map(|s| s.count).sum(),
            total_value: by_status.iter().map(|s| s.total).sum(),
            by_status,
        }
    }
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    fn scoped(session: &Session) -> Select<order::Entity> {
        let query = order::Entity::find();
        match session.role {
            Role::Master | Role::Admin => query,
            Role::Seller => query.filter(order::Column::SellerId.eq(session.user_id)),
            Role::Customer => query.filter(order::Column::OwnerId.eq(session.user_id)),
        }
    }

    /// Lists visible orders, newest first. Returns the page and the total count.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn list(
        &self,
        session: &Session,
        status: Option<OrderStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let mut query = Self::scoped(session);
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::OrderNumber)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page_index(page)).await?;

        Ok((orders, total))
    }

    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn get(&self, session: &Session, id: Uuid) -> Result<order::Model, ServiceError> {
        Self::scoped(session)
            .filter(order::Column::Id.eq(id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))
    }

    /// Moves an order to `new_status`. Staff only.
    ///
    /// Allowed: pending to processing or cancelled, processing to completed or cancelled.
    /// Completing an order stamps `completed_at`.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn update_status(
        &self,
        session: &Session,
        id: Uuid,
        new_status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        session.require_staff()?;

        let order = order::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;

        let old_status = order.status;
        if !old_status.can_transition_to(new_status) {
            return Err(ServiceError::InvalidStatus(format!(
                "Cannot move order {} from {} to {}",
                order.order_number, old_status, new_status
            )));
        }

        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status);
        if new_status == OrderStatus::Completed {
            active.completed_at = Set(Some(Utc::now()));
        }
        let order = active.update(&*self.db).await?;

        self.event_sender.send_or_log(Event::OrderStatusChanged {
            order_id: order.id,
            old_status: old_status.to_string(),
            new_status: new_status.to_string(),
        });
        info!(order_id = %order.id, from = %old_status, to = %new_status, "Order status changed");

        Ok(order)
    }

    /// Count and value of the visible orders per status.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn report(&self, session: &Session) -> Result<OrderReport, ServiceError> {
        let orders = Self::scoped(session).all(&*self.db).await?;
        Ok(OrderReport::from_orders(&orders))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::order::OrderLines;
    use rust_decimal_macros::dec;

    fn order(status: OrderStatus, total: Decimal) -> order::Model {
        order::Model {
            id: Uuid::new_v4(),
            order_number: "2026100001".into(),
            owner_id: Uuid::new_v4(),
            seller_id: None,
            items: OrderLines::default(),
            total,
            status,
            notes: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn report_groups_by_status() {
        let orders = vec![
            order(OrderStatus::Pending, dec!(30.00)),
            order(OrderStatus::Pending, dec!(10.00)),
            order(OrderStatus::Completed, dec!(100.00)),
        ];
        let report = OrderReport::from_orders(&orders);

        assert_eq!(report.order_count, 3);
        assert_eq!(report.total_value, dec!(140.00));
        assert_eq!(report.by_status.len(), 4);

        let pending = &report.by_status[0];
        assert_eq!(pending.status, OrderStatus::Pending);
        assert_eq!(pending.count, 2);
        assert_eq!(pending.total, dec!(40.00));

        let cancelled = report
            .by_status
            .iter()
            .find(|s| s.status == OrderStatus::Cancelled)
            .unwrap();
        assert_eq!(cancelled.count, 0);
    }
}
