mod common;

use assert_matches::assert_matches;
use common::TestApp;
use portal_api::{
    auth::Session,
    entities::{
        order::{self, OrderStatus},
        user::{self, Role},
    },
    errors::ServiceError,
    services::{cart::AddToCartInput, checkout::CheckoutInput},
};
use rust_decimal_macros::dec;
use uuid::Uuid;

struct Fixture {
    app: TestApp,
    admin: user::Model,
    seller: user::Model,
    other_seller: user::Model,
    alice: user::Model,
    bob: user::Model,
    carol: user::Model,
}

impl Fixture {
    /// Alice and Bob buy through `seller`, Carol through `other_seller`.
    async fn new() -> Self {
        let app = TestApp::new().await;
        let admin = app.seed_user("admin@example.com", Role::Admin, None).await;
        let seller = app.seed_user("seller@example.com", Role::Seller, None).await;
        let other_seller = app.seed_user("seller2@example.com", Role::Seller, None).await;
        let alice = app
            .seed_user("alice@example.com", Role::Customer, Some(seller.id))
            .await;
        let bob = app
            .seed_user("bob@example.com", Role::Customer, Some(seller.id))
            .await;
        let carol = app
            .seed_user("carol@example.com", Role::Customer, Some(other_seller.id))
            .await;

        Self {
            app,
            admin,
            seller,
            other_seller,
            alice,
            bob,
            carol,
        }
    }

    fn session(&self, user: &user::Model) -> Session {
        self.app.session(user)
    }

    async fn place_order(&self, customer: &user::Model, quantity: i32) -> order::Model {
        let product = self
            .app
            .seed_product(&format!("P-{}", Uuid::new_v4()), dec!(10.00), 100)
            .await;
        self.app
            .state
            .services
            .cart
            .add_item(
                customer.id,
                AddToCartInput {
                    product_id: product.id,
                    quantity,
                },
            )
            .await
            .unwrap();
        self.app
            .state
            .services
            .checkout
            .checkout(&self.session(customer), CheckoutInput::default())
            .await
            .unwrap()
            .order
    }
}

#[tokio::test]
async fn listing_is_scoped_by_role() {
    let fx = Fixture::new().await;
    let a = fx.place_order(&fx.alice, 1).await;
    let b = fx.place_order(&fx.bob, 2).await;
    let c = fx.place_order(&fx.carol, 3).await;
    let orders = &fx.app.state.services.orders;

    let ids = |list: Vec<order::Model>| {
        let mut ids: Vec<Uuid> = list.into_iter().map(|o| o.id).collect();
        ids.sort();
        ids
    };
    let sorted = |mut v: Vec<Uuid>| {
        v.sort();
        v
    };

    let (alice_orders, total) = orders.list(&fx.session(&fx.alice), None, 1, 20).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(ids(alice_orders), vec![a.id]);

    let (seller_orders, total) = orders.list(&fx.session(&fx.seller), None, 1, 20).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(ids(seller_orders), sorted(vec![a.id, b.id]));

    let (other_orders, _) = orders
        .list(&fx.session(&fx.other_seller), None, 1, 20)
        .await
        .unwrap();
    assert_eq!(ids(other_orders), vec![c.id]);

    let (all, total) = orders.list(&fx.session(&fx.admin), None, 1, 20).await.unwrap();
    assert_eq!(total, 3);
    assert_eq!(ids(all), sorted(vec![a.id, b.id, c.id]));
}

#[tokio::test]
async fn listing_paginates_and_filters_by_status() {
    let fx = Fixture::new().await;
    for _ in 0..3 {
        fx.place_order(&fx.alice, 1).await;
    }
    let orders = &fx.app.state.services.orders;
    let admin = fx.session(&fx.admin);

    let (page, total) = orders.list(&admin, None, 2, 2).await.unwrap();
    assert_eq!(total, 3);
    assert_eq!(page.len(), 1);

    let (pending, total) = orders
        .list(&admin, Some(OrderStatus::Pending), 1, 20)
        .await
        .unwrap();
    assert_eq!(total, 3);
    assert_eq!(pending.len(), 3);

    let (completed, total) = orders
        .list(&admin, Some(OrderStatus::Completed), 1, 20)
        .await
        .unwrap();
    assert_eq!(total, 0);
    assert!(completed.is_empty());
}

#[tokio::test]
async fn out_of_scope_orders_are_not_found() {
    let fx = Fixture::new().await;
    let carols = fx.place_order(&fx.carol, 1).await;
    let orders = &fx.app.state.services.orders;

    assert_matches!(
        orders.get(&fx.session(&fx.alice), carols.id).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        orders.get(&fx.session(&fx.seller), carols.id).await,
        Err(ServiceError::NotFound(_))
    );
    assert_eq!(
        orders
            .get(&fx.session(&fx.other_seller), carols.id)
            .await
            .unwrap()
            .id,
        carols.id
    );
}

#[tokio::test]
async fn status_follows_the_allowed_transitions() {
    let fx = Fixture::new().await;
    let placed = fx.place_order(&fx.alice, 1).await;
    let orders = &fx.app.state.services.orders;
    let admin = fx.session(&fx.admin);

    assert_matches!(
        orders
            .update_status(&admin, placed.id, OrderStatus::Completed)
            .await,
        Err(ServiceError::InvalidStatus(_))
    );

    let processing = orders
        .update_status(&admin, placed.id, OrderStatus::Processing)
        .await
        .unwrap();
    assert_eq!(processing.status, OrderStatus::Processing);
    assert!(processing.completed_at.is_none());

    let completed = orders
        .update_status(&admin, placed.id, OrderStatus::Completed)
        .await
        .unwrap();
    assert_eq!(completed.status, OrderStatus::Completed);
    assert!(completed.completed_at.is_some());

    assert_matches!(
        orders
            .update_status(&admin, placed.id, OrderStatus::Cancelled)
            .await,
        Err(ServiceError::InvalidStatus(_))
    );
}

#[tokio::test]
async fn only_staff_change_status() {
    let fx = Fixture::new().await;
    let placed = fx.place_order(&fx.alice, 1).await;
    let orders = &fx.app.state.services.orders;

    for user in [&fx.alice, &fx.seller] {
        assert_matches!(
            orders
                .update_status(&fx.session(user), placed.id, OrderStatus::Processing)
                .await,
            Err(ServiceError::Forbidden(_))
        );
    }
    assert_matches!(
        orders
            .update_status(&fx.session(&fx.admin), Uuid::new_v4(), OrderStatus::Processing)
            .await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn report_summarises_the_scoped_orders() {
    let fx = Fixture::new().await;
    let first = fx.place_order(&fx.alice, 1).await;
    fx.place_order(&fx.bob, 2).await;
    fx.place_order(&fx.carol, 4).await;
    let orders = &fx.app.state.services.orders;
    let admin = fx.session(&fx.admin);

    orders
        .update_status(&admin, first.id, OrderStatus::Cancelled)
        .await
        .unwrap();

    let report = orders.report(&admin).await.unwrap();
    assert_eq!(report.order_count, 3);
    assert_eq!(report.total_value, dec!(70.00));
    let pending = report
        .by_status
        .iter()
        .find(|s| s.status == OrderStatus::Pending)
        .unwrap();
    assert_eq!(pending.count, 2);
    assert_eq!(pending.total, dec!(60.00));
    let cancelled = report
        .by_status
        .iter()
        .find(|s| s.status == OrderStatus::Cancelled)
        .unwrap();
    assert_eq!(cancelled.count, 1);
    assert_eq!(cancelled.total, dec!(10.00));

    let seller_report = orders.report(&fx.session(&fx.seller)).await.unwrap();
    assert_eq!(seller_report.order_count, 2);
    assert_eq!(seller_report.total_value, dec!(30.00));
}
