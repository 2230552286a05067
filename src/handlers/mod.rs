pub mod auth;
pub mod branding;
pub mod carts;
pub mod categories;
pub mod common;
pub mod orders;
pub mod products;
pub mod users;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    BrandingService, CartService, CategoryService, CheckoutService, OrderService, ProductService,
    UserService,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub products: Arc<ProductService>,
    pub categories: Arc<CategoryService>,
    pub users: Arc<UserService>,
    pub branding: Arc<BrandingService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            cart: Arc::new(CartService::new(db_pool.clone(), event_sender.clone())),
            checkout: Arc::new(CheckoutService::new(
                db_pool.clone(),
                event_sender.clone(),
                config,
            )),
            orders: Arc::new(OrderService::new(db_pool.clone(), event_sender.clone())),
            products: Arc::new(ProductService::new(db_pool.clone(), event_sender.clone())),
            categories: Arc::new(CategoryService::new(db_pool.clone(), event_sender.clone())),
            users: Arc::new(UserService::new(db_pool.clone(), event_sender.clone())),
            branding: Arc::new(BrandingService::new(db_pool, event_sender)),
        }
    }
}
