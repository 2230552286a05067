#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use portal_api::{
    auth::Session,
    config::{AppConfig, OverStockPolicy},
    db::{self, DbConfig},
    entities::{
        category, product,
        user::{self, Role},
    },
    events::{self, Event},
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "portal_test_secret_key_with_at_least_32_chars";

/// Helper harness for spinning up an application state backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    events: mpsc::Receiver<Event>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        Self::with_policy(OverStockPolicy::Backorder).await
    }

    pub async fn with_policy(policy: OverStockPolicy) -> Self {
        Self::with_db(policy, DbConfig::sqlite_in_memory()).await
    }

    /// Test application over a SQLite file with a multi-connection pool, for tests that need
    /// requests to run side by side.
    pub async fn on_sqlite_file(policy: OverStockPolicy, path: &std::path::Path) -> Self {
        Self::with_db(policy, DbConfig::sqlite_file(path, 4)).await
    }

    pub async fn with_db(policy: OverStockPolicy, db_config: DbConfig) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_JWT_SECRET.to_string(),
            "test".to_string(),
        );
        cfg.checkout.over_stock_policy = policy;

        let pool = db::establish_connection_with_config(&db_config)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_sender, events) = events::channel(1024);
        let state = AppState::new(Arc::new(pool), Arc::new(cfg), Arc::new(event_sender));
        let router = portal_api::build_router(state.clone());

        Self {
            router,
            state,
            events,
        }
    }

    /// Events published so far, in order.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut seen = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            seen.push(event);
        }
        seen
    }

    /// Inserts a user directly, bypassing password hashing.
    pub async fn seed_user(&self, email: &str, role: Role, seller_id: Option<Uuid>) -> user::Model {
        let now = Utc::now();
        user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            name: Set(email.split('@').next().unwrap_or(email).to_string()),
            password_hash: Set("not-a-real-hash".to_string()),
            role: Set(role),
            seller_id: Set(seller_id),
            document: Set(None),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed user")
    }

    pub async fn seed_category(&self, name: &str) -> category::Model {
        category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed category")
    }

    pub async fn seed_product(&self, code: &str, price: Decimal, stock: i32) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.to_string()),
            name: Set(format!("Product {}", code)),
            brand: Set("Acme".to_string()),
            description: Set(String::new()),
            barcode: Set(None),
            price: Set(price),
            stock: Set(stock),
            category_id: Set(None),
            is_new: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed product")
    }

    pub async fn product(&self, id: Uuid) -> product::Model {
        product::Entity::find_by_id(id)
            .one(&*self.state.db)
            .await
            .expect("product query failed")
            .expect("product exists")
    }

    pub fn session(&self, user: &user::Model) -> Session {
        Session::for_user(user, Utc::now(), self.state.auth.config.session_ttl)
    }

    pub fn token(&self, user: &user::Model) -> String {
        self.state
            .auth
            .issue_token(user)
            .expect("failed to issue token")
            .access_token
    }

    /// Sends one request through the full router and returns the status and JSON body.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("valid request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("JSON body")
        };
        (status, json)
    }
}
