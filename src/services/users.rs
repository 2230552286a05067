use super::page_index;
use crate::{
    auth::{AuthService, Session},
    entities::user::{self, Role},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// User and role management.
///
/// Masters may create any role, admins only sellers and customers. Admins never see or
/// modify master accounts.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    pub role: Role,
    /// Seller responsible for a customer; only valid for customers.
    pub seller_id: Option<Uuid>,
    #[validate(length(max = 32))]
    pub document: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetActiveInput {
    pub is_active: bool,
}

impl UserService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Creates a user on behalf of `session`, enforcing who may assign which role.
    #[instrument(skip(self, session, input), fields(role = %input.role))]
    pub async fn create(
        &self,
        session: &Session,
        input: CreateUserInput,
    ) -> Result<user::Model, ServiceError> {
        session.require_staff()?;
        if !session.role.can_assign(input.role) {
            return Err(ServiceError::Forbidden(format!(
                "A {} cannot create {} accounts",
                session.role, input.role
            )));
        }
        self.register(input).await
    }

    /// Creates a user without an acting session. Used to bootstrap the first master account.
    #[instrument(skip(self, input), fields(role = %input.role))]
    pub async fn register(&self, input: CreateUserInput) -> Result<user::Model, ServiceError> {
        input.validate()?;
        let email = input.email.trim().to_lowercase();

        if let Some(seller_id) = input.seller_id {
            if input.role != Role::Customer {
                return Err(ServiceError::ValidationError(
                    "Only customers can be assigned to a seller".to_string(),
                ));
            }
            let seller = user::Entity::find_by_id(seller_id)
                .one(&*self.db)
                .await?
                .filter(|u| u.role == Role::Seller);
            if seller.is_none() {
                return Err(ServiceError::ValidationError(format!(
                    "Seller {} does not exist",
                    seller_id
                )));
            }
        }

        let password_hash = AuthService::hash_password(&input.password)?;
        let now = Utc::now();
        let user = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.clone()),
            name: Set(input.name.trim().to_string()),
            password_hash: Set(password_hash),
            role: Set(input.role),
            seller_id: Set(input.seller_id),
            document: Set(input
                .document
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| {
            ServiceError::from_write(e, || format!("A user with email {} already exists", email))
        })?;

        self.event_sender.send_or_log(Event::UserCreated {
            user_id: user.id,
            role: user.role.to_string(),
        });
        info!(user_id = %user.id, role = %user.role, "User created");
        Ok(user)
    }

    /// Lists the users visible to the caller, ordered by name.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn list(
        &self,
        session: &Session,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<user::Model>, u64), ServiceError> {
        session.require_staff()?;

        let mut query = user::Entity::find();
        if session.role != Role::Master {
            query = query.filter(user::Column::Role.ne(Role::Master));
        }

        let paginator = query
            .order_by_asc(user::Column::Name)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let users = paginator.fetch_page(page_index(page)).await?;
        Ok((users, total))
    }

    /// Enables or disables an account. Nobody can disable themselves.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn set_active(
        &self,
        session: &Session,
        id: Uuid,
        is_active: bool,
    ) -> Result<user::Model, ServiceError> {
        session.require_staff()?;
        if id == session.user_id {
            return Err(ServiceError::InvalidOperation(
                "You cannot change the status of your own account".to_string(),
            ));
        }

        let target = user::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .filter(|u| session.role.can_see(u.role))
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", id)))?;

        if !session.role.can_assign(target.role) {
            return Err(ServiceError::Forbidden(format!(
                "A {} cannot manage {} accounts",
                session.role, target.role
            )));
        }

        let mut active: user::ActiveModel = target.into();
        active.is_active = Set(is_active);
        active.updated_at = Set(Utc::now());
        let user = active.update(&*self.db).await?;

        self.event_sender.send_or_log(Event::UserActivationChanged {
            user_id: user.id,
            is_active,
        });
        Ok(user)
    }
}
