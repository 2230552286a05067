use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Portal role, ordered from most to least privileged.
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
pub enum Role {
    #[sea_orm(string_value = "master")]
    Master,
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "seller")]
    Seller,
    #[sea_orm(string_value = "customer")]
    Customer,
}

impl Role {
    /// Master and admin manage the catalogue, orders and users.
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Master | Role::Admin)
    }

    /// Whether a user holding `self` may create or edit users of role `target`.
    pub fn can_assign(self, target: Role) -> bool {
        match self {
            Role::Master => true,
            Role::Admin => matches!(target, Role::Seller | Role::Customer),
            Role::Seller | Role::Customer => false,
        }
    }

    /// Admins never see master accounts.
    pub fn can_see(self, other: Role) -> bool {
        match self {
            Role::Master => true,
            Role::Admin => other != Role::Master,
            Role::Seller | Role::Customer => false,
        }
    }
}

/// Portal user
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    /// Seller responsible for a customer account.
    #[sea_orm(nullable)]
    pub seller_id: Option<Uuid>,
    /// Tax or identity document number.
    #[sea_orm(nullable)]
    pub document: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
