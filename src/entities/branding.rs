use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_COMPANY_NAME: &str = "Sales Portal";
pub const DEFAULT_PRIMARY_COLOR: &str = "#1e40af";

/// White-label settings; the table holds at most one row.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "branding")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_name: String,
    #[sea_orm(nullable)]
    pub logo_url: Option<String>,
    pub primary_color: String,
    #[sea_orm(nullable)]
    pub contact_email: Option<String>,
    #[sea_orm(nullable)]
    pub phone: Option<String>,
    #[sea_orm(nullable)]
    pub address: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Branding served before anyone saves settings.
    pub fn defaults() -> Self {
        Self {
            id: Uuid::nil(),
            company_name: DEFAULT_COMPANY_NAME.to_string(),
            logo_url: None,
            primary_color: DEFAULT_PRIMARY_COLOR.to_string(),
            contact_email: None,
            phone: None,
            address: None,
            updated_at: Utc::now(),
        }
    }
}
