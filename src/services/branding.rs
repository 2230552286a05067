use crate::{
    auth::Session,
    entities::branding,
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Clone)]
pub struct BrandingService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

fn validate_hex_color(color: &str) -> Result<(), ValidationError> {
    let hex = color.strip_prefix('#').unwrap_or("");
    if matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("primary_color");
        err.message = Some("Must be a hex color such as #1e40af".into());
        Err(err)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BrandingInput {
    #[validate(length(min = 1, max = 255))]
    pub company_name: String,
    #[validate(url)]
    pub logo_url: Option<String>,
    #[validate(custom = "validate_hex_color")]
    pub primary_color: String,
    #[validate(email)]
    pub contact_email: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
}

impl BrandingService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Current branding, or the defaults when none has been saved.
    #[instrument(skip(self))]
    pub async fn get(&self) -> Result<branding::Model, ServiceError> {
        Ok(branding::Entity::find()
            .one(&*self.db)
            .await?
            .unwrap_or_else(branding::Model::defaults))
    }

    #[instrument(skip(self, session, input), fields(user_id = %session.user_id))]
    pub async fn update(
        &self,
        session: &Session,
        input: BrandingInput,
    ) -> Result<branding::Model, ServiceError> {
        session.require_staff()?;
        input.validate()?;

        let now = Utc::now();
        let existing = branding::Entity::find().one(&*self.db).await?;
        let model = match existing {
            Some(existing) => {
                let mut active: branding::ActiveModel = existing.into();
                active.company_name = Set(input.company_name);
                active.logo_url = Set(input.logo_url);
                active.primary_color = Set(input.primary_color);
                active.contact_email = Set(input.contact_email);
                active.phone = Set(input.phone);
                active.address = Set(input.address);
                active.updated_at = Set(now);
                active.update(&*self.db).await?
            }
            None => {
                branding::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    company_name: Set(input.company_name),
                    logo_url: Set(input.logo_url),
                    primary_color: Set(input.primary_color),
                    contact_email: Set(input.contact_email),
                    phone: Set(input.phone),
                    address: Set(input.address),
                    updated_at: Set(now),
                }
                .insert(&*self.db)
                .await?
            }
        };

        self.event_sender.send_or_log(Event::BrandingUpdated);
        info!("Branding updated");
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors() {
        assert!(validate_hex_color("#1e40af").is_ok());
        assert!(validate_hex_color("#FFF").is_ok());
        assert!(validate_hex_color("1e40af").is_err());
        assert!(validate_hex_color("#12345g").is_err());
    }
}
