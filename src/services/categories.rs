use crate::{
    auth::Session,
    entities::{category, product},
    errors::ServiceError,
    events::{Event, EventSender},
    services::products::{spreadsheet_row, ImportRowError},
};
use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct CategoryService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

/// Category with the number of products filed under it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    #[serde(flatten)]
    pub category: category::Model,
    pub product_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryImportReport {
    pub created: usize,
    pub errors: Vec<ImportRowError>,
}

impl CategoryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// All categories ordered by name, with product counts.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<CategorySummary>, ServiceError> {
        let categories = category::Entity::find()
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await?;

        let counts: HashMap<Uuid, i64> = product::Entity::find()
            .select_only()
            .column(product::Column::CategoryId)
            .column_as(product::Column::Id.count(), "product_count")
            .filter(product::Column::CategoryId.is_not_null())
            .group_by(product::Column::CategoryId)
            .into_tuple::<(Option<Uuid>, i64)>()
            .all(&*self.db)
            .await?
            .into_iter()
            .filter_map(|(id, count)| id.map(|id| (id, count)))
            .collect();

        Ok(categories
            .into_iter()
            .map(|category| CategorySummary {
                product_count: counts
                    .get(&category.id)
                    .copied()
                    .unwrap_or(0)
                    .max(0) as u64,
                category,
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<category::Model, ServiceError> {
        category::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", id)))
    }

    /// Creates a category; names are unique ignoring case.
    #[instrument(skip(self, session))]
    pub async fn create(
        &self,
        session: &Session,
        input: CategoryInput,
    ) -> Result<category::Model, ServiceError> {
        session.require_staff()?;
        input.validate()?;
        let category = self.insert(input.name.trim()).await?;

        self.event_sender.send_or_log(Event::CategoryCreated(category.id));
        info!(category_id = %category.id, "Category created");
        Ok(category)
    }

    #[instrument(skip(self, session))]
    pub async fn rename(
        &self,
        session: &Session,
        id: Uuid,
        input: CategoryInput,
    ) -> Result<category::Model, ServiceError> {
        session.require_staff()?;
        input.validate()?;
        let name = input.name.trim().to_string();

        let existing = self.get(id).await?;
        if let Some(other) = find_by_name(&*self.db, &name).await? {
            if other.id != id {
                return Err(duplicate(&name));
            }
        }

        let mut active: category::ActiveModel = existing.into();
        active.name = Set(name.clone());
        active
            .update(&*self.db)
            .await
            .map_err(|e| ServiceError::from_write(e, || duplicate_message(&name)))
    }

    /// Deletes a category that no product references.
    #[instrument(skip(self, session))]
    pub async fn delete(&self, session: &Session, id: Uuid) -> Result<(), ServiceError> {
        session.require_staff()?;
        let category = self.get(id).await?;

        let linked = product::Entity::find()
            .filter(product::Column::CategoryId.eq(id))
            .count(&*self.db)
            .await?;
        if linked > 0 {
            return Err(ServiceError::Conflict(format!(
                "Category {} still has {} product(s)",
                category.name, linked
            )));
        }

        category::Entity::delete_by_id(id).exec(&*self.db).await?;
        self.event_sender.send_or_log(Event::CategoryDeleted(id));
        Ok(())
    }

    /// Creates one category per name, reporting blank and duplicate names per row.
    #[instrument(skip(self, session, names), fields(rows = names.len()))]
    pub async fn import(
        &self,
        session: &Session,
        names: Vec<String>,
    ) -> Result<CategoryImportReport, ServiceError> {
        session.require_staff()?;

        let mut report = CategoryImportReport::default();
        for (index, name) in names.iter().enumerate() {
            let row = spreadsheet_row(index);
            let name = name.trim();
            if name.is_empty() {
                report.errors.push(ImportRowError {
                    row,
                    message: "Category name is missing".to_string(),
                });
                continue;
            }

            match self.insert(name).await {
                Ok(category) => {
                    self.event_sender.send_or_log(Event::CategoryCreated(category.id));
                    report.created += 1;
                }
                Err(e) => report.errors.push(ImportRowError {
                    row,
                    message: e.to_string(),
                }),
            }
        }

        Ok(report)
    }

    async fn insert(&self, name: &str) -> Result<category::Model, ServiceError> {
        if find_by_name(&*self.db, name).await?.is_some() {
            return Err(duplicate(name));
        }

        category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| ServiceError::from_write(e, || duplicate_message(name)))
    }
}

fn duplicate_message(name: &str) -> String {
    format!("Category \"{}\" already exists", name)
}

fn duplicate(name: &str) -> ServiceError {
    ServiceError::Conflict(duplicate_message(name))
}

async fn find_by_name<C>(conn: &C, name: &str) -> Result<Option<category::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    Ok(category::Entity::find()
        .filter(Expr::expr(Func::lower(Expr::col(category::Column::Name))).eq(name.to_lowercase()))
        .one(conn)
        .await?)
}
