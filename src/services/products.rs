use super::page_index;
use crate::{
    auth::Session,
    entities::{category, product},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func, LikeExpr},
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Clone)]
pub struct ProductService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// Largest accepted unit price. Together with the cart line quantity cap it keeps line
/// totals far inside `Decimal` range.
pub const MAX_PRICE: i64 = 1_000_000;

fn price_error(price: &Decimal) -> Option<String> {
    if price.is_sign_negative() {
        Some("Price cannot be negative".to_string())
    } else if *price > Decimal::from(MAX_PRICE) {
        Some(format!("Price cannot exceed {}", MAX_PRICE))
    } else {
        None
    }
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    match price_error(price) {
        Some(message) => {
            let mut err = ValidationError::new("price");
            err.message = Some(message.into());
            Err(err)
        }
        None => Ok(()),
    }
}

/// Input for creating a product
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 100))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub brand: String,
    #[serde(default)]
    pub description: String,
    pub barcode: Option<String>,
    #[validate(custom = "validate_price")]
    pub price: Decimal,
    #[serde(default)]
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub is_new: bool,
}

/// Partial update of a product; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 100))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub brand: Option<String>,
    pub description: Option<String>,
    /// `Some("")` clears the barcode.
    pub barcode: Option<String>,
    #[validate(custom = "validate_price")]
    pub price: Option<Decimal>,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: Option<i32>,
    /// `Some(None)` detaches the product from its category.
    #[serde(default, with = "double_option")]
    pub category_id: Option<Option<Uuid>>,
    pub is_new: Option<bool>,
}

mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, T>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

/// Catalogue listing filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductFilter {
    pub category_id: Option<Uuid>,
    /// Matched against name, code, brand, barcode and description.
    pub search: Option<String>,
}

/// One spreadsheet row of a bulk import. Every column is optional so that missing
/// required columns are reported per row instead of rejecting the whole file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductImportRow {
    pub code: Option<String>,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub barcode: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub category_id: Option<Uuid>,
    pub is_new: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRowError {
    /// Spreadsheet line of the row: the header is line 1, so the first row is line 2.
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    pub errors: Vec<ImportRowError>,
}

/// Spreadsheet line for the row at `index` in the uploaded data.
pub fn spreadsheet_row(index: usize) -> usize {
    index + 2
}

/// Barcodes `""` and `"0"` mean the product has none.
pub fn normalize_barcode(barcode: Option<&str>) -> Option<String> {
    barcode
        .map(str::trim)
        .filter(|b| !b.is_empty() && *b != "0")
        .map(str::to_string)
}

/// Escapes `LIKE` wildcards so the term matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ProductService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: ProductFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        let mut query = product::Entity::find();

        if let Some(category_id) = filter.category_id {
            query = query.filter(product::Column::CategoryId.eq(category_id));
        }

        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
            let matches = |column: product::Column| {
                Expr::expr(Func::lower(Expr::col(column)))
                    .like(LikeExpr::new(pattern.as_str()).escape('\\'))
            };
            query = query.filter(
                Condition::any()
                    .add(matches(product::Column::Name))
                    .add(matches(product::Column::Code))
                    .add(matches(product::Column::Brand))
                    .add(matches(product::Column::Barcode))
                    .add(matches(product::Column::Description)),
            );
        }

        let paginator = query
            .order_by_asc(product::Column::Name)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page_index(page)).await?;

        Ok((products, total))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<product::Model, ServiceError> {
        product::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
    }

    #[instrument(skip(self, session))]
    pub async fn create(
        &self,
        session: &Session,
        input: CreateProductInput,
    ) -> Result<product::Model, ServiceError> {
        session.require_staff()?;
        input.validate()?;
        if let Some(category_id) = input.category_id {
            ensure_category(&*self.db, category_id).await?;
        }

        let now = Utc::now();
        let code = input.code.trim().to_string();
        let brand = input.brand.trim().to_string();
        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.clone()),
            name: Set(input.name.trim().to_string()),
            brand: Set(brand.clone()),
            description: Set(input.description),
            barcode: Set(normalize_barcode(input.barcode.as_deref())),
            price: Set(input.price),
            stock: Set(input.stock),
            category_id: Set(input.category_id),
            is_new: Set(input.is_new),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| {
            ServiceError::from_write(e, || {
                format!("A product with code {} and brand {} already exists", code, brand)
            })
        })?;

        self.event_sender.send_or_log(Event::ProductCreated(product.id));
        info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    #[instrument(skip(self, session))]
    pub async fn update(
        &self,
        session: &Session,
        id: Uuid,
        input: UpdateProductInput,
    ) -> Result<product::Model, ServiceError> {
        session.require_staff()?;
        input.validate()?;

        let existing = self.get(id).await?;
        if let Some(Some(category_id)) = input.category_id {
            ensure_category(&*self.db, category_id).await?;
        }

        let mut active: product::ActiveModel = existing.into();
        if let Some(code) = input.code {
            active.code = Set(code.trim().to_string());
        }
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(brand) = input.brand {
            active.brand = Set(brand.trim().to_string());
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(barcode) = input.barcode {
            active.barcode = Set(normalize_barcode(Some(&barcode)));
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(stock) = input.stock {
            active.stock = Set(stock);
        }
        if let Some(category_id) = input.category_id {
            active.category_id = Set(category_id);
        }
        if let Some(is_new) = input.is_new {
            active.is_new = Set(is_new);
        }
        active.updated_at = Set(Utc::now());

        let product = active.update(&*self.db).await.map_err(|e| {
            ServiceError::from_write(e, || {
                "Another product already uses this code and brand".to_string()
            })
        })?;

        self.event_sender.send_or_log(Event::ProductUpdated(product.id));
        Ok(product)
    }

    #[instrument(skip(self, session))]
    pub async fn delete(&self, session: &Session, id: Uuid) -> Result<(), ServiceError> {
        session.require_staff()?;

        let result = product::Entity::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Product {} not found", id)));
        }

        self.event_sender.send_or_log(Event::ProductDeleted(id));
        info!(product_id = %id, "Product deleted");
        Ok(())
    }

    /// Overwrites the stock level of a product.
    #[instrument(skip(self, session))]
    pub async fn set_stock(
        &self,
        session: &Session,
        id: Uuid,
        stock: i32,
    ) -> Result<product::Model, ServiceError> {
        session.require_staff()?;
        if stock < 0 {
            return Err(ServiceError::ValidationError(
                "Stock cannot be negative".to_string(),
            ));
        }

        let mut active: product::ActiveModel = self.get(id).await?.into();
        active.stock = Set(stock);
        active.updated_at = Set(Utc::now());
        let product = active.update(&*self.db).await?;

        self.event_sender.send_or_log(Event::StockAdjusted {
            product_id: product.id,
            stock,
        });
        Ok(product)
    }

    /// Bulk upsert keyed by `(code, brand)`.
    ///
    /// Rows are processed one by one and independently: a failing row is reported in the
    /// returned errors and the rest of the import carries on.
    #[instrument(skip(self, session, rows), fields(rows = rows.len()))]
    pub async fn import(
        &self,
        session: &Session,
        rows: Vec<ProductImportRow>,
    ) -> Result<ImportReport, ServiceError> {
        session.require_staff()?;

        let mut report = ImportReport::default();
        for (index, row) in rows.into_iter().enumerate() {
            let line = spreadsheet_row(index);
            match self.import_row(row).await {
                Ok(true) => report.created += 1,
                Ok(false) => report.updated += 1,
                Err(e) => {
                    warn!(row = line, error = %e, "Product import row failed");
                    report.errors.push(ImportRowError {
                        row: line,
                        message: e.to_string(),
                    });
                }
            }
        }

        self.event_sender.send_or_log(Event::ProductsImported {
            created: report.created,
            updated: report.updated,
            failed: report.errors.len(),
        });
        info!(
            created = report.created,
            updated = report.updated,
            failed = report.errors.len(),
            "Product import finished"
        );
        Ok(report)
    }

    /// Imports one row; returns `true` when a product was created, `false` when updated.
    async fn import_row(&self, row: ProductImportRow) -> Result<bool, ServiceError> {
        let (code, name, brand) = match (required(&row.code), required(&row.name), required(&row.brand)) {
            (Some(code), Some(name), Some(brand)) => {
                (code.to_string(), name.to_string(), brand.to_string())
            }
            _ => {
                return Err(ServiceError::ValidationError(
                    "name, code and brand are required".to_string(),
                ))
            }
        };

        let price = row.price.unwrap_or(Decimal::ZERO);
        if let Some(message) = price_error(&price) {
            return Err(ServiceError::ValidationError(message));
        }
        let stock = row.stock.unwrap_or(0);
        if stock < 0 {
            return Err(ServiceError::ValidationError(
                "Stock cannot be negative".to_string(),
            ));
        }
        if let Some(category_id) = row.category_id {
            ensure_category(&*self.db, category_id).await?;
        }

        let barcode = normalize_barcode(row.barcode.as_deref());
        let description = row.description.unwrap_or_default();
        let is_new = row.is_new.unwrap_or(false);
        let now = Utc::now();

        let existing = product::Entity::find()
            .filter(product::Column::Code.eq(code.as_str()))
            .filter(product::Column::Brand.eq(brand.as_str()))
            .one(&*self.db)
            .await?;

        match existing {
            Some(existing) => {
                let mut active: product::ActiveModel = existing.into();
                active.name = Set(name);
                active.description = Set(description);
                active.barcode = Set(barcode);
                active.price = Set(price);
                active.stock = Set(stock);
                active.category_id = Set(row.category_id);
                active.is_new = Set(is_new);
                active.updated_at = Set(now);
                active.update(&*self.db).await?;
                Ok(false)
            }
            None => {
                product::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    code: Set(code),
                    name: Set(name),
                    brand: Set(brand),
                    description: Set(description),
                    barcode: Set(barcode),
                    price: Set(price),
                    stock: Set(stock),
                    category_id: Set(row.category_id),
                    is_new: Set(is_new),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&*self.db)
                .await?;
                Ok(true)
            }
        }
    }
}

async fn ensure_category<C>(conn: &C, category_id: Uuid) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    category::Entity::find_by_id(category_id)
        .one(conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", category_id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn barcode_placeholders_become_none() {
        assert_eq!(normalize_barcode(None), None);
        assert_eq!(normalize_barcode(Some("")), None);
        assert_eq!(normalize_barcode(Some("  ")), None);
        assert_eq!(normalize_barcode(Some("0")), None);
        assert_eq!(
            normalize_barcode(Some(" 7891234567890 ")),
            Some("7891234567890".to_string())
        );
    }

    #[test]
    fn rows_are_numbered_like_the_spreadsheet() {
        assert_eq!(spreadsheet_row(0), 2);
        assert_eq!(spreadsheet_row(9), 11);
    }

    #[test]
    fn negative_price_fails_validation() {
        let input = CreateProductInput {
            code: "A-1".into(),
            name: "Anchor".into(),
            brand: "Acme".into(),
            description: String::new(),
            barcode: None,
            price: Decimal::new(-100, 2),
            stock: 1,
            category_id: None,
            is_new: false,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
        assert_eq!(escape_like("valve"), "valve");
    }

    #[test]
    fn price_is_capped() {
        assert!(validate_price(&Decimal::from(MAX_PRICE)).is_ok());
        assert!(validate_price(&Decimal::new(MAX_PRICE * 100 + 1, 2)).is_err());
        assert!(validate_price(&Decimal::ZERO).is_ok());
    }

    #[test]
    fn category_can_be_cleared_with_null() {
        let input: UpdateProductInput =
            serde_json::from_str(r#"{"category_id": null}"#).unwrap();
        assert_eq!(input.category_id, Some(None));

        let input: UpdateProductInput = serde_json::from_str("{}").unwrap();
        assert_eq!(input.category_id, None);
    }
}
