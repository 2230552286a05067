use crate::handlers::common::{
    created_response, no_content_response, paginated_response, success_response, PageQuery,
};
use crate::{
    auth::Session,
    errors::ServiceError,
    services::products::{CreateProductInput, ProductFilter, ProductImportRow, UpdateProductInput},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::Response,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/import", post(import_products))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/:id/stock", put(set_stock))
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub category_id: Option<Uuid>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    pub stock: i32,
}

#[derive(Debug, Deserialize)]
pub struct ImportProductsRequest {
    pub rows: Vec<ProductImportRow>,
}

/// Browse the catalogue. Any signed-in user may list products.
async fn list_products(
    State(state): State<AppState>,
    _session: Session,
    Query(query): Query<ProductListQuery>,
) -> Result<Response, ServiceError> {
    let paging = PageQuery {
        page: query.page,
        limit: query.limit,
    };
    let page = paging.page();
    let limit = state.config.page_size(paging.limit);
    let filter = ProductFilter {
        category_id: query.category_id,
        search: query.search,
    };

    let (products, total) = state.services.products.list(filter, page, limit).await?;
    Ok(paginated_response(products, total, page, limit))
}

async fn get_product(
    State(state): State<AppState>,
    _session: Session,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let product = state.services.products.get(id).await?;
    Ok(success_response(product))
}

async fn create_product(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<CreateProductInput>,
) -> Result<Response, ServiceError> {
    let product = state.services.products.create(&session, payload).await?;
    Ok(created_response(product))
}

async fn update_product(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductInput>,
) -> Result<Response, ServiceError> {
    let product = state.services.products.update(&session, id, payload).await?;
    Ok(success_response(product))
}

async fn delete_product(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.products.delete(&session, id).await?;
    Ok(no_content_response())
}

async fn set_stock(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetStockRequest>,
) -> Result<Response, ServiceError> {
    let product = state
        .services
        .products
        .set_stock(&session, id, payload.stock)
        .await?;
    Ok(success_response(product))
}

/// Bulk upsert; per-row failures are reported in the response body
async fn import_products(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<ImportProductsRequest>,
) -> Result<Response, ServiceError> {
    let report = state
        .services
        .products
        .import(&session, payload.rows)
        .await?;
    Ok(success_response(report))
}
