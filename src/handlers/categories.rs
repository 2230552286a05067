use crate::handlers::common::{created_response, no_content_response, success_response};
use crate::{
    auth::Session, errors::ServiceError, services::categories::CategoryInput, AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::Response,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

pub fn categories_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/import", post(import_categories))
        .route(
            "/:id",
            get(get_category)
                .put(rename_category)
                .delete(delete_category),
        )
}

#[derive(Debug, Deserialize)]
pub struct ImportCategoriesRequest {
    pub names: Vec<String>,
}

async fn list_categories(
    State(state): State<AppState>,
    _session: Session,
) -> Result<Response, ServiceError> {
    let categories = state.services.categories.list().await?;
    Ok(success_response(categories))
}

async fn get_category(
    State(state): State<AppState>,
    _session: Session,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let category = state.services.categories.get(id).await?;
    Ok(success_response(category))
}

async fn create_category(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<CategoryInput>,
) -> Result<Response, ServiceError> {
    let category = state.services.categories.create(&session, payload).await?;
    Ok(created_response(category))
}

async fn rename_category(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryInput>,
) -> Result<Response, ServiceError> {
    let category = state
        .services
        .categories
        .rename(&session, id, payload)
        .await?;
    Ok(success_response(category))
}

async fn delete_category(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.categories.delete(&session, id).await?;
    Ok(no_content_response())
}

async fn import_categories(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<ImportCategoriesRequest>,
) -> Result<Response, ServiceError> {
    let report = state
        .services
        .categories
        .import(&session, payload.names)
        .await?;
    Ok(success_response(report))
}
