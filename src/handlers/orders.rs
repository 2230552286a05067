use crate::handlers::common::{paginated_response, success_response, PageQuery};
use crate::{
    auth::Session,
    entities::order::OrderStatus,
    errors::ServiceError,
    services::orders::UpdateStatusInput,
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::Response,
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/report", get(order_report))
        .route("/:id", get(get_order))
        .route("/:id/status", put(update_order_status))
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<OrderStatus>,
}

/// Orders visible to the caller, newest first
async fn list_orders(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<OrderListQuery>,
) -> Result<Response, ServiceError> {
    let paging = PageQuery {
        page: query.page,
        limit: query.limit,
    };
    let page = paging.page();
    let limit = state.config.page_size(paging.limit);
    let (orders, total) = state
        .services
        .orders
        .list(&session, query.status, page, limit)
        .await?;
    Ok(paginated_response(orders, total, page, limit))
}

async fn get_order(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let order = state.services.orders.get(&session, id).await?;
    Ok(success_response(order))
}

async fn update_order_status(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusInput>,
) -> Result<Response, ServiceError> {
    let order = state
        .services
        .orders
        .update_status(&session, id, payload.status)
        .await?;
    Ok(success_response(order))
}

/// Count and value of the caller's visible orders per status
async fn order_report(
    State(state): State<AppState>,
    session: Session,
) -> Result<Response, ServiceError> {
    let report = state.services.orders.report(&session).await?;
    Ok(success_response(report))
}
