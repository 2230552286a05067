use crate::handlers::common::{created_response, paginated_response, success_response, PageQuery};
use crate::{
    auth::Session,
    errors::ServiceError,
    services::users::{CreateUserInput, SetActiveInput},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::Response,
    routing::{get, put},
    Router,
};
use uuid::Uuid;

pub fn users_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id/active", put(set_active))
}

async fn list_users(
    State(state): State<AppState>,
    session: Session,
    Query(paging): Query<PageQuery>,
) -> Result<Response, ServiceError> {
    let page = paging.page();
    let limit = state.config.page_size(paging.limit);
    let (users, total) = state.services.users.list(&session, page, limit).await?;
    Ok(paginated_response(users, total, page, limit))
}

async fn create_user(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<CreateUserInput>,
) -> Result<Response, ServiceError> {
    let user = state.services.users.create(&session, payload).await?;
    Ok(created_response(user))
}

async fn set_active(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetActiveInput>,
) -> Result<Response, ServiceError> {
    let user = state
        .services
        .users
        .set_active(&session, id, payload.is_active)
        .await?;
    Ok(success_response(user))
}
