use crate::{auth::Session, errors::ServiceError, handlers::common::success_response, AppState};
use axum::{
    extract::{Json, State},
    response::Response,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use validator::Validate;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/session", get(current_session))
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Exchange credentials for a bearer token
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ServiceError> {
    payload.validate()?;
    let response = state.auth.login(&payload.email, &payload.password).await?;
    Ok(success_response(response))
}

/// Session decoded from the caller's token
async fn current_session(session: Session) -> Response {
    success_response(session)
}
