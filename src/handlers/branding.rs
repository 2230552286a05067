use crate::handlers::common::success_response;
use crate::{
    auth::Session, errors::ServiceError, services::branding::BrandingInput, AppState,
};
use axum::{
    extract::{Json, State},
    response::Response,
    routing::get,
    Router,
};

pub fn branding_routes() -> Router<AppState> {
    Router::new().route("/", get(get_branding).put(update_branding))
}

/// Public: the login page renders with the configured branding
async fn get_branding(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let branding = state.services.branding.get().await?;
    Ok(success_response(branding))
}

async fn update_branding(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<BrandingInput>,
) -> Result<Response, ServiceError> {
    let branding = state.services.branding.update(&session, payload).await?;
    Ok(success_response(branding))
}
