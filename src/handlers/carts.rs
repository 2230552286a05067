use crate::handlers::common::{created_response, success_response, validate_input};
use crate::{
    auth::Session,
    errors::ServiceError,
    services::{
        cart::{AddToCartInput, SaveNotesInput, UpdateQuantityInput},
        checkout::CheckoutInput,
    },
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::Response,
    routing::{get, post, put},
    Router,
};
use uuid::Uuid;

/// Creates the router for the caller's cart
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart))
        .route("/items", post(add_to_cart))
        .route(
            "/items/:product_id",
            put(update_cart_item).delete(remove_cart_item),
        )
        .route("/notes", put(save_notes))
        .route("/clear", post(clear_cart))
}

pub fn checkout_routes() -> Router<AppState> {
    Router::new().route("/", post(checkout))
}

/// Get the caller's cart with current stock levels
async fn get_cart(State(state): State<AppState>, session: Session) -> Result<Response, ServiceError> {
    let cart = state.services.cart.view(session.user_id).await?;
    Ok(success_response(cart))
}

/// Add a product to the cart
async fn add_to_cart(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<AddToCartInput>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let cart = state.services.cart.add_item(session.user_id, payload).await?;
    Ok(success_response(cart))
}

/// Update line quantity; 0 removes the line
async fn update_cart_item(
    State(state): State<AppState>,
    session: Session,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateQuantityInput>,
) -> Result<Response, ServiceError> {
    let cart = state
        .services
        .cart
        .update_quantity(session.user_id, product_id, payload.quantity)
        .await?;
    Ok(success_response(cart))
}

async fn remove_cart_item(
    State(state): State<AppState>,
    session: Session,
    Path(product_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let cart = state
        .services
        .cart
        .remove_item(session.user_id, product_id)
        .await?;
    Ok(success_response(cart))
}

async fn save_notes(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<SaveNotesInput>,
) -> Result<Response, ServiceError> {
    let cart = state.services.cart.save_notes(session.user_id, payload).await?;
    Ok(success_response(cart))
}

async fn clear_cart(State(state): State<AppState>, session: Session) -> Result<Response, ServiceError> {
    let cart = state.services.cart.clear(session.user_id).await?;
    Ok(success_response(cart))
}

/// Turn the cart into an order
async fn checkout(
    State(state): State<AppState>,
    session: Session,
    payload: Option<Json<CheckoutInput>>,
) -> Result<Response, ServiceError> {
    let input = payload.map(|Json(input)| input).unwrap_or_default();
    let outcome = state.services.checkout.checkout(&session, input).await?;
    Ok(created_response(outcome))
}
