//! API handlers for Bookloan REST endpoints

pub mod books;
pub mod borrowings;
pub mod health;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post, MethodRouter},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    error::AppError,
    models::user::{Caller, UserClaims},
    services::policy,
    AppState,
};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub Caller);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                AppError::Authentication("Authentication credentials were not provided.".to_string())
            })?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims.into()))
    }
}

/// Authenticated staff member. Runs before body extraction, so a regular
/// caller is refused before their payload is even parsed.
pub struct StaffUser(pub Caller);

#[async_trait]
impl FromRequestParts<AppState> for StaffUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(caller) = AuthenticatedUser::from_request_parts(parts, state).await?;
        policy::ensure_staff(&caller)?;
        Ok(StaffUser(caller))
    }
}

/// JSON body whose rejections are reported as validation errors
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string whose rejections are reported as validation errors
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Path parameters whose rejections are reported as validation errors
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Register `path` with and without a trailing slash
fn route_both(router: Router<AppState>, path: &str, handler: MethodRouter<AppState>) -> Router<AppState> {
    router
        .route(path, handler.clone())
        .route(&format!("{}/", path), handler)
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut api_v1 = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check));

    // Books (catalog)
    api_v1 = route_both(api_v1, "/books", get(books::list_books).post(books::create_book));
    api_v1 = route_both(
        api_v1,
        "/books/:id",
        get(books::get_book)
            .patch(books::update_book)
            .delete(books::delete_book),
    );
    // Borrowings
    api_v1 = route_both(
        api_v1,
        "/borrowings",
        get(borrowings::list_borrowings).post(borrowings::create_borrowing),
    );
    api_v1 = route_both(api_v1, "/borrowings/:id", get(borrowings::get_borrowing));
    api_v1 = route_both(
        api_v1,
        "/borrowings/:id/return",
        post(borrowings::return_borrowing),
    );

    Router::new()
        .nest("/api/v1", api_v1.with_state(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
