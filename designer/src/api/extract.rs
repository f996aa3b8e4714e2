use axum::Json;
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};

use super::models::ApiResponse;

pub const USER_HEADER: &str = "x-user-id";

/// Caller identity, taken from the `x-user-id` header set by the fronting
/// session layer.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

pub struct MissingUser;

impl IntoResponse for MissingUser {
    fn into_response(self) -> Response {
        let body = Json(ApiResponse::<()>::error(format!(
            "missing or empty {} header",
            USER_HEADER
        )));
        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = MissingUser;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|user| !user.is_empty())
            .map(|user| CurrentUser(user.to_string()))
            .ok_or(MissingUser)
    }
}
