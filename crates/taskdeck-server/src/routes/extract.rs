//! Extractors whose rejections render through `ApiError`, so every failure a
//! client can cause comes back in the same JSON shape.

use axum::{
    extract::{FromRequest, FromRequestParts, Path},
    http::request::Parts,
};
use taskdeck_core::ValidationError;

use crate::error::ApiError;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct QueryParams<T>(pub T);

/// Task id from the `{id}` path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskId(pub i64);

impl<S> FromRequestParts<S> for TaskId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state).await?;
        raw.parse::<i64>()
            .map(TaskId)
            .map_err(|_| ValidationError::single("id", "must be an integer").into())
    }
}
