//! Request extractors.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::ServerError;

/// JSON body that has passed [`Validate`].
///
/// Syntax errors and a missing content type are 400; a body with missing or
/// mistyped fields, or one that fails validation, is 422.
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| match rejection {
                JsonRejection::JsonDataError(e) => ServerError::InvalidBody(e.body_text()),
                other => ServerError::BadRequest(other.body_text()),
            })?;
        value.validate()?;
        Ok(Self(value))
    }
}
