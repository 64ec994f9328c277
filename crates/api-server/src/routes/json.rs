//! JSON body extractor that rejects with the shared error envelope

use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::routes::error::{bad_request, new_request_id, RouteError};

/// Like [`Json`], but malformed or incomplete bodies become `VALIDATION_ERROR`
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = RouteError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                let request_id = new_request_id();
                tracing::debug!(request_id, error = %rejection, "request body rejected");
                Err(bad_request(
                    "VALIDATION_ERROR",
                    rejection.body_text(),
                    &request_id,
                ))
            }
        }
    }
}
