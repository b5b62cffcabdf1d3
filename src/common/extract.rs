use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::header,
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
};

/// Corpo JSON já desserializado e validado.
/// Falhas viram 400 no formato `{error, details}`, no idioma do cliente.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T> FromRequest<AppState> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let locale = Locale::from_header(
            req.headers()
                .get(header::ACCEPT_LANGUAGE)
                .and_then(|v| v.to_str().ok()),
        );

        let Json(payload) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| {
                AppError::InvalidJson(rejection.body_text()).to_api_error(&locale, &state.i18n_store)
            })?;

        payload
            .validate()
            .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &state.i18n_store))?;

        Ok(ValidatedJson(payload))
    }
}
