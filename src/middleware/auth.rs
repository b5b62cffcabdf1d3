// src/middleware/auth.rs

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};

use crate::{common::error::ApiError, models::auth::AuthUser};

// Extrator para obter o usuário autenticado diretamente nos handlers.
// Quem preenche é o `tenant_guard`.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub AuthUser);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "Usuário não autenticado"))
    }
}
