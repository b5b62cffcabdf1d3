// src/middleware/tenancy.rs

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::team::Profile,
};

// A organização do usuário logado, resolvida pelo perfil
#[derive(Debug, Clone, Copy)]
pub struct TenantContext(pub Uuid);

// O perfil de quem está chamando, passado explicitamente aos serviços
#[derive(Debug, Clone)]
pub struct CurrentProfile(pub Profile);

/// Autentica o token e resolve a organização do usuário pelo perfil.
pub async fn tenant_guard(
    State(app_state): State<AppState>,
    locale: Locale,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = app_state
        .auth_service
        .authenticate_headers(request.headers())
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let profile = app_state
        .team_service
        .find_profile(user.id)
        .await
        .and_then(|p| p.ok_or(AppError::ProfileNotFound))
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let extensions = request.extensions_mut();
    extensions.insert(TenantContext(profile.tenant_id));
    extensions.insert(CurrentProfile(profile));
    extensions.insert(AuthenticatedUser(user));

    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .copied()
            .ok_or_else(|| {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Contexto da organização não encontrado")
            })
    }
}

impl<S> FromRequestParts<S> for CurrentProfile
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentProfile>()
            .cloned()
            .ok_or_else(|| {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Perfil do usuário não carregado")
            })
    }
}
