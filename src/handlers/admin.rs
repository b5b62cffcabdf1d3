// src/handlers/admin.rs
//
// Endpoints administrativos da equipe. Ordem em todos: valida o corpo,
// autentica o token, resolve o perfil de quem chama e só então age.

use axum::{extract::State, http::HeaderMap, http::StatusCode, response::IntoResponse, Json};

use crate::{
    common::{
        error::{ApiError, AppError},
        extract::ValidatedJson,
    },
    config::AppState,
    middleware::i18n::Locale,
    models::{
        admin::{
            DeleteUserPayload, InviteUserPayload, InviteUserResponse, MessageResponse,
            ResendInvitePayload, UpdateUserDetailsPayload, UpdateUserDetailsResponse,
        },
        team::{Profile, TeamMember},
    },
};

// Autentica e carrega o perfil (e com ele a organização) de quem chama
async fn resolve_caller(app_state: &AppState, headers: &HeaderMap) -> Result<Profile, AppError> {
    let user = app_state.auth_service.authenticate_headers(headers)?;
    app_state
        .team_service
        .find_profile(user.id)
        .await?
        .ok_or(AppError::ProfileNotFound)
}

// POST /invite-user
#[utoipa::path(
    post,
    path = "/invite-user",
    tag = "Admin",
    request_body = InviteUserPayload,
    responses(
        (status = 200, description = "Convite enviado", body = InviteUserResponse),
        (status = 400, description = "Campos inválidos ou ausentes"),
        (status = 401, description = "Token ausente ou inválido"),
        (status = 404, description = "Perfil ou cargo não encontrado"),
        (status = 409, description = "E-mail de outra organização"),
        (status = 500, description = "Erro do provedor de identidade")
    ),
    security(("api_jwt" = []))
)]
pub async fn invite_user(
    State(app_state): State<AppState>,
    locale: Locale,
    headers: HeaderMap,
    ValidatedJson(payload): ValidatedJson<InviteUserPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = resolve_caller(&app_state, &headers)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    // Campos já validados como presentes
    let email = payload.email.unwrap_or_default();
    let full_name = payload.full_name.unwrap_or_default();
    let role_name = payload.role_name.unwrap_or_default();

    let user = app_state
        .team_service
        .invite_user(&caller, email.trim(), full_name.trim(), &role_name)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let message = app_state
        .i18n_store
        .translate_with(&locale.0, "admin.invite_sent", &[("email", email.trim())]);

    Ok((StatusCode::OK, Json(InviteUserResponse { message, user })))
}

// POST /resend-invite
#[utoipa::path(
    post,
    path = "/resend-invite",
    tag = "Admin",
    request_body = ResendInvitePayload,
    responses(
        (status = 200, description = "Convite reenviado", body = MessageResponse),
        (status = 400, description = "E-mail ausente ou inválido"),
        (status = 401, description = "Token ausente ou inválido"),
        (status = 404, description = "E-mail não pertence à organização"),
        (status = 500, description = "Erro do provedor de identidade")
    ),
    security(("api_jwt" = []))
)]
pub async fn resend_invite(
    State(app_state): State<AppState>,
    locale: Locale,
    headers: HeaderMap,
    ValidatedJson(payload): ValidatedJson<ResendInvitePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = resolve_caller(&app_state, &headers)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let email = payload.email.unwrap_or_default();

    app_state
        .team_service
        .resend_invite(&caller, email.trim())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let message = app_state
        .i18n_store
        .translate_with(&locale.0, "admin.invite_resent", &[("email", email.trim())]);

    Ok((StatusCode::OK, Json(MessageResponse { message })))
}

// POST /delete-user
#[utoipa::path(
    post,
    path = "/delete-user",
    tag = "Admin",
    request_body = DeleteUserPayload,
    responses(
        (status = 200, description = "Usuário removido", body = MessageResponse),
        (status = 400, description = "userId ausente ou tentativa de remover a si mesmo"),
        (status = 401, description = "Token ausente ou inválido"),
        (status = 404, description = "Membro não encontrado na organização"),
        (status = 500, description = "Erro do provedor de identidade")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_user(
    State(app_state): State<AppState>,
    locale: Locale,
    headers: HeaderMap,
    ValidatedJson(payload): ValidatedJson<DeleteUserPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = resolve_caller(&app_state, &headers)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    app_state
        .team_service
        .delete_user(&caller, payload.user_id.unwrap_or_default())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let message = app_state.i18n_store.translate(&locale.0, "admin.user_deleted");
    Ok((StatusCode::OK, Json(MessageResponse { message })))
}

// POST /update-user-details
#[utoipa::path(
    post,
    path = "/update-user-details",
    tag = "Admin",
    request_body = UpdateUserDetailsPayload,
    responses(
        (status = 200, description = "Dados atualizados", body = UpdateUserDetailsResponse),
        (status = 400, description = "Campos inválidos ou ausentes"),
        (status = 401, description = "Token ausente ou inválido"),
        (status = 404, description = "Membro ou cargo não encontrado"),
        (status = 500, description = "Erro do provedor de identidade")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_user_details(
    State(app_state): State<AppState>,
    locale: Locale,
    headers: HeaderMap,
    ValidatedJson(payload): ValidatedJson<UpdateUserDetailsPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = resolve_caller(&app_state, &headers)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let name = payload.name.unwrap_or_default();
    let email = payload.email.unwrap_or_default();
    let role = payload.role.unwrap_or_default();

    let member = app_state
        .team_service
        .update_user_details(
            &caller,
            payload.user_id.unwrap_or_default(),
            name.trim(),
            email.trim(),
            &role,
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let message = app_state.i18n_store.translate(&locale.0, "admin.user_updated");
    Ok((StatusCode::OK, Json(UpdateUserDetailsResponse { message, member })))
}

// GET /get-team-members
#[utoipa::path(
    get,
    path = "/get-team-members",
    tag = "Admin",
    responses(
        (status = 200, description = "Equipe da organização", body = Vec<TeamMember>),
        (status = 401, description = "Token ausente ou inválido"),
        (status = 404, description = "Perfil não encontrado"),
        (status = 500, description = "Erro do provedor de identidade")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_team_members(
    State(app_state): State<AppState>,
    locale: Locale,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let caller = resolve_caller(&app_state, &headers)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let members = app_state
        .team_service
        .list_team_members(&caller)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(members)))
}
