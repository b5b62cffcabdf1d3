// src/handlers/tickets.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use axum_extra::extract::Query;
use chrono::Utc;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        db_utils::begin_rls_transaction,
        error::{ApiError, AppError},
        extract::ValidatedJson,
    },
    config::AppState,
    db::ticket_repo::TicketFilter,
    middleware::{auth::AuthenticatedUser, i18n::Locale, tenancy::TenantContext},
    models::ticket::{
        BoardColumn, SortOrder, Ticket, TicketHistoryEntry, TicketPriority, TicketSortField,
        TicketStatus, TicketView,
    },
    services::ticket_service::TicketDraft,
};

// ---
// Payloads
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketPayload {
    #[validate(length(min = 1, message = "empty"))]
    #[schema(example = "Impressora do financeiro não imprime")]
    pub title: String,

    pub description: Option<String>,

    // Nulo = chamado interno
    pub client_id: Option<Uuid>,

    // Padrão: Normal
    pub priority: Option<TicketPriority>,

    // Sem valor: padrão da prioridade na criação, prazo atual mantido na edição
    #[validate(range(min = 0, message = "negative"))]
    #[schema(example = 24)]
    pub sla_resolution_hours: Option<i32>,

    pub assigned_to: Option<Uuid>,
}

impl TicketPayload {
    fn draft(&self) -> TicketDraft<'_> {
        TicketDraft {
            title: self.title.trim(),
            description: self.description.as_deref(),
            client_id: self.client_id,
            priority: self.priority.unwrap_or(TicketPriority::Normal),
            sla_resolution_hours: self.sla_resolution_hours,
            assigned_to: self.assigned_to,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangeStatusPayload {
    #[schema(example = "Em Andamento")]
    pub status: TicketStatus,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TicketQuery {
    /// Pode ser repetido: `?status=Aberto&status=Em%20Andamento`
    #[serde(default)]
    pub status: Vec<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub client_id: Option<Uuid>,
    /// Trecho do título ou da descrição
    pub search: Option<String>,
    pub sort_by: Option<TicketSortField>,
    pub order: Option<SortOrder>,
}

impl From<TicketQuery> for TicketFilter {
    fn from(q: TicketQuery) -> Self {
        TicketFilter {
            statuses: q.status,
            priority: q.priority,
            client_id: q.client_id,
            search: q.search,
            sort_by: q.sort_by.unwrap_or_default(),
            order: q.order.unwrap_or_default(),
        }
    }
}

// POST /api/tickets
#[utoipa::path(
    post,
    path = "/api/tickets",
    tag = "Tickets",
    request_body = TicketPayload,
    responses(
        (status = 201, description = "Chamado aberto", body = TicketView),
        (status = 400, description = "Dados inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_ticket(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    ValidatedJson(payload): ValidatedJson<TicketPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = begin_rls_transaction(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let ticket = app_state
        .ticket_service
        .create_ticket(&mut *tx, tenant.0, user.0.id, &payload.draft(), Utc::now(), &locale.0)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    tx.commit()
        .await
        .map_err(|e| AppError::from(e).to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(ticket)))
}

// GET /api/tickets
#[utoipa::path(
    get,
    path = "/api/tickets",
    tag = "Tickets",
    params(TicketQuery),
    responses(
        (status = 200, description = "Chamados com a avaliação de SLA", body = Vec<TicketView>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_tickets(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Query(query): Query<TicketQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = TicketFilter::from(query);

    let mut tx = begin_rls_transaction(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let tickets = app_state
        .ticket_service
        .list_tickets(&mut *tx, tenant.0, &filter, Utc::now(), &locale.0)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    tx.commit()
        .await
        .map_err(|e| AppError::from(e).to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(tickets)))
}

// GET /api/tickets/board
#[utoipa::path(
    get,
    path = "/api/tickets/board",
    tag = "Tickets",
    responses(
        (status = 200, description = "Colunas do pipeline em ordem de exibição", body = Vec<BoardColumn>)
    ),
    security(("api_jwt" = []))
)]
pub async fn get_board(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = begin_rls_transaction(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let board = app_state
        .ticket_service
        .board(&mut *tx, tenant.0, Utc::now(), &locale.0)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    tx.commit()
        .await
        .map_err(|e| AppError::from(e).to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(board)))
}

// GET /api/tickets/{id}
#[utoipa::path(
    get,
    path = "/api/tickets/{id}",
    tag = "Tickets",
    params(("id" = Uuid, Path, description = "ID do chamado")),
    responses(
        (status = 200, description = "Chamado", body = TicketView),
        (status = 404, description = "Chamado não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_ticket(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = begin_rls_transaction(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let ticket = app_state
        .ticket_service
        .get_ticket(&mut *tx, tenant.0, id, Utc::now(), &locale.0)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    tx.commit()
        .await
        .map_err(|e| AppError::from(e).to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ticket)))
}

// PUT /api/tickets/{id}
#[utoipa::path(
    put,
    path = "/api/tickets/{id}",
    tag = "Tickets",
    params(("id" = Uuid, Path, description = "ID do chamado")),
    request_body = TicketPayload,
    responses(
        (status = 200, description = "Chamado atualizado", body = TicketView),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Chamado não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_ticket(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<TicketPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = begin_rls_transaction(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let ticket = app_state
        .ticket_service
        .update_ticket(&mut *tx, tenant.0, id, &payload.draft(), Utc::now(), &locale.0)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    tx.commit()
        .await
        .map_err(|e| AppError::from(e).to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ticket)))
}

// POST /api/tickets/{id}/status
#[utoipa::path(
    post,
    path = "/api/tickets/{id}/status",
    tag = "Tickets",
    params(("id" = Uuid, Path, description = "ID do chamado")),
    request_body = ChangeStatusPayload,
    responses(
        (status = 200, description = "Status alterado e registrado no histórico", body = Ticket),
        (status = 404, description = "Chamado não encontrado"),
        (status = 409, description = "Transição não permitida")
    ),
    security(("api_jwt" = []))
)]
pub async fn change_status(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<ChangeStatusPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = begin_rls_transaction(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    // O serviço abre um savepoint próprio para a troca + histórico
    let ticket = app_state
        .ticket_service
        .change_status(&mut *tx, tenant.0, id, payload.status, user.0.id, payload.note.as_deref())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    tx.commit()
        .await
        .map_err(|e| AppError::from(e).to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ticket)))
}

// GET /api/tickets/{id}/history
#[utoipa::path(
    get,
    path = "/api/tickets/{id}/history",
    tag = "Tickets",
    params(("id" = Uuid, Path, description = "ID do chamado")),
    responses(
        (status = 200, description = "Mudanças de status, da mais antiga para a mais recente", body = Vec<TicketHistoryEntry>),
        (status = 404, description = "Chamado não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_history(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = begin_rls_transaction(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let history = app_state
        .ticket_service
        .history(&mut tx, tenant.0, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    tx.commit()
        .await
        .map_err(|e| AppError::from(e).to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(history)))
}
