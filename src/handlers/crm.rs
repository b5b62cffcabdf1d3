// src/handlers/crm.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    common::{
        db_utils::begin_rls_transaction,
        error::{ApiError, AppError},
        extract::ValidatedJson,
    },
    config::AppState,
    db::crm_repo::DealFields,
    middleware::{auth::AuthenticatedUser, i18n::Locale, tenancy::TenantContext},
    models::crm::{Company, Contact, Deal, DealStatus, Funnel, FunnelBoard, FunnelWithStages, Stage},
};

fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() {
        return Err(ValidationError::new("negative"));
    }
    Ok(())
}

// =============================================================================
//  ÁREA 1: FUNIS E ETAPAS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFunnelPayload {
    #[validate(length(min = 1, message = "empty"))]
    #[schema(example = "Vendas B2B")]
    pub name: String,

    // Etapas iniciais, na ordem
    #[serde(default)]
    #[schema(example = json!(["Contato", "Proposta", "Negociação"]))]
    pub stages: Vec<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddStagePayload {
    #[validate(length(min = 1, message = "empty"))]
    #[schema(example = "Fechamento")]
    pub name: String,

    // Sem posição, entra no fim do funil
    #[validate(range(min = 0, message = "negative"))]
    pub position: Option<i32>,

    #[schema(example = "#22C55E")]
    pub color: Option<String>,
}

// POST /api/crm/funnels
#[utoipa::path(
    post,
    path = "/api/crm/funnels",
    tag = "CRM",
    request_body = CreateFunnelPayload,
    responses(
        (status = 201, description = "Funil criado com as etapas iniciais", body = FunnelWithStages),
        (status = 400, description = "Dados inválidos"),
        (status = 409, description = "Funil já existe")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_funnel(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    ValidatedJson(payload): ValidatedJson<CreateFunnelPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let stage_names: Vec<String> = payload
        .stages
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let mut tx = begin_rls_transaction(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let (funnel, stages) = app_state
        .crm_service
        .create_funnel(&mut *tx, tenant.0, payload.name.trim(), &stage_names)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    tx.commit()
        .await
        .map_err(|e| AppError::from(e).to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(FunnelWithStages { funnel, stages })))
}

// GET /api/crm/funnels
#[utoipa::path(
    get,
    path = "/api/crm/funnels",
    tag = "CRM",
    responses(
        (status = 200, description = "Funis da organização", body = Vec<Funnel>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_funnels(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = begin_rls_transaction(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let funnels = app_state
        .crm_service
        .list_funnels(&mut *tx, tenant.0)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    tx.commit()
        .await
        .map_err(|e| AppError::from(e).to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(funnels)))
}

// POST /api/crm/funnels/{id}/stages
#[utoipa::path(
    post,
    path = "/api/crm/funnels/{id}/stages",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID do funil")),
    request_body = AddStagePayload,
    responses(
        (status = 201, description = "Etapa criada", body = Stage),
        (status = 404, description = "Funil não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn add_stage(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Path(funnel_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<AddStagePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = begin_rls_transaction(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let stage = app_state
        .crm_service
        .add_stage(
            &mut tx,
            tenant.0,
            funnel_id,
            payload.name.trim(),
            payload.position,
            payload.color.as_deref(),
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    tx.commit()
        .await
        .map_err(|e| AppError::from(e).to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(stage)))
}

// GET /api/crm/funnels/{id}/board
#[utoipa::path(
    get,
    path = "/api/crm/funnels/{id}/board",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID do funil")),
    responses(
        (status = 200, description = "Etapas em ordem com seus negócios", body = FunnelBoard),
        (status = 404, description = "Funil não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_funnel_board(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Path(funnel_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = begin_rls_transaction(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let board = app_state
        .crm_service
        .funnel_board(&mut tx, tenant.0, funnel_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    tx.commit()
        .await
        .map_err(|e| AppError::from(e).to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(board)))
}

// =============================================================================
//  ÁREA 2: NEGÓCIOS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDealPayload {
    #[validate(length(min = 1, message = "empty"))]
    #[schema(example = "Contrato anual de suporte")]
    pub title: String,

    #[validate(custom(function = "validate_not_negative"))]
    #[serde(default)]
    #[schema(example = "15000.00")]
    pub value: Decimal,

    pub funnel_id: Uuid,
    // Sem etapa, entra na primeira do funil
    pub stage_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub responsible_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDealPayload {
    #[validate(length(min = 1, message = "empty"))]
    pub title: String,

    #[validate(custom(function = "validate_not_negative"))]
    #[serde(default)]
    pub value: Decimal,

    pub company_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub responsible_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MoveDealPayload {
    pub stage_id: Uuid,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DealStatusPayload {
    #[schema(example = "Ganho")]
    pub status: DealStatus,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct DealQuery {
    pub funnel_id: Option<Uuid>,
}

// POST /api/crm/deals
#[utoipa::path(
    post,
    path = "/api/crm/deals",
    tag = "CRM",
    request_body = CreateDealPayload,
    responses(
        (status = 201, description = "Negócio criado", body = Deal),
        (status = 400, description = "Dados inválidos ou etapa fora do funil"),
        (status = 404, description = "Funil ou etapa não encontrados")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_deal(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    ValidatedJson(payload): ValidatedJson<CreateDealPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = DealFields {
        title: payload.title.trim(),
        value: payload.value,
        company_id: payload.company_id,
        contact_id: payload.contact_id,
        responsible_id: payload.responsible_id,
    };

    let mut tx = begin_rls_transaction(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let deal = app_state
        .crm_service
        .create_deal(&mut tx, tenant.0, payload.funnel_id, payload.stage_id, &fields)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    tx.commit()
        .await
        .map_err(|e| AppError::from(e).to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(deal)))
}

// GET /api/crm/deals
#[utoipa::path(
    get,
    path = "/api/crm/deals",
    tag = "CRM",
    params(DealQuery),
    responses(
        (status = 200, description = "Negócios da organização", body = Vec<Deal>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_deals(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Query(query): Query<DealQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = begin_rls_transaction(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let deals = app_state
        .crm_service
        .list_deals(&mut *tx, tenant.0, query.funnel_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    tx.commit()
        .await
        .map_err(|e| AppError::from(e).to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(deals)))
}

// PUT /api/crm/deals/{id}
#[utoipa::path(
    put,
    path = "/api/crm/deals/{id}",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID do negócio")),
    request_body = UpdateDealPayload,
    responses(
        (status = 200, description = "Negócio atualizado", body = Deal),
        (status = 404, description = "Negócio não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_deal(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateDealPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = DealFields {
        title: payload.title.trim(),
        value: payload.value,
        company_id: payload.company_id,
        contact_id: payload.contact_id,
        responsible_id: payload.responsible_id,
    };

    let mut tx = begin_rls_transaction(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let deal = app_state
        .crm_service
        .update_deal(&mut *tx, tenant.0, id, &fields)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    tx.commit()
        .await
        .map_err(|e| AppError::from(e).to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(deal)))
}

// DELETE /api/crm/deals/{id}
#[utoipa::path(
    delete,
    path = "/api/crm/deals/{id}",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID do negócio")),
    responses(
        (status = 204, description = "Negócio removido"),
        (status = 404, description = "Negócio não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_deal(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = begin_rls_transaction(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    app_state
        .crm_service
        .delete_deal(&mut *tx, tenant.0, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    tx.commit()
        .await
        .map_err(|e| AppError::from(e).to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// POST /api/crm/deals/{id}/stage
#[utoipa::path(
    post,
    path = "/api/crm/deals/{id}/stage",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID do negócio")),
    request_body = MoveDealPayload,
    responses(
        (status = 200, description = "Negócio movido", body = Deal),
        (status = 400, description = "Etapa de outro funil"),
        (status = 404, description = "Negócio ou etapa não encontrados")
    ),
    security(("api_jwt" = []))
)]
pub async fn move_deal(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<MoveDealPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = begin_rls_transaction(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let deal = app_state
        .crm_service
        .move_deal(&mut tx, tenant.0, id, payload.stage_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    tx.commit()
        .await
        .map_err(|e| AppError::from(e).to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(deal)))
}

// POST /api/crm/deals/{id}/status
#[utoipa::path(
    post,
    path = "/api/crm/deals/{id}/status",
    tag = "CRM",
    params(("id" = Uuid, Path, description = "ID do negócio")),
    request_body = DealStatusPayload,
    responses(
        (status = 200, description = "Status do negócio alterado", body = Deal),
        (status = 404, description = "Negócio não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn set_deal_status(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<DealStatusPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = begin_rls_transaction(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let deal = app_state
        .crm_service
        .set_deal_status(&mut *tx, tenant.0, id, payload.status)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    tx.commit()
        .await
        .map_err(|e| AppError::from(e).to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(deal)))
}

// =============================================================================
//  ÁREA 3: EMPRESAS E CONTATOS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompanyPayload {
    #[validate(length(min = 1, message = "empty"))]
    #[schema(example = "Construtora Horizonte")]
    pub name: String,
    pub document: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactPayload {
    #[validate(length(min = 1, message = "empty"))]
    #[schema(example = "Marcos Pereira")]
    pub name: String,

    #[validate(email(message = "invalid_email"))]
    pub email: Option<String>,

    pub phone: Option<String>,
    pub company_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ContactQuery {
    pub company_id: Option<Uuid>,
}

// POST /api/crm/companies
#[utoipa::path(
    post,
    path = "/api/crm/companies",
    tag = "CRM",
    request_body = CompanyPayload,
    responses(
        (status = 201, description = "Empresa criada", body = Company),
        (status = 409, description = "Documento já cadastrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_company(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    ValidatedJson(payload): ValidatedJson<CompanyPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = begin_rls_transaction(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let company = app_state
        .crm_service
        .create_company(&mut *tx, tenant.0, payload.name.trim(), payload.document.as_deref())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    tx.commit()
        .await
        .map_err(|e| AppError::from(e).to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(company)))
}

// GET /api/crm/companies
#[utoipa::path(
    get,
    path = "/api/crm/companies",
    tag = "CRM",
    responses(
        (status = 200, description = "Empresas", body = Vec<Company>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_companies(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = begin_rls_transaction(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let companies = app_state
        .crm_service
        .list_companies(&mut *tx, tenant.0)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    tx.commit()
        .await
        .map_err(|e| AppError::from(e).to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(companies)))
}

// POST /api/crm/contacts
#[utoipa::path(
    post,
    path = "/api/crm/contacts",
    tag = "CRM",
    request_body = ContactPayload,
    responses(
        (status = 201, description = "Contato criado", body = Contact),
        (status = 400, description = "Dados inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_contact(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    ValidatedJson(payload): ValidatedJson<ContactPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = begin_rls_transaction(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let contact = app_state
        .crm_service
        .create_contact(
            &mut *tx,
            tenant.0,
            payload.company_id,
            payload.name.trim(),
            payload.email.as_deref(),
            payload.phone.as_deref(),
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    tx.commit()
        .await
        .map_err(|e| AppError::from(e).to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(contact)))
}

// GET /api/crm/contacts
#[utoipa::path(
    get,
    path = "/api/crm/contacts",
    tag = "CRM",
    params(ContactQuery),
    responses(
        (status = 200, description = "Contatos", body = Vec<Contact>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_contacts(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Query(query): Query<ContactQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = begin_rls_transaction(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let contacts = app_state
        .crm_service
        .list_contacts(&mut *tx, tenant.0, query.company_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    tx.commit()
        .await
        .map_err(|e| AppError::from(e).to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(contacts)))
}
