use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::{
    common::i18n::I18nStore,
    middleware::i18n::Locale,
    services::identity::IdentityError,
};

// Todos os erros de negócio e de infraestrutura passam por aqui.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("JSON inválido: {0}")]
    InvalidJson(String),

    #[error("Token ausente")]
    MissingToken,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Perfil não encontrado")]
    ProfileNotFound,

    #[error("Membro da equipe não encontrado")]
    TeamMemberNotFound,

    #[error("E-mail pertence a outra organização")]
    MemberOfAnotherTenant,

    #[error("Cargo não encontrado: {0}")]
    RoleNotFound(String),

    #[error("Recurso não encontrado: {0}")]
    ResourceNotFound(String),

    #[error("Transição inválida: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Etapa fora do funil do negócio")]
    StageOutsideFunnel,

    #[error("Tentativa de remover o próprio usuário")]
    SelfDeletion,

    #[error("{0}")]
    UniqueConstraintViolation(String),

    #[error("Método não permitido")]
    MethodNotAllowed,

    #[error("Rota não encontrada")]
    RouteNotFound,

    #[error("{0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("{0}")]
    Identity(#[from] IdentityError),

    #[error("{0}")]
    InternalServerError(#[from] anyhow::Error),
}

// O erro que sai para o cliente: status + mensagem já traduzida.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self { status, error: error.into(), details: None }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.error, "details": details }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::InvalidJson(_)
            | AppError::StageOutsideFunnel
            | AppError::SelfDeletion => StatusCode::BAD_REQUEST,
            AppError::MissingToken | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::ProfileNotFound
            | AppError::TeamMemberNotFound
            | AppError::RoleNotFound(_)
            | AppError::ResourceNotFound(_)
            | AppError::RouteNotFound => StatusCode::NOT_FOUND,
            AppError::DatabaseError(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::InvalidTransition { .. }
            | AppError::UniqueConstraintViolation(_)
            | AppError::MemberOfAnotherTenant => StatusCode::CONFLICT,
            AppError::DatabaseError(_) | AppError::Identity(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Converte o erro de domínio no erro HTTP, traduzido para o idioma do cliente.
    pub fn to_api_error(self, locale: &Locale, i18n: &I18nStore) -> ApiError {
        let lang = locale.0.as_str();
        let status = self.status_code();

        let error = match &self {
            AppError::ValidationError(errors) => {
                let mut details: BTreeMap<String, Vec<String>> = BTreeMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages = field_errors
                        .iter()
                        .map(|e| {
                            let code = e.message.as_deref().unwrap_or(e.code.as_ref());
                            i18n.translate(lang, &format!("validation.{}", code))
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let fields = details.keys().cloned().collect::<Vec<_>>().join(", ");
                return ApiError {
                    status,
                    error: i18n.translate_with(lang, "errors.validation", &[("fields", &fields)]),
                    details: Some(json!(details)),
                };
            }
            AppError::InvalidJson(reason) => {
                i18n.translate_with(lang, "errors.invalid_json", &[("reason", reason)])
            }
            AppError::MissingToken => i18n.translate(lang, "errors.missing_token"),
            AppError::InvalidToken => i18n.translate(lang, "errors.invalid_token"),
            AppError::ProfileNotFound => i18n.translate(lang, "errors.profile_not_found"),
            AppError::TeamMemberNotFound => i18n.translate(lang, "errors.member_not_found"),
            AppError::MemberOfAnotherTenant => i18n.translate(lang, "errors.member_other_tenant"),
            AppError::RoleNotFound(role) => {
                i18n.translate_with(lang, "errors.role_not_found", &[("role", role)])
            }
            AppError::ResourceNotFound(resource) => {
                i18n.translate_with(lang, "errors.resource_not_found", &[("resource", resource)])
            }
            AppError::InvalidTransition { from, to } => i18n.translate_with(
                lang,
                "errors.invalid_transition",
                &[("from", from), ("to", to)],
            ),
            AppError::StageOutsideFunnel => i18n.translate(lang, "errors.stage_outside_funnel"),
            AppError::SelfDeletion => i18n.translate(lang, "errors.self_delete"),
            AppError::UniqueConstraintViolation(msg) => msg.clone(),
            AppError::MethodNotAllowed => i18n.translate(lang, "errors.method_not_allowed"),
            AppError::RouteNotFound => i18n.translate(lang, "errors.route_not_found"),
            AppError::DatabaseError(sqlx::Error::RowNotFound) => {
                i18n.translate_with(lang, "errors.resource_not_found", &[("resource", "Registro")])
            }
            // Falhas do provedor/banco: a mensagem original segue para o cliente.
            e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                e.to_string()
            }
        };

        ApiError { status, error, details: None }
    }
}

// Tradução de violação de unicidade, usada pelos repositórios
pub(crate) fn map_unique_violation(e: sqlx::Error, message: impl Into<String>) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AppError::UniqueConstraintViolation(message.into());
        }
    }
    e.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Payload {
        #[validate(required(message = "required"))]
        role_name: Option<String>,
        #[validate(email(message = "invalid_email"))]
        email: Option<String>,
    }

    fn pt() -> Locale {
        Locale("pt".to_string())
    }

    #[test]
    fn validation_errors_name_the_missing_fields() {
        let store = I18nStore::load().unwrap();
        let errors = Payload { role_name: None, email: Some("nao-e-email".into()) }
            .validate()
            .unwrap_err();

        let api = AppError::ValidationError(errors).to_api_error(&pt(), &store);

        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.error, "Campos inválidos ou ausentes: email, role_name");
        let details = api.details.unwrap();
        assert_eq!(details["role_name"][0], "O campo é obrigatório.");
        assert_eq!(details["email"][0], "E-mail inválido.");
    }

    #[test]
    fn maps_each_kind_to_its_status() {
        assert_eq!(AppError::MissingToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::ProfileNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::RoleNotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::MethodNotAllowed.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(AppError::MemberOfAnotherTenant.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::DatabaseError(sqlx::Error::RowNotFound).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::DatabaseError(sqlx::Error::PoolTimedOut).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_errors_pass_the_message_through() {
        let store = I18nStore::load().unwrap();
        let err = AppError::Identity(IdentityError::Api {
            status: 422,
            message: "A user with this email address has already been registered".into(),
        });

        let api = err.to_api_error(&pt(), &store);

        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.error, "A user with this email address has already been registered");
    }

    #[test]
    fn english_locale_is_honored() {
        let store = I18nStore::load().unwrap();
        let api = AppError::MissingToken.to_api_error(&Locale("en".into()), &store);
        assert_eq!(api.error, "Missing Authorization header.");
    }
}
