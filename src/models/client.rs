// src/models/client.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,

    #[schema(example = "Padaria Pão Quente Ltda")]
    pub name: String,
    // CPF ou CNPJ, sem validação de formato
    #[schema(example = "12.345.678/0001-99")]
    pub document: Option<String>,
    #[schema(example = "contato@paoquente.com.br")]
    pub email: Option<String>,
    #[schema(example = "(11) 99999-8888")]
    pub phone: Option<String>,
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}
