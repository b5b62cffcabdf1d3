// src/models/crm.rs

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::ticket::UnknownVariant;

// --- ENUMS ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum DealStatus {
    #[serde(rename = "Ativo")]
    Active,
    #[serde(rename = "Ganho")]
    Won,
    #[serde(rename = "Perdido")]
    Lost,
}

impl DealStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DealStatus::Active => "Ativo",
            DealStatus::Won => "Ganho",
            DealStatus::Lost => "Perdido",
        }
    }
}

impl FromStr for DealStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Ativo" => Ok(DealStatus::Active),
            "Ganho" => Ok(DealStatus::Won),
            "Perdido" => Ok(DealStatus::Lost),
            _ => Err(UnknownVariant { kind: "status do negócio", value: s.to_string() }),
        }
    }
}

impl TryFrom<String> for DealStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// --- CONFIGURAÇÃO (FUNIS E ETAPAS) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Funnel {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    #[schema(example = "Vendas B2B")]
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub funnel_id: Uuid,
    #[schema(example = "Proposta enviada")]
    pub name: String,
    #[schema(example = 2)]
    pub position: i32,
    #[schema(example = "#3B82F6")]
    pub color: Option<String>,
}

// --- NEGÓCIOS ---

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    #[schema(example = "Contrato anual de suporte")]
    pub title: String,
    #[schema(example = "15000.00")]
    pub value: Decimal,
    pub funnel_id: Uuid,
    pub stage_id: Uuid,
    pub company_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub responsible_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub status: DealStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoardStage {
    #[serde(flatten)]
    pub stage: Stage,
    pub total_value: Decimal,
    pub deals: Vec<Deal>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FunnelBoard {
    pub funnel: Funnel,
    pub stages: Vec<BoardStage>,
}

// --- EMPRESAS E CONTATOS ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    #[schema(example = "Construtora Horizonte")]
    pub name: String,
    pub document: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub company_id: Option<Uuid>,
    #[schema(example = "Marcos Pereira")]
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Funil recém-criado com as etapas iniciais.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FunnelWithStages {
    #[serde(flatten)]
    pub funnel: Funnel,
    pub stages: Vec<Stage>,
}
