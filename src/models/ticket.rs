// src/models/ticket.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::services::sla::SlaEvaluation;

#[derive(Debug, Error)]
#[error("Valor desconhecido para {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

// --- STATUS DO CHAMADO ---

// Os valores gravados no banco são os rótulos em português
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum TicketStatus {
    #[serde(rename = "Aberto")]
    Open,
    #[serde(rename = "Em Andamento")]
    InProgress,
    #[serde(rename = "Aguardando Cliente")]
    AwaitingClient,
    #[serde(rename = "Em Revisão")]
    Review,
    #[serde(rename = "Resolvido")]
    Resolved,
    #[serde(rename = "Cancelado")]
    Cancelled,
}

/// Política aplicada às mudanças de status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPolicy {
    /// Qualquer status para qualquer outro.
    Free,
    /// Etapas ativas livres entre si; finalizados só podem ser reabertos.
    Guarded,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 6] = [
        TicketStatus::Open,
        TicketStatus::InProgress,
        TicketStatus::AwaitingClient,
        TicketStatus::Review,
        TicketStatus::Resolved,
        TicketStatus::Cancelled,
    ];

    // Colunas do pipeline, na ordem de exibição
    pub const PIPELINE: [TicketStatus; 4] = [
        TicketStatus::Open,
        TicketStatus::InProgress,
        TicketStatus::AwaitingClient,
        TicketStatus::Review,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "Aberto",
            TicketStatus::InProgress => "Em Andamento",
            TicketStatus::AwaitingClient => "Aguardando Cliente",
            TicketStatus::Review => "Em Revisão",
            TicketStatus::Resolved => "Resolvido",
            TicketStatus::Cancelled => "Cancelado",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Resolved | TicketStatus::Cancelled)
    }

    /// Posição na coluna do pipeline; `None` para os finalizados.
    pub fn pipeline_position(&self) -> Option<usize> {
        Self::PIPELINE.iter().position(|s| s == self)
    }

    pub fn can_transition_to(&self, target: TicketStatus, policy: TransitionPolicy) -> bool {
        match policy {
            TransitionPolicy::Free => true,
            TransitionPolicy::Guarded => {
                if *self == target {
                    return false;
                }
                if self.is_terminal() {
                    return target == TicketStatus::Open;
                }
                true
            }
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant { kind: "status", value: s.to_string() })
    }
}

impl TryFrom<String> for TicketStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for TransitionPolicy {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(TransitionPolicy::Free),
            "guarded" => Ok(TransitionPolicy::Guarded),
            _ => Err(UnknownVariant { kind: "política de transição", value: s.to_string() }),
        }
    }
}

// --- PRIORIDADE ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum TicketPriority {
    #[serde(rename = "Baixa")]
    Low,
    #[serde(rename = "Normal")]
    Normal,
    #[serde(rename = "Alta")]
    High,
    #[serde(rename = "Urgente")]
    Urgent,
}

impl TicketPriority {
    pub const ALL: [TicketPriority; 4] = [
        TicketPriority::Low,
        TicketPriority::Normal,
        TicketPriority::High,
        TicketPriority::Urgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "Baixa",
            TicketPriority::Normal => "Normal",
            TicketPriority::High => "Alta",
            TicketPriority::Urgent => "Urgente",
        }
    }

    // Prazo usado quando o chamado é aberto sem SLA explícito
    pub fn default_sla_hours(&self) -> i32 {
        match self {
            TicketPriority::Low => 72,
            TicketPriority::Normal => 24,
            TicketPriority::High => 8,
            TicketPriority::Urgent => 4,
        }
    }
}

impl FromStr for TicketPriority {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownVariant { kind: "prioridade", value: s.to_string() })
    }
}

impl TryFrom<String> for TicketPriority {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// --- REGISTROS ---

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    #[schema(example = "Impressora do financeiro não imprime")]
    pub title: String,
    pub description: Option<String>,
    // Nulo = chamado interno
    pub client_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub priority: TicketPriority,
    #[sqlx(try_from = "String")]
    pub status: TicketStatus,
    #[schema(example = 24)]
    pub sla_resolution_hours: i32,
    pub assigned_to: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Chamado com a avaliação de SLA calculada no momento da leitura.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketView {
    #[serde(flatten)]
    pub ticket: Ticket,
    // Nulo para chamados resolvidos/cancelados
    pub sla: Option<SlaEvaluation>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketHistoryEntry {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub ticket_id: Uuid,
    pub from_status: Option<String>,
    pub to_status: String,
    pub changed_by: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoardColumn {
    pub status: TicketStatus,
    pub tickets: Vec<TicketView>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum TicketSortField {
    #[default]
    CreatedAt,
    Title,
    Priority,
    Status,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[cfg(test)]
mod tests {
    use super::*;
    use TicketStatus::*;

    #[test]
    fn stored_labels_round_trip_through_from_str() {
        for status in TicketStatus::ALL {
            assert_eq!(status.as_str().parse::<TicketStatus>().unwrap(), status);
        }
        assert!("Fechado".parse::<TicketStatus>().is_err());
        assert_eq!(serde_json::to_value(AwaitingClient).unwrap(), "Aguardando Cliente");
    }

    #[test]
    fn terminal_statuses_leave_the_pipeline() {
        assert_eq!(Open.pipeline_position(), Some(0));
        assert_eq!(Review.pipeline_position(), Some(3));
        assert_eq!(Resolved.pipeline_position(), None);
        assert_eq!(Cancelled.pipeline_position(), None);
        assert!(TicketStatus::PIPELINE.iter().all(|s| !s.is_terminal()));
    }

    #[test]
    fn free_policy_allows_every_jump() {
        for from in TicketStatus::ALL {
            for to in TicketStatus::ALL {
                assert!(from.can_transition_to(to, TransitionPolicy::Free));
            }
        }
    }

    #[test]
    fn guarded_policy_allows_skipping_and_moving_back_among_active_stages() {
        let p = TransitionPolicy::Guarded;
        assert!(Open.can_transition_to(Review, p));
        assert!(Review.can_transition_to(Open, p));
        assert!(AwaitingClient.can_transition_to(InProgress, p));
        assert!(InProgress.can_transition_to(Cancelled, p));
        assert!(Open.can_transition_to(Resolved, p));
    }

    #[test]
    fn guarded_policy_only_reopens_terminal_tickets() {
        let p = TransitionPolicy::Guarded;
        assert!(!Cancelled.can_transition_to(InProgress, p));
        assert!(!Resolved.can_transition_to(Review, p));
        assert!(!Resolved.can_transition_to(Cancelled, p));
        assert!(Cancelled.can_transition_to(Open, p));
        assert!(Resolved.can_transition_to(Open, p));
        assert!(!Open.can_transition_to(Open, p));
    }

    #[test]
    fn policy_parses_from_config_values() {
        assert_eq!("free".parse::<TransitionPolicy>().unwrap(), TransitionPolicy::Free);
        assert_eq!(" Guarded ".parse::<TransitionPolicy>().unwrap(), TransitionPolicy::Guarded);
        assert!("strict".parse::<TransitionPolicy>().is_err());
    }

    #[test]
    fn default_sla_follows_priority() {
        assert_eq!(TicketPriority::Urgent.default_sla_hours(), 4);
        assert_eq!(TicketPriority::Low.default_sla_hours(), 72);
        assert_eq!("Urgente".parse::<TicketPriority>().unwrap(), TicketPriority::Urgent);
    }
}
