// src/models/dashboard.rs

use serde::Serialize;
use utoipa::ToSchema;

// Os cards do topo do painel de chamados
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub awaiting_client: usize, // Status "Aguardando Cliente"
    pub late: usize,            // Em aberto e com SLA estourado
    pub without_task: usize,    // Em aberto e sem tarefa vinculada
    pub in_queue: usize,        // Total em aberto (não resolvido/cancelado)
}
