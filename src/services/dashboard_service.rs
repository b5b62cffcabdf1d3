// src/services/dashboard_service.rs

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::TicketRepository,
    models::{
        dashboard::DashboardSummary,
        ticket::{Ticket, TicketStatus},
    },
    services::sla::SlaEvaluator,
};

#[derive(Clone)]
pub struct DashboardService {
    tickets: TicketRepository,
    sla: SlaEvaluator,
}

impl DashboardService {
    pub fn new(tickets: TicketRepository, sla: SlaEvaluator) -> Self {
        Self { tickets, sla }
    }

    pub async fn get_summary(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<DashboardSummary, AppError> {
        let open = self.tickets.list_open(&mut *conn, tenant_id).await?;
        let with_tasks: HashSet<Uuid> = self
            .tickets
            .ticket_ids_with_tasks(&mut *conn, tenant_id)
            .await?
            .into_iter()
            .collect();

        Ok(summarize(&open, &with_tasks, now, &self.sla))
    }
}

/// Contadores do painel. Chamados resolvidos/cancelados nunca entram.
pub fn summarize(
    tickets: &[Ticket],
    with_tasks: &HashSet<Uuid>,
    now: DateTime<Utc>,
    sla: &SlaEvaluator,
) -> DashboardSummary {
    tickets
        .iter()
        .filter(|t| !t.status.is_terminal())
        .fold(DashboardSummary::default(), |mut acc, t| {
            acc.in_queue += 1;
            if t.status == TicketStatus::AwaitingClient {
                acc.awaiting_client += 1;
            }
            // O idioma não importa para a contagem
            if sla.evaluate(t.created_at, t.sla_resolution_hours, now, "pt").is_late {
                acc.late += 1;
            }
            if !with_tasks.contains(&t.id) {
                acc.without_task += 1;
            }
            acc
        })
}
