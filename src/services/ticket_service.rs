// src/services/ticket_service.rs

use chrono::{DateTime, Utc};
use sqlx::{Acquire, Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{
        ticket_repo::{NewTicket, PgStatusChange, StatusChange, TicketChanges, TicketFilter},
        TicketRepository,
    },
    models::ticket::{
        BoardColumn, Ticket, TicketHistoryEntry, TicketPriority, TicketStatus, TicketView,
        TransitionPolicy,
    },
    services::sla::SlaEvaluator,
};

// Dados de criação/edição vindos do handler
pub struct TicketDraft<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub client_id: Option<Uuid>,
    pub priority: TicketPriority,
    pub sla_resolution_hours: Option<i32>,
    pub assigned_to: Option<Uuid>,
}

impl TicketDraft<'_> {
    // Sem prazo informado, vale o padrão da prioridade
    fn sla_hours(&self) -> i32 {
        self.sla_resolution_hours
            .unwrap_or_else(|| self.priority.default_sla_hours())
    }

    // Na edição, prazo ausente mantém o que já está gravado
    fn changes(&self) -> TicketChanges<'_> {
        TicketChanges {
            title: self.title,
            description: self.description,
            client_id: self.client_id,
            priority: self.priority,
            sla_resolution_hours: self.sla_resolution_hours,
            assigned_to: self.assigned_to,
        }
    }
}

#[derive(Clone)]
pub struct TicketService {
    repo: TicketRepository,
    sla: SlaEvaluator,
    policy: TransitionPolicy,
}

impl TicketService {
    pub fn new(repo: TicketRepository, sla: SlaEvaluator, policy: TransitionPolicy) -> Self {
        Self { repo, sla, policy }
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    /// Anexa a avaliação de SLA; chamados finalizados ficam sem.
    pub fn view(&self, ticket: Ticket, now: DateTime<Utc>, lang: &str) -> TicketView {
        let sla = (!ticket.status.is_terminal()).then(|| {
            self.sla
                .evaluate(ticket.created_at, ticket.sla_resolution_hours, now, lang)
        });
        TicketView { ticket, sla }
    }

    pub async fn create_ticket<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        created_by: Uuid,
        draft: &TicketDraft<'_>,
        now: DateTime<Utc>,
        lang: &str,
    ) -> Result<TicketView, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let new_ticket = NewTicket {
            title: draft.title,
            description: draft.description,
            client_id: draft.client_id,
            priority: draft.priority,
            sla_resolution_hours: draft.sla_hours(),
            assigned_to: draft.assigned_to,
            created_by,
        };

        let ticket = self.repo.create(executor, tenant_id, &new_ticket).await?;
        tracing::info!("Chamado {} aberto no tenant {}", ticket.id, tenant_id);

        Ok(self.view(ticket, now, lang))
    }

    pub async fn list_tickets<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        filter: &TicketFilter,
        now: DateTime<Utc>,
        lang: &str,
    ) -> Result<Vec<TicketView>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let tickets = self.repo.list(executor, tenant_id, filter).await?;
        Ok(tickets.into_iter().map(|t| self.view(t, now, lang)).collect())
    }

    pub async fn get_ticket<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
        now: DateTime<Utc>,
        lang: &str,
    ) -> Result<TicketView, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let ticket = self
            .repo
            .get(executor, tenant_id, id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Chamado".into()))?;

        Ok(self.view(ticket, now, lang))
    }

    // O status só muda por `change_status`
    pub async fn update_ticket<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
        draft: &TicketDraft<'_>,
        now: DateTime<Utc>,
        lang: &str,
    ) -> Result<TicketView, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let ticket = self
            .repo
            .update(executor, tenant_id, id, &draft.changes())
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Chamado".into()))?;

        Ok(self.view(ticket, now, lang))
    }

    /// Muda o status e grava o histórico na mesma transação.
    pub async fn change_status<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
        target: TicketStatus,
        changed_by: Uuid,
        note: Option<&str>,
    ) -> Result<Ticket, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let tx = executor.begin().await?;
        let change = PgStatusChange::new(&self.repo, tx);

        self.apply_status_change(change, tenant_id, id, target, changed_by, note)
            .await
    }

    // Qualquer erro antes do commit descarta a mudança inteira
    async fn apply_status_change<S: StatusChange>(
        &self,
        mut change: S,
        tenant_id: Uuid,
        id: Uuid,
        target: TicketStatus,
        changed_by: Uuid,
        note: Option<&str>,
    ) -> Result<Ticket, AppError> {
        let current = change
            .lock_ticket(tenant_id, id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Chamado".into()))?;

        if !current.status.can_transition_to(target, self.policy) {
            return Err(AppError::InvalidTransition {
                from: current.status.to_string(),
                to: target.to_string(),
            });
        }

        let updated = change.set_status(tenant_id, id, target).await?;
        change
            .record_history(tenant_id, id, current.status, target, changed_by, note)
            .await?;
        change.commit().await?;

        tracing::info!("Chamado {}: {} -> {}", id, current.status, target);
        Ok(updated)
    }

    pub async fn history(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Vec<TicketHistoryEntry>, AppError> {
        self.repo
            .get(&mut *conn, tenant_id, id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Chamado".into()))?;

        self.repo.list_history(&mut *conn, tenant_id, id).await
    }

    pub async fn board<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        now: DateTime<Utc>,
        lang: &str,
    ) -> Result<Vec<BoardColumn>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let tickets = self.repo.list_open(executor, tenant_id).await?;
        let views = tickets.into_iter().map(|t| self.view(t, now, lang)).collect();
        Ok(group_board(views))
    }
}

/// Agrupa os chamados nas quatro colunas do pipeline, na ordem de exibição.
pub fn group_board(views: Vec<TicketView>) -> Vec<BoardColumn> {
    let mut columns: Vec<BoardColumn> = TicketStatus::PIPELINE
        .iter()
        .map(|&status| BoardColumn { status, tickets: Vec::new() })
        .collect();

    for view in views {
        if let Some(pos) = view.ticket.status.pipeline_position() {
            columns[pos].tickets.push(view);
        }
    }

    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{Duration, FixedOffset, TimeZone};
    use sqlx::postgres::PgPoolOptions;

    use crate::common::i18n::I18nStore;

    // O que já foi confirmado no "banco"
    #[derive(Default)]
    struct Stored {
        tickets: Vec<Ticket>,
        history: Vec<(TicketStatus, TicketStatus)>,
    }

    // Transação em memória: escreve em rascunho e só publica no commit
    struct FakeChange<'s> {
        stored: &'s Mutex<Stored>,
        staged_ticket: Option<Ticket>,
        staged_history: Vec<(TicketStatus, TicketStatus)>,
        fail_history: bool,
    }

    impl<'s> FakeChange<'s> {
        fn new(stored: &'s Mutex<Stored>) -> Self {
            Self { stored, staged_ticket: None, staged_history: Vec::new(), fail_history: false }
        }
    }

    #[async_trait]
    impl<'s> StatusChange for FakeChange<'s> {
        async fn lock_ticket(&mut self, _tenant_id: Uuid, id: Uuid) -> Result<Option<Ticket>, AppError> {
            Ok(self.stored.lock().unwrap().tickets.iter().find(|t| t.id == id).cloned())
        }

        async fn set_status(&mut self, _tenant_id: Uuid, id: Uuid, status: TicketStatus) -> Result<Ticket, AppError> {
            let mut ticket = self
                .stored
                .lock()
                .unwrap()
                .tickets
                .iter()
                .find(|t| t.id == id)
                .cloned()
                .ok_or(AppError::DatabaseError(sqlx::Error::RowNotFound))?;
            ticket.status = status;
            self.staged_ticket = Some(ticket.clone());
            Ok(ticket)
        }

        async fn record_history(
            &mut self,
            _tenant_id: Uuid,
            _ticket_id: Uuid,
            from: TicketStatus,
            to: TicketStatus,
            _changed_by: Uuid,
            _note: Option<&str>,
        ) -> Result<(), AppError> {
            if self.fail_history {
                return Err(AppError::InternalServerError(anyhow::anyhow!(
                    "falha ao gravar o histórico"
                )));
            }
            self.staged_history.push((from, to));
            Ok(())
        }

        async fn commit(self) -> Result<(), AppError> {
            let mut stored = self.stored.lock().unwrap();
            if let Some(ticket) = self.staged_ticket {
                stored.tickets.retain(|t| t.id != ticket.id);
                stored.tickets.push(ticket);
            }
            stored.history.extend(self.staged_history);
            Ok(())
        }
    }

    fn stored_with(ticket: &Ticket) -> Mutex<Stored> {
        Mutex::new(Stored { tickets: vec![ticket.clone()], history: Vec::new() })
    }

    fn stored_status(stored: &Mutex<Stored>, id: Uuid) -> TicketStatus {
        stored.lock().unwrap().tickets.iter().find(|t| t.id == id).unwrap().status
    }

    fn service() -> TicketService {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/helpdesk")
            .unwrap();
        let offset = FixedOffset::west_opt(3 * 3600).unwrap();
        let sla = SlaEvaluator::new(offset, Arc::new(I18nStore::load().unwrap()));
        TicketService::new(TicketRepository::new(pool), sla, TransitionPolicy::Guarded)
    }

    fn ticket(status: TicketStatus, created_at: DateTime<Utc>) -> Ticket {
        Ticket {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            title: "Sem acesso ao e-mail".into(),
            description: None,
            client_id: None,
            priority: TicketPriority::Normal,
            status,
            sla_resolution_hours: 24,
            assigned_to: None,
            created_by: None,
            created_at,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn terminal_tickets_have_no_sla() {
        let svc = service();
        let t0 = Utc.with_ymd_and_hms(2026, 5, 9, 12, 0, 0).unwrap();
        let later = t0 + Duration::hours(30);

        let open = svc.view(ticket(TicketStatus::Open, t0), later, "pt");
        let resolved = svc.view(ticket(TicketStatus::Resolved, t0), later, "pt");

        assert!(open.sla.unwrap().is_late);
        assert!(resolved.sla.is_none());
    }

    #[tokio::test]
    async fn board_groups_active_tickets_in_display_order() {
        let svc = service();
        let t0 = Utc.with_ymd_and_hms(2026, 5, 9, 12, 0, 0).unwrap();
        let views = [
            TicketStatus::Review,
            TicketStatus::Open,
            TicketStatus::Cancelled,
            TicketStatus::Open,
            TicketStatus::AwaitingClient,
        ]
        .into_iter()
        .map(|s| svc.view(ticket(s, t0), t0, "pt"))
        .collect();

        let board = group_board(views);

        let statuses: Vec<_> = board.iter().map(|c| c.status).collect();
        assert_eq!(statuses, TicketStatus::PIPELINE.to_vec());
        let counts: Vec<_> = board.iter().map(|c| c.tickets.len()).collect();
        assert_eq!(counts, vec![2, 0, 1, 1]);
    }

    #[tokio::test]
    async fn status_change_commits_the_update_and_the_history_row() {
        let svc = service();
        let t = ticket(TicketStatus::Open, Utc::now());
        let stored = stored_with(&t);

        let updated = svc
            .apply_status_change(FakeChange::new(&stored), t.tenant_id, t.id, TicketStatus::InProgress, Uuid::new_v4(), None)
            .await
            .unwrap();

        assert_eq!(updated.status, TicketStatus::InProgress);
        assert_eq!(stored_status(&stored, t.id), TicketStatus::InProgress);
        assert_eq!(
            stored.lock().unwrap().history,
            vec![(TicketStatus::Open, TicketStatus::InProgress)]
        );
    }

    #[tokio::test]
    async fn rejected_transition_is_a_conflict_and_changes_nothing() {
        let svc = service();
        let t = ticket(TicketStatus::Resolved, Utc::now());
        let stored = stored_with(&t);

        let err = svc
            .apply_status_change(FakeChange::new(&stored), t.tenant_id, t.id, TicketStatus::Review, Uuid::new_v4(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidTransition { .. }));
        assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);
        assert_eq!(stored_status(&stored, t.id), TicketStatus::Resolved);
        assert!(stored.lock().unwrap().history.is_empty());
    }

    #[tokio::test]
    async fn failed_history_insert_discards_the_status_update() {
        let svc = service();
        let t = ticket(TicketStatus::Open, Utc::now());
        let stored = stored_with(&t);
        let change = FakeChange { fail_history: true, ..FakeChange::new(&stored) };

        let err = svc
            .apply_status_change(change, t.tenant_id, t.id, TicketStatus::InProgress, Uuid::new_v4(), Some("assumido"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InternalServerError(_)));
        assert_eq!(stored_status(&stored, t.id), TicketStatus::Open);
        assert!(stored.lock().unwrap().history.is_empty());
    }

    #[tokio::test]
    async fn status_change_of_an_unknown_ticket_is_404() {
        let svc = service();
        let stored = Mutex::new(Stored::default());

        let err = svc
            .apply_status_change(FakeChange::new(&stored), Uuid::nil(), Uuid::new_v4(), TicketStatus::InProgress, Uuid::new_v4(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ResourceNotFound(_)));
    }

    #[test]
    fn edit_without_sla_keeps_the_stored_deadline() {
        let draft = TicketDraft {
            title: "Troca de toner",
            description: None,
            client_id: None,
            priority: TicketPriority::High,
            sla_resolution_hours: None,
            assigned_to: None,
        };
        assert_eq!(draft.changes().sla_resolution_hours, None);

        let custom = TicketDraft { sla_resolution_hours: Some(48), ..draft };
        assert_eq!(custom.changes().sla_resolution_hours, Some(48));
    }

    #[test]
    fn missing_sla_uses_the_priority_default() {
        let draft = TicketDraft {
            title: "Servidor fora do ar",
            description: None,
            client_id: None,
            priority: TicketPriority::Urgent,
            sla_resolution_hours: None,
            assigned_to: None,
        };
        assert_eq!(draft.sla_hours(), 4);

        let custom = TicketDraft { sla_resolution_hours: Some(10), ..draft };
        assert_eq!(custom.sla_hours(), 10);
    }
}
