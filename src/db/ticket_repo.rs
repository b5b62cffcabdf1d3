// src/db/ticket_repo.rs

use async_trait::async_trait;
use sqlx::{Executor, PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::ticket::{
        SortOrder, Ticket, TicketHistoryEntry, TicketPriority, TicketSortField, TicketStatus,
    },
};

const TICKET_COLUMNS: &str = "id, tenant_id, title, description, client_id, priority, status, \
     sla_resolution_hours, assigned_to, created_by, created_at, updated_at";

// Filtros da listagem de chamados
#[derive(Debug, Default)]
pub struct TicketFilter {
    pub statuses: Vec<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub client_id: Option<Uuid>,
    pub search: Option<String>,
    pub sort_by: TicketSortField,
    pub order: SortOrder,
}

pub struct NewTicket<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub client_id: Option<Uuid>,
    pub priority: TicketPriority,
    pub sla_resolution_hours: i32,
    pub assigned_to: Option<Uuid>,
    pub created_by: Uuid,
}

pub struct TicketChanges<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub client_id: Option<Uuid>,
    pub priority: TicketPriority,
    // None mantém o prazo gravado
    pub sla_resolution_hours: Option<i32>,
    pub assigned_to: Option<Uuid>,
}

/// Passos de uma mudança de status. Sem `commit`, nada do que foi feito vale.
#[async_trait]
pub trait StatusChange: Send {
    async fn lock_ticket(&mut self, tenant_id: Uuid, id: Uuid) -> Result<Option<Ticket>, AppError>;

    async fn set_status(&mut self, tenant_id: Uuid, id: Uuid, status: TicketStatus) -> Result<Ticket, AppError>;

    async fn record_history(
        &mut self,
        tenant_id: Uuid,
        ticket_id: Uuid,
        from: TicketStatus,
        to: TicketStatus,
        changed_by: Uuid,
        note: Option<&str>,
    ) -> Result<(), AppError>;

    async fn commit(self) -> Result<(), AppError>;
}

// Mudança de status dentro de uma transação (ou savepoint) do Postgres
pub struct PgStatusChange<'r, 'c> {
    repo: &'r TicketRepository,
    tx: Transaction<'c, Postgres>,
}

impl<'r, 'c> PgStatusChange<'r, 'c> {
    pub fn new(repo: &'r TicketRepository, tx: Transaction<'c, Postgres>) -> Self {
        Self { repo, tx }
    }
}

#[async_trait]
impl<'r, 'c> StatusChange for PgStatusChange<'r, 'c> {
    async fn lock_ticket(&mut self, tenant_id: Uuid, id: Uuid) -> Result<Option<Ticket>, AppError> {
        self.repo.get_for_update(&mut *self.tx, tenant_id, id).await
    }

    async fn set_status(&mut self, tenant_id: Uuid, id: Uuid, status: TicketStatus) -> Result<Ticket, AppError> {
        self.repo.update_status(&mut *self.tx, tenant_id, id, status).await
    }

    async fn record_history(
        &mut self,
        tenant_id: Uuid,
        ticket_id: Uuid,
        from: TicketStatus,
        to: TicketStatus,
        changed_by: Uuid,
        note: Option<&str>,
    ) -> Result<(), AppError> {
        self.repo
            .insert_history(&mut *self.tx, tenant_id, ticket_id, from, to, changed_by, note)
            .await?;
        Ok(())
    }

    async fn commit(self) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}

// Busca textual: `%`, `_` e `\` digitados pelo usuário valem como texto
pub(crate) fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

// Expressões de ordenação; nunca interpolamos texto vindo do cliente
fn order_expression(field: TicketSortField) -> &'static str {
    match field {
        TicketSortField::CreatedAt => "created_at",
        TicketSortField::Title => "lower(title)",
        TicketSortField::Priority => {
            "CASE priority WHEN 'Urgente' THEN 3 WHEN 'Alta' THEN 2 WHEN 'Normal' THEN 1 ELSE 0 END"
        }
        TicketSortField::Status => {
            "CASE status WHEN 'Aberto' THEN 0 WHEN 'Em Andamento' THEN 1 \
             WHEN 'Aguardando Cliente' THEN 2 WHEN 'Em Revisão' THEN 3 \
             WHEN 'Resolvido' THEN 4 ELSE 5 END"
        }
    }
}

fn terminal_labels() -> Vec<String> {
    TicketStatus::ALL
        .iter()
        .filter(|s| s.is_terminal())
        .map(|s| s.as_str().to_string())
        .collect()
}

#[derive(Clone)]
pub struct TicketRepository {
    pool: PgPool,
}

impl TicketRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        ticket: &NewTicket<'_>,
    ) -> Result<Ticket, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO tickets (
                tenant_id, title, description, client_id, priority, status,
                sla_resolution_hours, assigned_to, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            TICKET_COLUMNS
        );

        let created = sqlx::query_as::<_, Ticket>(&sql)
            .bind(tenant_id)
            .bind(ticket.title)
            .bind(ticket.description)
            .bind(ticket.client_id)
            .bind(ticket.priority.as_str())
            .bind(TicketStatus::Open.as_str())
            .bind(ticket.sla_resolution_hours)
            .bind(ticket.assigned_to)
            .bind(ticket.created_by)
            .fetch_one(executor)
            .await?;

        Ok(created)
    }

    pub async fn list<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        filter: &TicketFilter,
    ) -> Result<Vec<Ticket>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!("SELECT {} FROM tickets WHERE tenant_id = ", TICKET_COLUMNS));
        qb.push_bind(tenant_id);

        if !filter.statuses.is_empty() {
            let labels: Vec<String> = filter.statuses.iter().map(|s| s.as_str().to_string()).collect();
            qb.push(" AND status = ANY(").push_bind(labels).push(")");
        }
        if let Some(priority) = filter.priority {
            qb.push(" AND priority = ").push_bind(priority.as_str());
        }
        if let Some(client_id) = filter.client_id {
            qb.push(" AND client_id = ").push_bind(client_id);
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = like_pattern(search);
            qb.push(" AND (title ILIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR description ILIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }

        let direction = match filter.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        qb.push(format!(
            " ORDER BY {} {}, created_at DESC",
            order_expression(filter.sort_by),
            direction
        ));

        let tickets = qb.build_query_as::<Ticket>().fetch_all(executor).await?;
        Ok(tickets)
    }

    // Tudo que ainda está na fila (não resolvido/cancelado)
    pub async fn list_open<'e, E>(&self, executor: E, tenant_id: Uuid) -> Result<Vec<Ticket>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {} FROM tickets WHERE tenant_id = $1 AND NOT (status = ANY($2)) ORDER BY created_at ASC",
            TICKET_COLUMNS
        );

        let tickets = sqlx::query_as::<_, Ticket>(&sql)
            .bind(tenant_id)
            .bind(terminal_labels())
            .fetch_all(executor)
            .await?;

        Ok(tickets)
    }

    pub async fn get<'e, E>(&self, executor: E, tenant_id: Uuid, id: Uuid) -> Result<Option<Ticket>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {} FROM tickets WHERE tenant_id = $1 AND id = $2", TICKET_COLUMNS);

        let ticket = sqlx::query_as::<_, Ticket>(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(ticket)
    }

    // Trava a linha até o fim da transação (mudança de status concorrente)
    pub async fn get_for_update<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Ticket>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT {} FROM tickets WHERE tenant_id = $1 AND id = $2 FOR UPDATE",
            TICKET_COLUMNS
        );

        let ticket = sqlx::query_as::<_, Ticket>(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(ticket)
    }

    pub async fn update<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
        changes: &TicketChanges<'_>,
    ) -> Result<Option<Ticket>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE tickets
            SET title = $3, description = $4, client_id = $5, priority = $6,
                sla_resolution_hours = COALESCE($7, sla_resolution_hours),
                assigned_to = $8, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING {}
            "#,
            TICKET_COLUMNS
        );

        let ticket = sqlx::query_as::<_, Ticket>(&sql)
            .bind(tenant_id)
            .bind(id)
            .bind(changes.title)
            .bind(changes.description)
            .bind(changes.client_id)
            .bind(changes.priority.as_str())
            .bind(changes.sla_resolution_hours)
            .bind(changes.assigned_to)
            .fetch_optional(executor)
            .await?;

        Ok(ticket)
    }

    pub async fn update_status<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
        status: TicketStatus,
    ) -> Result<Ticket, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE tickets SET status = $3, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING {}
            "#,
            TICKET_COLUMNS
        );

        let ticket = sqlx::query_as::<_, Ticket>(&sql)
            .bind(tenant_id)
            .bind(id)
            .bind(status.as_str())
            .fetch_one(executor)
            .await?;

        Ok(ticket)
    }

    pub async fn insert_history<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        ticket_id: Uuid,
        from: TicketStatus,
        to: TicketStatus,
        changed_by: Uuid,
        note: Option<&str>,
    ) -> Result<TicketHistoryEntry, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let entry = sqlx::query_as::<_, TicketHistoryEntry>(
            r#"
            INSERT INTO ticket_history (tenant_id, ticket_id, from_status, to_status, changed_by, note)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, tenant_id, ticket_id, from_status, to_status, changed_by, note, created_at
            "#,
        )
        .bind(tenant_id)
        .bind(ticket_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(changed_by)
        .bind(note)
        .fetch_one(executor)
        .await?;

        Ok(entry)
    }

    pub async fn list_history<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        ticket_id: Uuid,
    ) -> Result<Vec<TicketHistoryEntry>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let entries = sqlx::query_as::<_, TicketHistoryEntry>(
            r#"
            SELECT id, tenant_id, ticket_id, from_status, to_status, changed_by, note, created_at
            FROM ticket_history
            WHERE tenant_id = $1 AND ticket_id = $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id)
        .bind(ticket_id)
        .fetch_all(executor)
        .await?;

        Ok(entries)
    }

    // IDs de chamados que têm ao menos uma tarefa vinculada
    pub async fn ticket_ids_with_tasks<'e, E>(&self, executor: E, tenant_id: Uuid) -> Result<Vec<Uuid>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT ticket_id FROM tasks WHERE tenant_id = $1 AND ticket_id IS NOT NULL",
        )
        .bind(tenant_id)
        .fetch_all(executor)
        .await?;

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_wildcards_are_taken_literally() {
        assert_eq!(like_pattern("impressora"), "%impressora%");
        assert_eq!(like_pattern("50%"), "%50\\%%");
        assert_eq!(like_pattern("nota_fiscal"), "%nota\\_fiscal%");
        assert_eq!(like_pattern("C:\\temp"), "%C:\\\\temp%");
    }
}
