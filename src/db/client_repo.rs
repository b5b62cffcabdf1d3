// src/db/client_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::{map_unique_violation, AppError},
    models::client::Client,
};

const CLIENT_COLUMNS: &str =
    "id, tenant_id, name, document, email, phone, notes, created_at, updated_at";

// Campos editáveis de um cliente
pub struct ClientFields<'a> {
    pub name: &'a str,
    pub document: Option<&'a str>,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub notes: Option<&'a str>,
}

#[derive(Clone)]
pub struct ClientRepository {
    pool: PgPool,
}

impl ClientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        fields: &ClientFields<'_>,
    ) -> Result<Client, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO clients (tenant_id, name, document, email, phone, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            CLIENT_COLUMNS
        );

        sqlx::query_as::<_, Client>(&sql)
            .bind(tenant_id)
            .bind(fields.name)
            .bind(fields.document)
            .bind(fields.email)
            .bind(fields.phone)
            .bind(fields.notes)
            .fetch_one(executor)
            .await
            .map_err(|e| map_unique_violation(e, "Já existe um cliente com este documento."))
    }

    // Busca opcional por nome, documento ou e-mail
    pub async fn list<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        search: Option<&str>,
    ) -> Result<Vec<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            SELECT {}
            FROM clients
            WHERE tenant_id = $1
              AND ($2::text IS NULL
                   OR name ILIKE '%' || $2 || '%'
                   OR document ILIKE '%' || $2 || '%'
                   OR email ILIKE '%' || $2 || '%')
            ORDER BY name ASC
            "#,
            CLIENT_COLUMNS
        );

        let clients = sqlx::query_as::<_, Client>(&sql)
            .bind(tenant_id)
            .bind(search)
            .fetch_all(executor)
            .await?;

        Ok(clients)
    }

    pub async fn get<'e, E>(&self, executor: E, tenant_id: Uuid, id: Uuid) -> Result<Option<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {} FROM clients WHERE tenant_id = $1 AND id = $2", CLIENT_COLUMNS);

        let client = sqlx::query_as::<_, Client>(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(client)
    }

    pub async fn update<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
        fields: &ClientFields<'_>,
    ) -> Result<Option<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE clients
            SET name = $3, document = $4, email = $5, phone = $6, notes = $7, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING {}
            "#,
            CLIENT_COLUMNS
        );

        sqlx::query_as::<_, Client>(&sql)
            .bind(tenant_id)
            .bind(id)
            .bind(fields.name)
            .bind(fields.document)
            .bind(fields.email)
            .bind(fields.phone)
            .bind(fields.notes)
            .fetch_optional(executor)
            .await
            .map_err(|e| map_unique_violation(e, "Já existe um cliente com este documento."))
    }

    // Retorna se alguma linha foi removida
    pub async fn delete<'e, E>(&self, executor: E, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM clients WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
