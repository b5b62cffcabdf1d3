// src/db/crm_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::{map_unique_violation, AppError},
    models::crm::{Company, Contact, Deal, DealStatus, Funnel, Stage},
};

const DEAL_COLUMNS: &str = "id, tenant_id, title, value, funnel_id, stage_id, company_id, \
     contact_id, responsible_id, status, created_at, updated_at";

pub struct DealFields<'a> {
    pub title: &'a str,
    pub value: Decimal,
    pub company_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub responsible_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct CrmRepository {
    pool: PgPool,
}

impl CrmRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  FUNIS E ETAPAS
    // =========================================================================

    pub async fn create_funnel<'e, E>(&self, executor: E, tenant_id: Uuid, name: &str) -> Result<Funnel, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Funnel>(
            r#"
            INSERT INTO crm_funnels (tenant_id, name)
            VALUES ($1, $2)
            RETURNING id, tenant_id, name, created_at
            "#,
        )
        .bind(tenant_id)
        .bind(name)
        .fetch_one(executor)
        .await
        .map_err(|e| map_unique_violation(e, format!("O funil '{}' já existe.", name)))
    }

    pub async fn list_funnels<'e, E>(&self, executor: E, tenant_id: Uuid) -> Result<Vec<Funnel>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let funnels = sqlx::query_as::<_, Funnel>(
            "SELECT id, tenant_id, name, created_at FROM crm_funnels WHERE tenant_id = $1 ORDER BY created_at",
        )
        .bind(tenant_id)
        .fetch_all(executor)
        .await?;

        Ok(funnels)
    }

    pub async fn get_funnel<'e, E>(&self, executor: E, tenant_id: Uuid, id: Uuid) -> Result<Option<Funnel>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let funnel = sqlx::query_as::<_, Funnel>(
            "SELECT id, tenant_id, name, created_at FROM crm_funnels WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(funnel)
    }

    /// Nova etapa entra no fim do funil quando a posição não é informada.
    pub async fn create_stage<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        funnel_id: Uuid,
        name: &str,
        position: Option<i32>,
        color: Option<&str>,
    ) -> Result<Stage, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let stage = sqlx::query_as::<_, Stage>(
            r#"
            INSERT INTO crm_stages (tenant_id, funnel_id, name, position, color)
            VALUES (
                $1, $2, $3,
                COALESCE($4, (SELECT COALESCE(MAX(position), 0) + 1 FROM crm_stages WHERE funnel_id = $2)),
                $5
            )
            RETURNING id, tenant_id, funnel_id, name, position, color
            "#,
        )
        .bind(tenant_id)
        .bind(funnel_id)
        .bind(name)
        .bind(position)
        .bind(color)
        .fetch_one(executor)
        .await?;

        Ok(stage)
    }

    pub async fn list_stages<'e, E>(&self, executor: E, tenant_id: Uuid, funnel_id: Uuid) -> Result<Vec<Stage>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let stages = sqlx::query_as::<_, Stage>(
            r#"
            SELECT id, tenant_id, funnel_id, name, position, color
            FROM crm_stages
            WHERE tenant_id = $1 AND funnel_id = $2
            ORDER BY position ASC
            "#,
        )
        .bind(tenant_id)
        .bind(funnel_id)
        .fetch_all(executor)
        .await?;

        Ok(stages)
    }

    pub async fn get_stage<'e, E>(&self, executor: E, tenant_id: Uuid, id: Uuid) -> Result<Option<Stage>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let stage = sqlx::query_as::<_, Stage>(
            "SELECT id, tenant_id, funnel_id, name, position, color FROM crm_stages WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(stage)
    }

    // =========================================================================
    //  NEGÓCIOS
    // =========================================================================

    pub async fn create_deal<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        funnel_id: Uuid,
        stage_id: Uuid,
        fields: &DealFields<'_>,
    ) -> Result<Deal, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO crm_deals (
                tenant_id, title, value, funnel_id, stage_id,
                company_id, contact_id, responsible_id, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            DEAL_COLUMNS
        );

        let deal = sqlx::query_as::<_, Deal>(&sql)
            .bind(tenant_id)
            .bind(fields.title)
            .bind(fields.value)
            .bind(funnel_id)
            .bind(stage_id)
            .bind(fields.company_id)
            .bind(fields.contact_id)
            .bind(fields.responsible_id)
            .bind(DealStatus::Active.as_str())
            .fetch_one(executor)
            .await?;

        Ok(deal)
    }

    pub async fn list_deals<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        funnel_id: Option<Uuid>,
    ) -> Result<Vec<Deal>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            SELECT {}
            FROM crm_deals
            WHERE tenant_id = $1 AND ($2::uuid IS NULL OR funnel_id = $2)
            ORDER BY created_at DESC
            "#,
            DEAL_COLUMNS
        );

        let deals = sqlx::query_as::<_, Deal>(&sql)
            .bind(tenant_id)
            .bind(funnel_id)
            .fetch_all(executor)
            .await?;

        Ok(deals)
    }

    pub async fn get_deal<'e, E>(&self, executor: E, tenant_id: Uuid, id: Uuid) -> Result<Option<Deal>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {} FROM crm_deals WHERE tenant_id = $1 AND id = $2", DEAL_COLUMNS);

        let deal = sqlx::query_as::<_, Deal>(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(deal)
    }

    pub async fn update_deal<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
        fields: &DealFields<'_>,
    ) -> Result<Option<Deal>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE crm_deals
            SET title = $3, value = $4, company_id = $5, contact_id = $6,
                responsible_id = $7, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING {}
            "#,
            DEAL_COLUMNS
        );

        let deal = sqlx::query_as::<_, Deal>(&sql)
            .bind(tenant_id)
            .bind(id)
            .bind(fields.title)
            .bind(fields.value)
            .bind(fields.company_id)
            .bind(fields.contact_id)
            .bind(fields.responsible_id)
            .fetch_optional(executor)
            .await?;

        Ok(deal)
    }

    pub async fn move_deal<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
        stage_id: Uuid,
    ) -> Result<Deal, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "UPDATE crm_deals SET stage_id = $3, updated_at = NOW() WHERE tenant_id = $1 AND id = $2 RETURNING {}",
            DEAL_COLUMNS
        );

        let deal = sqlx::query_as::<_, Deal>(&sql)
            .bind(tenant_id)
            .bind(id)
            .bind(stage_id)
            .fetch_one(executor)
            .await?;

        Ok(deal)
    }

    pub async fn set_deal_status<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
        status: DealStatus,
    ) -> Result<Option<Deal>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "UPDATE crm_deals SET status = $3, updated_at = NOW() WHERE tenant_id = $1 AND id = $2 RETURNING {}",
            DEAL_COLUMNS
        );

        let deal = sqlx::query_as::<_, Deal>(&sql)
            .bind(tenant_id)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(executor)
            .await?;

        Ok(deal)
    }

    pub async fn delete_deal<'e, E>(&self, executor: E, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM crm_deals WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    //  EMPRESAS E CONTATOS
    // =========================================================================

    pub async fn create_company<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        name: &str,
        document: Option<&str>,
    ) -> Result<Company, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Company>(
            r#"
            INSERT INTO crm_companies (tenant_id, name, document)
            VALUES ($1, $2, $3)
            RETURNING id, tenant_id, name, document, created_at
            "#,
        )
        .bind(tenant_id)
        .bind(name)
        .bind(document)
        .fetch_one(executor)
        .await
        .map_err(|e| map_unique_violation(e, "Já existe uma empresa com este documento."))
    }

    pub async fn list_companies<'e, E>(&self, executor: E, tenant_id: Uuid) -> Result<Vec<Company>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let companies = sqlx::query_as::<_, Company>(
            "SELECT id, tenant_id, name, document, created_at FROM crm_companies WHERE tenant_id = $1 ORDER BY name",
        )
        .bind(tenant_id)
        .fetch_all(executor)
        .await?;

        Ok(companies)
    }

    pub async fn create_contact<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        company_id: Option<Uuid>,
        name: &str,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Contact, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let contact = sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO crm_contacts (tenant_id, company_id, name, email, phone)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, tenant_id, company_id, name, email, phone, created_at
            "#,
        )
        .bind(tenant_id)
        .bind(company_id)
        .bind(name)
        .bind(email)
        .bind(phone)
        .fetch_one(executor)
        .await?;

        Ok(contact)
    }

    pub async fn list_contacts<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        company_id: Option<Uuid>,
    ) -> Result<Vec<Contact>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let contacts = sqlx::query_as::<_, Contact>(
            r#"
            SELECT id, tenant_id, company_id, name, email, phone, created_at
            FROM crm_contacts
            WHERE tenant_id = $1 AND ($2::uuid IS NULL OR company_id = $2)
            ORDER BY name
            "#,
        )
        .bind(tenant_id)
        .bind(company_id)
        .fetch_all(executor)
        .await?;

        Ok(contacts)
    }
}
