// src/services/crm_service.rs

use rust_decimal::Decimal;
use sqlx::{Acquire, Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{crm_repo::DealFields, CrmRepository},
    models::crm::{BoardStage, Company, Contact, Deal, DealStatus, Funnel, FunnelBoard, Stage},
};

#[derive(Clone)]
pub struct CrmService {
    repo: CrmRepository,
}

impl CrmService {
    pub fn new(repo: CrmRepository) -> Self {
        Self { repo }
    }

    // =========================================================================
    //  FUNIS E ETAPAS
    // =========================================================================

    /// Cria o funil já com as etapas iniciais, na ordem recebida.
    pub async fn create_funnel<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        name: &str,
        stage_names: &[String],
    ) -> Result<(Funnel, Vec<Stage>), AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let funnel = self.repo.create_funnel(&mut *tx, tenant_id, name).await?;

        let mut stages = Vec::with_capacity(stage_names.len());
        for (position, stage_name) in (1..).zip(stage_names) {
            let stage = self
                .repo
                .create_stage(&mut *tx, tenant_id, funnel.id, stage_name, Some(position), None)
                .await?;
            stages.push(stage);
        }

        tx.commit().await?;
        Ok((funnel, stages))
    }

    pub async fn list_funnels<'e, E>(&self, executor: E, tenant_id: Uuid) -> Result<Vec<Funnel>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.list_funnels(executor, tenant_id).await
    }

    pub async fn add_stage(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        funnel_id: Uuid,
        name: &str,
        position: Option<i32>,
        color: Option<&str>,
    ) -> Result<Stage, AppError> {
        self.find_funnel(&mut *conn, tenant_id, funnel_id).await?;
        self.repo
            .create_stage(&mut *conn, tenant_id, funnel_id, name, position, color)
            .await
    }

    /// Kanban do funil: etapas em ordem, cada uma com seus negócios e o total.
    pub async fn funnel_board(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        funnel_id: Uuid,
    ) -> Result<FunnelBoard, AppError> {
        let funnel = self.find_funnel(&mut *conn, tenant_id, funnel_id).await?;
        let stages = self.repo.list_stages(&mut *conn, tenant_id, funnel_id).await?;
        let deals = self.repo.list_deals(&mut *conn, tenant_id, Some(funnel_id)).await?;

        Ok(assemble_board(funnel, stages, deals))
    }

    async fn find_funnel(&self, conn: &mut PgConnection, tenant_id: Uuid, id: Uuid) -> Result<Funnel, AppError> {
        self.repo
            .get_funnel(conn, tenant_id, id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Funil".into()))
    }

    async fn find_stage(&self, conn: &mut PgConnection, tenant_id: Uuid, id: Uuid) -> Result<Stage, AppError> {
        self.repo
            .get_stage(conn, tenant_id, id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Etapa".into()))
    }

    async fn find_deal(&self, conn: &mut PgConnection, tenant_id: Uuid, id: Uuid) -> Result<Deal, AppError> {
        self.repo
            .get_deal(conn, tenant_id, id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Negócio".into()))
    }

    // =========================================================================
    //  NEGÓCIOS
    // =========================================================================

    /// Sem etapa informada, o negócio entra na primeira etapa do funil.
    pub async fn create_deal(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        funnel_id: Uuid,
        stage_id: Option<Uuid>,
        fields: &DealFields<'_>,
    ) -> Result<Deal, AppError> {
        self.find_funnel(&mut *conn, tenant_id, funnel_id).await?;

        let stage = match stage_id {
            Some(id) => {
                let stage = self.find_stage(&mut *conn, tenant_id, id).await?;
                ensure_stage_in_funnel(funnel_id, &stage)?;
                stage
            }
            None => self
                .repo
                .list_stages(&mut *conn, tenant_id, funnel_id)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| AppError::ResourceNotFound("Etapa".into()))?,
        };

        self.repo
            .create_deal(&mut *conn, tenant_id, funnel_id, stage.id, fields)
            .await
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
        self.repo.list_deals(executor, tenant_id, funnel_id).await
    }

    pub async fn update_deal<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
        fields: &DealFields<'_>,
    ) -> Result<Deal, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo
            .update_deal(executor, tenant_id, id, fields)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Negócio".into()))
    }

    /// Qualquer etapa do mesmo funil é alcançável a partir de qualquer outra.
    pub async fn move_deal(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        id: Uuid,
        stage_id: Uuid,
    ) -> Result<Deal, AppError> {
        let deal = self.find_deal(&mut *conn, tenant_id, id).await?;
        let stage = self.find_stage(&mut *conn, tenant_id, stage_id).await?;
        ensure_stage_in_funnel(deal.funnel_id, &stage)?;

        self.repo.move_deal(&mut *conn, tenant_id, id, stage.id).await
    }

    pub async fn set_deal_status<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
        status: DealStatus,
    ) -> Result<Deal, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo
            .set_deal_status(executor, tenant_id, id, status)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Negócio".into()))
    }

    pub async fn delete_deal<'e, E>(&self, executor: E, tenant_id: Uuid, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if !self.repo.delete_deal(executor, tenant_id, id).await? {
            return Err(AppError::ResourceNotFound("Negócio".into()));
        }
        Ok(())
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
        self.repo.create_company(executor, tenant_id, name, document).await
    }

    pub async fn list_companies<'e, E>(&self, executor: E, tenant_id: Uuid) -> Result<Vec<Company>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.list_companies(executor, tenant_id).await
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
        self.repo
            .create_contact(executor, tenant_id, company_id, name, email, phone)
            .await
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
        self.repo.list_contacts(executor, tenant_id, company_id).await
    }
}

pub fn ensure_stage_in_funnel(funnel_id: Uuid, stage: &Stage) -> Result<(), AppError> {
    if stage.funnel_id != funnel_id {
        return Err(AppError::StageOutsideFunnel);
    }
    Ok(())
}

// Negócios cuja etapa não está na lista são ignorados
pub fn assemble_board(funnel: Funnel, mut stages: Vec<Stage>, deals: Vec<Deal>) -> FunnelBoard {
    stages.sort_by_key(|s| s.position);

    let mut columns: Vec<BoardStage> = stages
        .into_iter()
        .map(|stage| BoardStage { stage, total_value: Decimal::ZERO, deals: Vec::new() })
        .collect();

    for deal in deals {
        if let Some(column) = columns.iter_mut().find(|c| c.stage.id == deal.stage_id) {
            column.total_value += deal.value;
            column.deals.push(deal);
        }
    }

    FunnelBoard { funnel, stages: columns }
}
