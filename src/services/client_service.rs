// src/services/client_service.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{client_repo::ClientFields, ClientRepository},
    models::client::Client,
};

#[derive(Clone)]
pub struct ClientService {
    repo: ClientRepository,
}

impl ClientService {
    pub fn new(repo: ClientRepository) -> Self {
        Self { repo }
    }

    pub async fn create_client<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        fields: &ClientFields<'_>,
    ) -> Result<Client, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.create(executor, tenant_id, fields).await
    }

    pub async fn list_clients<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        search: Option<&str>,
    ) -> Result<Vec<Client>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // Busca vazia é o mesmo que sem filtro
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        self.repo.list(executor, tenant_id, search).await
    }

    pub async fn get_client<'e, E>(&self, executor: E, tenant_id: Uuid, id: Uuid) -> Result<Client, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo
            .get(executor, tenant_id, id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Cliente".into()))
    }

    pub async fn update_client<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
        fields: &ClientFields<'_>,
    ) -> Result<Client, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo
            .update(executor, tenant_id, id, fields)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Cliente".into()))
    }

    pub async fn delete_client<'e, E>(&self, executor: E, tenant_id: Uuid, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if !self.repo.delete(executor, tenant_id, id).await? {
            return Err(AppError::ResourceNotFound("Cliente".into()));
        }
        Ok(())
    }
}
