// src/db/team_repo.rs

use async_trait::async_trait;
use sqlx::{Executor, PgConnection, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::team::{Profile, Role, TeamMemberRow},
};

/// Operações dos endpoints administrativos da equipe. Cada escrita é atômica.
#[async_trait]
pub trait MemberStore: Send + Sync {
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>, AppError>;

    async fn find_member(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Option<Profile>, AppError>;

    async fn find_member_by_email(&self, tenant_id: Uuid, email: &str) -> Result<Option<Profile>, AppError>;

    // Perfil com este e-mail em qualquer organização que não a informada
    async fn find_email_elsewhere(&self, tenant_id: Uuid, email: &str) -> Result<Option<Profile>, AppError>;

    async fn find_role(&self, tenant_id: Uuid, name: &str) -> Result<Option<Role>, AppError>;

    async fn list_members(&self, tenant_id: Uuid) -> Result<Vec<TeamMemberRow>, AppError>;

    async fn save_invited_member(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        full_name: &str,
        email: &str,
        role_id: Uuid,
    ) -> Result<Profile, AppError>;

    async fn update_member(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        full_name: &str,
        email: &str,
        role_id: Uuid,
    ) -> Result<Profile, AppError>;

    async fn remove_member(&self, tenant_id: Uuid, user_id: Uuid) -> Result<(), AppError>;
}

// Perfis, cargos e o vínculo usuário <-> cargo
#[derive(Clone)]
pub struct TeamRepository {
    pool: PgPool,
}

impl TeamRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Busca o perfil pelo id do usuário no provedor
    pub async fn find_profile<'e, E>(&self, executor: E, user_id: Uuid) -> Result<Option<Profile>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, tenant_id, full_name, email, avatar_url, created_at
            FROM profiles
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(profile)
    }

    pub async fn find_profile_in_tenant<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Profile>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, tenant_id, full_name, email, avatar_url, created_at
            FROM profiles
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(user_id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await?;

        Ok(profile)
    }

    pub async fn find_profile_by_email<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        email: &str,
        same_tenant: bool,
    ) -> Result<Option<Profile>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = if same_tenant {
            "SELECT id, tenant_id, full_name, email, avatar_url, created_at \
             FROM profiles WHERE lower(email) = lower($1) AND tenant_id = $2 LIMIT 1"
        } else {
            "SELECT id, tenant_id, full_name, email, avatar_url, created_at \
             FROM profiles WHERE lower(email) = lower($1) AND tenant_id <> $2 LIMIT 1"
        };

        let profile = sqlx::query_as::<_, Profile>(sql)
            .bind(email.trim())
            .bind(tenant_id)
            .fetch_optional(executor)
            .await?;

        Ok(profile)
    }

    pub async fn find_role_by_name<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<Option<Role>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // O painel manda o nome como aparece na tela; ignoramos caixa
        let role = sqlx::query_as::<_, Role>(
            r#"
            SELECT id, tenant_id, name, description
            FROM roles
            WHERE tenant_id = $1 AND lower(name) = lower($2)
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(name.trim())
        .fetch_optional(executor)
        .await?;

        Ok(role)
    }

    pub async fn list_roles<'e, E>(&self, executor: E, tenant_id: Uuid) -> Result<Vec<Role>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let roles = sqlx::query_as::<_, Role>(
            "SELECT id, tenant_id, name, description FROM roles WHERE tenant_id = $1 ORDER BY name",
        )
        .bind(tenant_id)
        .fetch_all(executor)
        .await?;

        Ok(roles)
    }

    pub async fn role_name_of<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<String>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let name = sqlx::query_scalar::<_, String>(
            r#"
            SELECT r.name
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = $1 AND ur.tenant_id = $2
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await?;

        Ok(name)
    }

    pub async fn list_members<'e, E>(&self, executor: E, tenant_id: Uuid) -> Result<Vec<TeamMemberRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, TeamMemberRow>(
            r#"
            SELECT p.id, p.full_name, p.email, p.avatar_url, r.name AS role_name
            FROM profiles p
            LEFT JOIN user_roles ur ON ur.user_id = p.id AND ur.tenant_id = p.tenant_id
            LEFT JOIN roles r ON r.id = ur.role_id
            WHERE p.tenant_id = $1
            ORDER BY p.full_name NULLS LAST, p.email
            "#,
        )
        .bind(tenant_id)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    // O convite pode ser reenviado para quem já tem perfil, daí o UPSERT.
    // Um perfil de outra organização nunca é tocado.
    pub async fn upsert_profile<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        tenant_id: Uuid,
        full_name: &str,
        email: &str,
    ) -> Result<Profile, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (id, tenant_id, full_name, email)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                full_name = EXCLUDED.full_name,
                email = EXCLUDED.email
            WHERE profiles.tenant_id = EXCLUDED.tenant_id
            RETURNING id, tenant_id, full_name, email, avatar_url, created_at
            "#,
        )
        .bind(user_id)
        .bind(tenant_id)
        .bind(full_name)
        .bind(email)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::MemberOfAnotherTenant)?;

        Ok(profile)
    }

    pub async fn update_profile<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        user_id: Uuid,
        full_name: &str,
        email: &str,
    ) -> Result<Profile, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles
            SET full_name = $3, email = $4
            WHERE id = $1 AND tenant_id = $2
            RETURNING id, tenant_id, full_name, email, avatar_url, created_at
            "#,
        )
        .bind(user_id)
        .bind(tenant_id)
        .bind(full_name)
        .bind(email)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::TeamMemberNotFound)?;

        Ok(profile)
    }

    /// Troca o cargo do usuário (um cargo por usuário dentro da organização).
    pub async fn set_user_role(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        user_id: Uuid,
        role_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND tenant_id = $2")
            .bind(user_id)
            .bind(tenant_id)
            .execute(&mut *conn)
            .await?;

        sqlx::query("INSERT INTO user_roles (user_id, role_id, tenant_id) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(role_id)
            .bind(tenant_id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    pub async fn delete_member(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND tenant_id = $2")
            .bind(user_id)
            .bind(tenant_id)
            .execute(&mut *conn)
            .await?;

        sqlx::query("DELETE FROM profiles WHERE id = $1 AND tenant_id = $2")
            .bind(user_id)
            .bind(tenant_id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl MemberStore for TeamRepository {
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>, AppError> {
        TeamRepository::find_profile(self, &self.pool, user_id).await
    }

    async fn find_member(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Option<Profile>, AppError> {
        self.find_profile_in_tenant(&self.pool, tenant_id, user_id).await
    }

    async fn find_member_by_email(&self, tenant_id: Uuid, email: &str) -> Result<Option<Profile>, AppError> {
        self.find_profile_by_email(&self.pool, tenant_id, email, true).await
    }

    async fn find_email_elsewhere(&self, tenant_id: Uuid, email: &str) -> Result<Option<Profile>, AppError> {
        self.find_profile_by_email(&self.pool, tenant_id, email, false).await
    }

    async fn find_role(&self, tenant_id: Uuid, name: &str) -> Result<Option<Role>, AppError> {
        self.find_role_by_name(&self.pool, tenant_id, name).await
    }

    async fn list_members(&self, tenant_id: Uuid) -> Result<Vec<TeamMemberRow>, AppError> {
        TeamRepository::list_members(self, &self.pool, tenant_id).await
    }

    async fn save_invited_member(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        full_name: &str,
        email: &str,
        role_id: Uuid,
    ) -> Result<Profile, AppError> {
        let mut tx = self.pool.begin().await?;

        let profile = self
            .upsert_profile(&mut *tx, user_id, tenant_id, full_name, email)
            .await?;
        self.set_user_role(&mut tx, tenant_id, user_id, role_id).await?;

        tx.commit().await?;
        Ok(profile)
    }

    async fn update_member(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        full_name: &str,
        email: &str,
        role_id: Uuid,
    ) -> Result<Profile, AppError> {
        let mut tx = self.pool.begin().await?;

        let profile = self
            .update_profile(&mut *tx, tenant_id, user_id, full_name, email)
            .await?;
        self.set_user_role(&mut tx, tenant_id, user_id, role_id).await?;

        tx.commit().await?;
        Ok(profile)
    }

    async fn remove_member(&self, tenant_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        self.delete_member(&mut tx, tenant_id, user_id).await?;
        tx.commit().await?;
        Ok(())
    }
}
