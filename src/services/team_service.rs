// src/services/team_service.rs

use std::{collections::HashMap, sync::Arc};

use serde_json::json;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{team_repo::MemberStore, TeamRepository},
    models::team::{MeResponse, MemberStatus, Profile, Role, TeamMember, TeamMemberRow},
    services::identity::{IdentityProvider, IdentityUser},
};

#[derive(Clone)]
pub struct TeamService {
    // Leituras dentro da transação RLS da API de dados
    repo: TeamRepository,
    // Endpoints administrativos (fora do RLS, sempre filtrando pela organização)
    members: Arc<dyn MemberStore>,
    identity: Arc<dyn IdentityProvider>,
    invite_redirect: Option<String>,
}

impl TeamService {
    pub fn new(
        repo: TeamRepository,
        members: Arc<dyn MemberStore>,
        identity: Arc<dyn IdentityProvider>,
        invite_redirect: Option<String>,
    ) -> Self {
        Self { repo, members, identity, invite_redirect }
    }

    // Usado pelo middleware de tenancy e pelos endpoints administrativos
    pub async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>, AppError> {
        self.members.find_profile(user_id).await
    }

    pub async fn me<'e, E>(&self, executor: E, profile: Profile) -> Result<MeResponse, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let role = self.repo.role_name_of(executor, profile.tenant_id, profile.id).await?;
        Ok(MeResponse { profile, role })
    }

    pub async fn list_roles<'e, E>(&self, executor: E, tenant_id: Uuid) -> Result<Vec<Role>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.list_roles(executor, tenant_id).await
    }

    /// Equipe da organização com o status do convite vindo do provedor.
    pub async fn list_team_members(&self, caller: &Profile) -> Result<Vec<TeamMember>, AppError> {
        let rows = self.members.list_members(caller.tenant_id).await?;
        let users = self.identity.list_users().await?;

        Ok(merge_members(rows, &users))
    }

    pub async fn invite_user(
        &self,
        caller: &Profile,
        email: &str,
        full_name: &str,
        role_name: &str,
    ) -> Result<TeamMember, AppError> {
        let tenant_id = caller.tenant_id;
        let role = self
            .members
            .find_role(tenant_id, role_name)
            .await?
            .ok_or_else(|| AppError::RoleNotFound(role_name.to_string()))?;

        if self.members.find_email_elsewhere(tenant_id, email).await?.is_some() {
            return Err(AppError::MemberOfAnotherTenant);
        }

        let metadata = json!({ "full_name": full_name, "tenant_id": tenant_id });
        let invited = self
            .identity
            .invite_user(email, metadata, self.invite_redirect.as_deref())
            .await?;
        tracing::info!("Convite enviado para {} (usuário {})", email, invited.id);

        // Reenvio para um pendente: o provedor devolve o usuário que já existia
        let existing = self.members.find_profile(invited.id).await?;
        if existing.as_ref().is_some_and(|p| p.tenant_id != tenant_id) {
            return Err(AppError::MemberOfAnotherTenant);
        }

        let saved = self
            .members
            .save_invited_member(tenant_id, invited.id, full_name, email, role.id)
            .await;

        let profile = match saved {
            Ok(profile) => profile,
            Err(e) if existing.is_some() => {
                tracing::warn!("Falha ao atualizar o perfil de {}: {}", email, e);
                return Err(e);
            }
            Err(e) => {
                // Usuário recém-criado no provedor; desfazemos para não deixar órfão
                tracing::warn!("Falha ao gravar o perfil de {}, removendo do provedor: {}", email, e);
                if let Err(undo) = self.identity.delete_user(invited.id).await {
                    tracing::error!("Não foi possível remover o usuário {} do provedor: {}", invited.id, undo);
                }
                return Err(e);
            }
        };

        let row = TeamMemberRow {
            id: profile.id,
            full_name: profile.full_name,
            email: profile.email,
            avatar_url: profile.avatar_url,
            role_name: Some(role.name),
        };
        Ok(to_member(row, Some(&invited)))
    }

    // Só reenvia para quem já é membro da organização de quem chama
    pub async fn resend_invite(&self, caller: &Profile, email: &str) -> Result<(), AppError> {
        self.members
            .find_member_by_email(caller.tenant_id, email)
            .await?
            .ok_or(AppError::TeamMemberNotFound)?;

        self.identity
            .resend_invite(email, self.invite_redirect.as_deref())
            .await?;
        tracing::info!("Convite reenviado para {} por {}", email, caller.id);
        Ok(())
    }

    pub async fn delete_user(&self, caller: &Profile, user_id: Uuid) -> Result<(), AppError> {
        if caller.id == user_id {
            return Err(AppError::SelfDeletion);
        }

        self.members
            .find_member(caller.tenant_id, user_id)
            .await?
            .ok_or(AppError::TeamMemberNotFound)?;

        self.identity.delete_user(user_id).await?;
        self.members.remove_member(caller.tenant_id, user_id).await?;

        tracing::info!("Usuário {} removido por {}", user_id, caller.id);
        Ok(())
    }

    /// Atualiza provedor e banco; se o banco falhar, o provedor volta ao estado anterior.
    pub async fn update_user_details(
        &self,
        caller: &Profile,
        user_id: Uuid,
        name: &str,
        email: &str,
        role_name: &str,
    ) -> Result<TeamMember, AppError> {
        let tenant_id = caller.tenant_id;

        let previous = self
            .members
            .find_member(tenant_id, user_id)
            .await?
            .ok_or(AppError::TeamMemberNotFound)?;

        let role = self
            .members
            .find_role(tenant_id, role_name)
            .await?
            .ok_or_else(|| AppError::RoleNotFound(role_name.to_string()))?;

        let identity_user = self
            .identity
            .update_user(user_id, email, json!({ "full_name": name }))
            .await?;

        let saved = self
            .members
            .update_member(tenant_id, user_id, name, email, role.id)
            .await;

        let profile = match saved {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!("Falha ao gravar os dados de {}, restaurando no provedor: {}", user_id, e);
                let old_email = previous.email.as_deref().unwrap_or(email);
                let old_metadata = json!({ "full_name": previous.full_name });
                if let Err(undo) = self.identity.update_user(user_id, old_email, old_metadata).await {
                    tracing::error!("Não foi possível restaurar o usuário {} no provedor: {}", user_id, undo);
                }
                return Err(e);
            }
        };

        let row = TeamMemberRow {
            id: profile.id,
            full_name: profile.full_name,
            email: profile.email,
            avatar_url: profile.avatar_url,
            role_name: Some(role.name),
        };
        Ok(to_member(row, Some(&identity_user)))
    }
}

fn to_member(row: TeamMemberRow, identity: Option<&IdentityUser>) -> TeamMember {
    let invited_at = identity.and_then(|u| u.invited_at);
    let email_confirmed_at = identity.and_then(|u| u.email_confirmed_at);
    let last_sign_in_at = identity.and_then(|u| u.last_sign_in_at);

    let status = if invited_at.is_some() && email_confirmed_at.is_none() && last_sign_in_at.is_none() {
        MemberStatus::Invited
    } else {
        MemberStatus::Active
    };

    TeamMember {
        id: row.id,
        full_name: row.full_name,
        email: row.email,
        avatar_url: row.avatar_url,
        role: row.role_name,
        status,
        invited_at,
        email_confirmed_at,
        last_sign_in_at,
    }
}

/// Junta os perfis do banco com os dados de convite/login do provedor.
pub fn merge_members(rows: Vec<TeamMemberRow>, users: &[IdentityUser]) -> Vec<TeamMember> {
    let by_id: HashMap<Uuid, &IdentityUser> = users.iter().map(|u| (u.id, u)).collect();

    rows.into_iter()
        .map(|row| {
            let identity = by_id.get(&row.id).copied();
            to_member(row, identity)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::Value;
    use sqlx::postgres::PgPoolOptions;

    use crate::services::identity::fake::FakeIdentity;

    // Organização em memória; `fail_writes` simula a transação falhando
    #[derive(Default)]
    struct FakeMembers {
        profiles: Mutex<Vec<Profile>>,
        roles: Vec<Role>,
        fail_writes: bool,
    }

    impl FakeMembers {
        fn failing_writes(mut self) -> Self {
            self.fail_writes = true;
            self
        }

        fn write_error() -> AppError {
            AppError::UniqueConstraintViolation("E-mail já cadastrado.".into())
        }
    }

    #[async_trait]
    impl MemberStore for FakeMembers {
        async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>, AppError> {
            Ok(self.profiles.lock().unwrap().iter().find(|p| p.id == user_id).cloned())
        }

        async fn find_member(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Option<Profile>, AppError> {
            Ok(self
                .profiles
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.id == user_id && p.tenant_id == tenant_id)
                .cloned())
        }

        async fn find_member_by_email(&self, tenant_id: Uuid, email: &str) -> Result<Option<Profile>, AppError> {
            Ok(self
                .profiles
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.tenant_id == tenant_id && p.email.as_deref() == Some(email))
                .cloned())
        }

        async fn find_email_elsewhere(&self, tenant_id: Uuid, email: &str) -> Result<Option<Profile>, AppError> {
            Ok(self
                .profiles
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.tenant_id != tenant_id && p.email.as_deref() == Some(email))
                .cloned())
        }

        async fn find_role(&self, tenant_id: Uuid, name: &str) -> Result<Option<Role>, AppError> {
            Ok(self
                .roles
                .iter()
                .find(|r| r.tenant_id == tenant_id && r.name.eq_ignore_ascii_case(name))
                .cloned())
        }

        async fn list_members(&self, tenant_id: Uuid) -> Result<Vec<TeamMemberRow>, AppError> {
            Ok(self
                .profiles
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.tenant_id == tenant_id)
                .map(|p| TeamMemberRow {
                    id: p.id,
                    full_name: p.full_name.clone(),
                    email: p.email.clone(),
                    avatar_url: None,
                    role_name: None,
                })
                .collect())
        }

        async fn save_invited_member(
            &self,
            tenant_id: Uuid,
            user_id: Uuid,
            full_name: &str,
            email: &str,
            _role_id: Uuid,
        ) -> Result<Profile, AppError> {
            if self.fail_writes {
                return Err(Self::write_error());
            }
            let profile = profile(user_id, tenant_id, full_name, email);
            let mut profiles = self.profiles.lock().unwrap();
            profiles.retain(|p| p.id != user_id);
            profiles.push(profile.clone());
            Ok(profile)
        }

        async fn update_member(
            &self,
            tenant_id: Uuid,
            user_id: Uuid,
            full_name: &str,
            email: &str,
            _role_id: Uuid,
        ) -> Result<Profile, AppError> {
            if self.fail_writes {
                return Err(Self::write_error());
            }
            let mut profiles = self.profiles.lock().unwrap();
            let existing = profiles
                .iter_mut()
                .find(|p| p.id == user_id && p.tenant_id == tenant_id)
                .ok_or(AppError::TeamMemberNotFound)?;
            existing.full_name = Some(full_name.to_string());
            existing.email = Some(email.to_string());
            Ok(existing.clone())
        }

        async fn remove_member(&self, tenant_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
            self.profiles
                .lock()
                .unwrap()
                .retain(|p| !(p.id == user_id && p.tenant_id == tenant_id));
            Ok(())
        }
    }

    fn profile(id: Uuid, tenant_id: Uuid, name: &str, email: &str) -> Profile {
        Profile {
            id,
            tenant_id,
            full_name: Some(name.to_string()),
            email: Some(email.to_string()),
            avatar_url: None,
            created_at: None,
        }
    }

    fn role(tenant_id: Uuid, name: &str) -> Role {
        Role { id: Uuid::new_v4(), tenant_id, name: name.to_string(), description: None }
    }

    fn service(members: Arc<FakeMembers>, identity: Arc<FakeIdentity>) -> TeamService {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/helpdesk")
            .unwrap();
        TeamService::new(TeamRepository::new(pool), members, identity, None)
    }

    // Administradora da organização A, já com cargo "Agente" cadastrado
    fn tenant_a() -> (Profile, FakeMembers) {
        let tenant = Uuid::new_v4();
        let admin = profile(Uuid::new_v4(), tenant, "Ana", "ana@empresa.com");
        let members = FakeMembers {
            profiles: Mutex::new(vec![admin.clone()]),
            roles: vec![role(tenant, "Agente")],
            fail_writes: false,
        };
        (admin, members)
    }

    fn calls(identity: &FakeIdentity) -> Vec<String> {
        identity.calls.lock().unwrap().clone()
    }

    fn row(id: Uuid, name: &str) -> TeamMemberRow {
        TeamMemberRow {
            id,
            full_name: Some(name.to_string()),
            email: Some(format!("{}@empresa.com", name.to_lowercase())),
            avatar_url: None,
            role_name: Some("Atendente".to_string()),
        }
    }

    fn identity_user(id: Uuid, confirmed: bool) -> IdentityUser {
        let invited = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        IdentityUser {
            id,
            email: None,
            invited_at: Some(invited),
            email_confirmed_at: confirmed.then(|| invited + chrono::Duration::hours(2)),
            last_sign_in_at: None,
            user_metadata: Value::Null,
        }
    }

    #[test]
    fn merge_marks_pending_invites_and_keeps_profile_order() {
        let (ana, bruno, carla) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let users = vec![identity_user(bruno, true), identity_user(ana, false)];

        let members = merge_members(vec![row(ana, "Ana"), row(bruno, "Bruno"), row(carla, "Carla")], &users);

        assert_eq!(members.len(), 3);
        assert_eq!(members[0].id, ana);
        assert_eq!(members[0].status, MemberStatus::Invited);
        assert!(members[0].invited_at.is_some());
        assert_eq!(members[1].status, MemberStatus::Active);
        assert!(members[1].email_confirmed_at.is_some());
        // Sem registro no provedor: nenhum dado de convite
        assert_eq!(members[2].status, MemberStatus::Active);
        assert!(members[2].invited_at.is_none());
        assert_eq!(members[2].role.as_deref(), Some("Atendente"));
    }

    #[tokio::test]
    async fn cannot_delete_yourself() {
        let (admin, members) = tenant_a();
        let identity = Arc::new(FakeIdentity::default());
        let service = service(Arc::new(members), identity.clone());

        let err = service.delete_user(&admin, admin.id).await.unwrap_err();

        assert!(matches!(err, AppError::SelfDeletion));
        assert!(calls(&identity).is_empty());
    }

    #[tokio::test]
    async fn invite_saves_the_member_in_the_callers_tenant() {
        let (admin, members) = tenant_a();
        let members = Arc::new(members);
        let identity = Arc::new(FakeIdentity::default());
        let service = service(members.clone(), identity.clone());

        let member = service
            .invite_user(&admin, "bruno@empresa.com", "Bruno", "agente")
            .await
            .unwrap();

        assert_eq!(member.status, MemberStatus::Invited);
        assert_eq!(member.role.as_deref(), Some("Agente"));
        let saved = members.find_member(admin.tenant_id, member.id).await.unwrap();
        assert_eq!(saved.unwrap().email.as_deref(), Some("bruno@empresa.com"));
        assert_eq!(calls(&identity), vec!["invite:bruno@empresa.com".to_string()]);
    }

    #[tokio::test]
    async fn failed_save_removes_the_new_user_from_the_provider() {
        let (admin, members) = tenant_a();
        let identity = Arc::new(FakeIdentity::default());
        let service = service(Arc::new(members.failing_writes()), identity.clone());

        let err = service
            .invite_user(&admin, "bruno@empresa.com", "Bruno", "Agente")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::UniqueConstraintViolation(_)));
        let calls = calls(&identity);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], "invite:bruno@empresa.com");
        assert!(calls[1].starts_with("delete:"));
        assert!(identity.users.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_save_on_a_reinvite_keeps_the_existing_user() {
        let (admin, members) = tenant_a();
        let identity = Arc::new(FakeIdentity::default());
        // Convite pendente de antes: usuário no provedor e perfil na mesma organização
        let pending = identity
            .invite_user("bruno@empresa.com", json!({}), None)
            .await
            .unwrap();
        members
            .profiles
            .lock()
            .unwrap()
            .push(profile(pending.id, admin.tenant_id, "Bruno", "bruno@empresa.com"));
        identity.calls.lock().unwrap().clear();
        let service = service(Arc::new(members.failing_writes()), identity.clone());

        let err = service
            .invite_user(&admin, "bruno@empresa.com", "Bruno", "Agente")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::UniqueConstraintViolation(_)));
        assert_eq!(calls(&identity), vec!["invite:bruno@empresa.com".to_string()]);
        assert_eq!(identity.users.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invite_of_an_email_from_another_tenant_is_a_conflict() {
        let (admin, members) = tenant_a();
        members
            .profiles
            .lock()
            .unwrap()
            .push(profile(Uuid::new_v4(), Uuid::new_v4(), "Carla", "carla@outra.com"));
        let identity = Arc::new(FakeIdentity::default());
        let service = service(Arc::new(members), identity.clone());

        let err = service
            .invite_user(&admin, "carla@outra.com", "Carla", "Agente")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::MemberOfAnotherTenant));
        assert!(calls(&identity).is_empty());
    }

    #[tokio::test]
    async fn resend_only_reaches_members_of_the_callers_tenant() {
        let (admin, members) = tenant_a();
        let other_tenant = Uuid::new_v4();
        members.profiles.lock().unwrap().extend([
            profile(Uuid::new_v4(), admin.tenant_id, "Bruno", "bruno@empresa.com"),
            profile(Uuid::new_v4(), other_tenant, "Carla", "carla@outra.com"),
        ]);
        let identity = Arc::new(FakeIdentity::default());
        let service = service(Arc::new(members), identity.clone());

        let unknown = service.resend_invite(&admin, "ninguem@lugar.com").await.unwrap_err();
        let foreign = service.resend_invite(&admin, "carla@outra.com").await.unwrap_err();
        assert!(matches!(unknown, AppError::TeamMemberNotFound));
        assert!(matches!(foreign, AppError::TeamMemberNotFound));
        assert!(calls(&identity).is_empty());

        service.resend_invite(&admin, "bruno@empresa.com").await.unwrap();
        assert_eq!(calls(&identity), vec!["resend:bruno@empresa.com".to_string()]);
    }

    #[tokio::test]
    async fn delete_of_a_member_from_another_tenant_is_404() {
        let (admin, members) = tenant_a();
        let outsider = profile(Uuid::new_v4(), Uuid::new_v4(), "Carla", "carla@outra.com");
        members.profiles.lock().unwrap().push(outsider.clone());
        let members = Arc::new(members);
        let identity = Arc::new(FakeIdentity::default());
        let service = service(members.clone(), identity.clone());

        let err = service.delete_user(&admin, outsider.id).await.unwrap_err();

        assert!(matches!(err, AppError::TeamMemberNotFound));
        assert!(calls(&identity).is_empty());
        assert!(members.find_profile(outsider.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_update_restores_the_provider_user() {
        let (admin, members) = tenant_a();
        let bruno = profile(Uuid::new_v4(), admin.tenant_id, "Bruno", "bruno@empresa.com");
        members.profiles.lock().unwrap().push(bruno.clone());
        let identity = Arc::new(FakeIdentity::default());
        let service = service(Arc::new(members.failing_writes()), identity.clone());

        let err = service
            .update_user_details(&admin, bruno.id, "Bruno Lima", "ana@empresa.com", "Agente")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::UniqueConstraintViolation(_)));
        assert_eq!(
            calls(&identity),
            vec![
                format!("update:{}:ana@empresa.com", bruno.id),
                format!("update:{}:bruno@empresa.com", bruno.id),
            ]
        );
    }
}
