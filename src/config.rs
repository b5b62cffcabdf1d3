// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::{anyhow, Context};
use chrono::FixedOffset;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    common::i18n::I18nStore,
    db::{ClientRepository, CrmRepository, TeamRepository, TicketRepository},
    models::ticket::TransitionPolicy,
    services::{
        auth::AuthService,
        client_service::ClientService,
        crm_service::CrmService,
        dashboard_service::DashboardService,
        identity::{GoTrueClient, IdentityProvider},
        sla::SlaEvaluator,
        team_service::TeamService,
        ticket_service::TicketService,
    },
};

/// Tudo que vem do ambiente (ou do `.env`).
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub identity_url: String,
    pub identity_service_key: String,
    pub jwt_secret: String,
    pub invite_redirect_url: Option<String>,
    pub bind_addr: String,
    pub utc_offset_hours: i32,
    pub transition_policy: TransitionPolicy,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    // Separado de `from_env` para os testes não mexerem no ambiente do processo
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("{} deve ser definida", key))
        };

        let utc_offset_hours = match lookup("APP_UTC_OFFSET_HOURS") {
            Some(raw) => raw
                .trim()
                .parse::<i32>()
                .with_context(|| format!("APP_UTC_OFFSET_HOURS inválido: '{}'", raw))?,
            None => -3,
        };

        let transition_policy = match lookup("TICKET_TRANSITION_POLICY") {
            Some(raw) => raw.parse::<TransitionPolicy>().map_err(|e| anyhow!(e))?,
            None => TransitionPolicy::Guarded,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            identity_url: required("IDENTITY_URL")?,
            identity_service_key: required("IDENTITY_SERVICE_KEY")?,
            jwt_secret: required("JWT_SECRET")?,
            invite_redirect_url: lookup("INVITE_REDIRECT_URL").filter(|v| !v.trim().is_empty()),
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            utc_offset_hours,
            transition_policy,
        })
    }

    pub fn utc_offset(&self) -> anyhow::Result<FixedOffset> {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| anyhow!("APP_UTC_OFFSET_HOURS fora do intervalo: {}", self.utc_offset_hours))
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub settings: Arc<Settings>,
    pub i18n_store: Arc<I18nStore>,
    pub auth_service: AuthService,
    pub team_service: TeamService,
    pub client_service: ClientService,
    pub ticket_service: TicketService,
    pub dashboard_service: DashboardService,
    pub crm_service: CrmService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let settings = Settings::from_env()?;

        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&settings.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        let identity = GoTrueClient::new(&settings.identity_url, settings.identity_service_key.clone())?;

        Self::from_parts(db_pool, settings, Arc::new(identity))
    }

    /// Monta o gráfico de dependências a partir das peças já prontas.
    pub fn from_parts(
        db_pool: PgPool,
        settings: Settings,
        identity: Arc<dyn IdentityProvider>,
    ) -> anyhow::Result<Self> {
        let i18n_store = Arc::new(I18nStore::load()?);
        let sla = SlaEvaluator::new(settings.utc_offset()?, i18n_store.clone());

        let team_repo = TeamRepository::new(db_pool.clone());
        let client_repo = ClientRepository::new(db_pool.clone());
        let ticket_repo = TicketRepository::new(db_pool.clone());
        let crm_repo = CrmRepository::new(db_pool.clone());

        let auth_service = AuthService::new(settings.jwt_secret.clone());
        let team_service = TeamService::new(
            team_repo.clone(),
            Arc::new(team_repo),
            identity,
            settings.invite_redirect_url.clone(),
        );
        let client_service = ClientService::new(client_repo);
        let ticket_service = TicketService::new(ticket_repo.clone(), sla.clone(), settings.transition_policy);
        let dashboard_service = DashboardService::new(ticket_repo, sla);
        let crm_service = CrmService::new(crm_repo);

        tracing::info!(
            "Política de transição de chamados: {:?}",
            ticket_service.policy()
        );

        Ok(Self {
            db_pool,
            settings: Arc::new(settings),
            i18n_store,
            auth_service,
            team_service,
            client_service,
            ticket_service,
            dashboard_service,
            crm_service,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("DATABASE_URL", "postgres://localhost/helpdesk"),
        ("IDENTITY_URL", "https://projeto.exemplo.co"),
        ("IDENTITY_SERVICE_KEY", "service-role"),
        ("JWT_SECRET", "segredo"),
    ];

    #[test]
    fn defaults_apply_when_optional_values_are_absent() {
        let settings = Settings::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(settings.bind_addr, "0.0.0.0:3000");
        assert_eq!(settings.utc_offset_hours, -3);
        assert_eq!(settings.transition_policy, TransitionPolicy::Guarded);
        assert!(settings.invite_redirect_url.is_none());
        assert_eq!(settings.utc_offset().unwrap().local_minus_utc(), -3 * 3600);
    }

    #[test]
    fn missing_required_value_names_the_variable() {
        let err = Settings::from_lookup(lookup(&REQUIRED[..3])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn reads_policy_and_offset() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("TICKET_TRANSITION_POLICY", "free"));
        pairs.push(("APP_UTC_OFFSET_HOURS", "1"));

        let settings = Settings::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(settings.transition_policy, TransitionPolicy::Free);
        assert_eq!(settings.utc_offset_hours, 1);
    }

    #[test]
    fn out_of_range_offset_is_an_error() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("APP_UTC_OFFSET_HOURS", "1000000"));

        let settings = Settings::from_lookup(lookup(&pairs)).unwrap();

        let err = settings.utc_offset().unwrap_err();
        assert!(err.to_string().contains("1000000"));
    }

    #[test]
    fn rejects_garbage_offset() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("APP_UTC_OFFSET_HOURS", "três"));
        assert!(Settings::from_lookup(lookup(&pairs)).is_err());
    }
}
