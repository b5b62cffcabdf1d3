// src/services/identity.rs
//
// Cliente da API administrativa do provedor de identidade (compatível com GoTrue).
// Todas as chamadas usam a chave de serviço; nada aqui é exposto ao navegador.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client as HttpClient, Method, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Falha de comunicação com o provedor de identidade: {0}")]
    Http(#[from] reqwest::Error),

    // A mensagem do provedor segue como está
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Configuração inválida do provedor de identidade: {0}")]
    Config(String),
}

/// Usuário como o provedor de identidade o devolve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityUser {
    pub id: Uuid,
    pub email: Option<String>,
    #[serde(default)]
    pub invited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_sign_in_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_metadata: Value,
}

#[derive(Debug, Deserialize)]
struct UserListPage {
    users: Vec<IdentityUser>,
}

/// Operações privilegiadas delegadas ao provedor.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn invite_user(
        &self,
        email: &str,
        metadata: Value,
        redirect_to: Option<&str>,
    ) -> Result<IdentityUser, IdentityError>;

    async fn resend_invite(&self, email: &str, redirect_to: Option<&str>) -> Result<(), IdentityError>;

    async fn delete_user(&self, user_id: Uuid) -> Result<(), IdentityError>;

    async fn update_user(
        &self,
        user_id: Uuid,
        email: &str,
        metadata: Value,
    ) -> Result<IdentityUser, IdentityError>;

    async fn list_users(&self) -> Result<Vec<IdentityUser>, IdentityError>;
}

#[derive(Clone, Debug)]
pub struct GoTrueClient {
    http_client: HttpClient,
    base_url: String,
    service_key: String,
    users_per_page: u32,
}

// A listagem do provedor cobre o projeto inteiro, não só uma organização
const USERS_PER_PAGE: u32 = 1000;

impl GoTrueClient {
    /// Timeouts: total 30s, conexão 5s.
    pub fn new(project_url: &str, service_key: impl Into<String>) -> Result<Self, IdentityError> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| IdentityError::Config(format!("Falha ao criar o cliente HTTP: {}", e)))?;

        let project_url = project_url.trim_end_matches('/');
        if project_url.is_empty() {
            return Err(IdentityError::Config("URL do provedor vazia".to_string()));
        }

        Ok(Self {
            http_client,
            base_url: format!("{}/auth/v1", project_url),
            service_key: service_key.into(),
            users_per_page: USERS_PER_PAGE,
        })
    }

    #[cfg(test)]
    fn with_page_size(mut self, users_per_page: u32) -> Self {
        self.users_per_page = users_per_page;
        self
    }

    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Response, IdentityError> {
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .http_client
            .request(method, &url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", &self.service_key))
            .query(query);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        Self::handle_response(response).await
    }

    async fn handle_response(response: Response) -> Result<Response, IdentityError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let status_code = status.as_u16();
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Erro desconhecido".to_string());

        tracing::error!("Erro na API de identidade ({}): {}", status_code, error_body);

        // O GoTrue usa "msg"; versões novas usam "message" ou "error_description"
        let message = serde_json::from_str::<Value>(&error_body)
            .ok()
            .and_then(|json| {
                ["msg", "message", "error_description", "error"]
                    .iter()
                    .find_map(|k| json.get(*k).and_then(|v| v.as_str()).map(str::to_string))
            })
            .unwrap_or(error_body);

        Err(IdentityError::Api { status: status_code, message })
    }

    fn redirect_query(redirect_to: Option<&str>) -> Vec<(&'static str, String)> {
        redirect_to
            .map(|url| vec![("redirect_to", url.to_string())])
            .unwrap_or_default()
    }
}

#[async_trait]
impl IdentityProvider for GoTrueClient {
    async fn invite_user(
        &self,
        email: &str,
        metadata: Value,
        redirect_to: Option<&str>,
    ) -> Result<IdentityUser, IdentityError> {
        let body = json!({ "email": email, "data": metadata });
        let response = self
            .send(Method::POST, "/invite", &Self::redirect_query(redirect_to), Some(&body))
            .await?;
        Ok(response.json().await?)
    }

    // Para usuários ainda não confirmados, um novo convite reenvia o e-mail
    async fn resend_invite(&self, email: &str, redirect_to: Option<&str>) -> Result<(), IdentityError> {
        let body = json!({ "email": email });
        self.send(Method::POST, "/invite", &Self::redirect_query(redirect_to), Some(&body))
            .await?;
        Ok(())
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<(), IdentityError> {
        self.send(Method::DELETE, &format!("/admin/users/{}", user_id), &[], None)
            .await?;
        Ok(())
    }

    async fn update_user(
        &self,
        user_id: Uuid,
        email: &str,
        metadata: Value,
    ) -> Result<IdentityUser, IdentityError> {
        let body = json!({ "email": email, "user_metadata": metadata });
        let response = self
            .send(Method::PUT, &format!("/admin/users/{}", user_id), &[], Some(&body))
            .await?;
        Ok(response.json().await?)
    }

    // Percorre as páginas até uma vir incompleta
    async fn list_users(&self) -> Result<Vec<IdentityUser>, IdentityError> {
        let mut users = Vec::new();
        let mut page_number: u32 = 1;

        loop {
            let query = [
                ("page", page_number.to_string()),
                ("per_page", self.users_per_page.to_string()),
            ];
            let response = self.send(Method::GET, "/admin/users", &query, None).await?;
            let page: UserListPage = response.json().await?;

            let fetched = page.users.len();
            users.extend(page.users);
            if fetched < self.users_per_page as usize {
                break;
            }
            page_number += 1;
        }

        tracing::debug!("{} usuários lidos do provedor em {} página(s)", users.len(), page_number);
        Ok(users)
    }
}

// Provedor em memória para os testes de rotas e serviços
#[cfg(test)]
pub(crate) mod fake {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct FakeIdentity {
        pub users: Mutex<Vec<IdentityUser>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeIdentity {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeIdentity {
        async fn invite_user(
            &self,
            email: &str,
            metadata: Value,
            _redirect_to: Option<&str>,
        ) -> Result<IdentityUser, IdentityError> {
            self.record(format!("invite:{}", email));
            let mut users = self.users.lock().unwrap();
            // Como o GoTrue: convite repetido devolve o usuário pendente
            if let Some(existing) = users.iter().find(|u| u.email.as_deref() == Some(email)) {
                return Ok(existing.clone());
            }
            let user = IdentityUser {
                id: Uuid::new_v4(),
                email: Some(email.to_string()),
                invited_at: Some(Utc::now()),
                email_confirmed_at: None,
                last_sign_in_at: None,
                user_metadata: metadata,
            };
            users.push(user.clone());
            Ok(user)
        }

        async fn resend_invite(&self, email: &str, _redirect_to: Option<&str>) -> Result<(), IdentityError> {
            self.record(format!("resend:{}", email));
            Ok(())
        }

        async fn delete_user(&self, user_id: Uuid) -> Result<(), IdentityError> {
            self.record(format!("delete:{}", user_id));
            self.users.lock().unwrap().retain(|u| u.id != user_id);
            Ok(())
        }

        async fn update_user(
            &self,
            user_id: Uuid,
            email: &str,
            metadata: Value,
        ) -> Result<IdentityUser, IdentityError> {
            self.record(format!("update:{}:{}", user_id, email));
            Ok(IdentityUser {
                id: user_id,
                email: Some(email.to_string()),
                invited_at: None,
                email_confirmed_at: Some(Utc::now()),
                last_sign_in_at: None,
                user_metadata: metadata,
            })
        }

        async fn list_users(&self) -> Result<Vec<IdentityUser>, IdentityError> {
            Ok(self.users.lock().unwrap().clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    const KEY: &str = "service-role-key";

    fn client(server: &MockServer) -> GoTrueClient {
        GoTrueClient::new(&server.base_url(), KEY).unwrap()
    }

    #[tokio::test]
    async fn invite_sends_metadata_redirect_and_service_key() {
        let server = MockServer::start_async().await;
        let user_id = Uuid::new_v4();
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/auth/v1/invite")
                    .query_param("redirect_to", "https://app.exemplo.com/definir-senha")
                    .header("apikey", KEY)
                    .header("Authorization", format!("Bearer {}", KEY))
                    .json_body(json!({
                        "email": "ana@exemplo.com",
                        "data": { "full_name": "Ana Souza" }
                    }));
                then.status(200).json_body(json!({
                    "id": user_id,
                    "email": "ana@exemplo.com",
                    "invited_at": "2026-10-16T12:00:00Z",
                    "user_metadata": { "full_name": "Ana Souza" }
                }));
            })
            .await;

        let user = client(&server)
            .invite_user(
                "ana@exemplo.com",
                json!({ "full_name": "Ana Souza" }),
                Some("https://app.exemplo.com/definir-senha"),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(user.id, user_id);
        assert!(user.invited_at.is_some());
        assert!(user.email_confirmed_at.is_none());
    }

    #[tokio::test]
    async fn provider_error_message_is_extracted() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/auth/v1/invite");
                then.status(422).json_body(json!({
                    "code": 422,
                    "msg": "A user with this email address has already been registered"
                }));
            })
            .await;

        let err = client(&server)
            .invite_user("ana@exemplo.com", json!({}), None)
            .await
            .unwrap_err();

        match err {
            IdentityError::Api { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "A user with this email address has already been registered");
            }
            other => panic!("erro inesperado: {:?}", other),
        }
    }

    #[tokio::test]
    async fn non_json_error_body_is_kept_verbatim() {
        let server = MockServer::start_async().await;
        let id = Uuid::new_v4();
        server
            .mock_async(|when, then| {
                when.method(DELETE).path(format!("/auth/v1/admin/users/{}", id));
                then.status(502).body("bad gateway");
            })
            .await;

        let err = client(&server).delete_user(id).await.unwrap_err();
        assert_eq!(err.to_string(), "bad gateway");
    }

    #[tokio::test]
    async fn list_users_reads_the_users_page() {
        let server = MockServer::start_async().await;
        let id = Uuid::new_v4();
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/auth/v1/admin/users")
                    .query_param("page", "1")
                    .query_param("per_page", "1000");
                then.status(200).json_body(json!({
                    "aud": "authenticated",
                    "users": [{
                        "id": id,
                        "email": "bia@exemplo.com",
                        "email_confirmed_at": "2026-10-01T08:00:00Z",
                        "last_sign_in_at": null
                    }]
                }));
            })
            .await;

        let users = client(&server).list_users().await.unwrap();

        mock.assert_async().await;
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email.as_deref(), Some("bia@exemplo.com"));
        assert!(users[0].email_confirmed_at.is_some());
    }

    #[tokio::test]
    async fn list_users_follows_every_page() {
        let server = MockServer::start_async().await;
        let (first, second, third) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let page_one = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/auth/v1/admin/users")
                    .query_param("page", "1")
                    .query_param("per_page", "2");
                then.status(200).json_body(json!({
                    "users": [{ "id": first }, { "id": second }]
                }));
            })
            .await;
        let page_two = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/auth/v1/admin/users")
                    .query_param("page", "2")
                    .query_param("per_page", "2");
                then.status(200).json_body(json!({
                    "users": [{
                        "id": third,
                        "email": "convidado@exemplo.com",
                        "invited_at": "2026-10-10T09:00:00Z"
                    }]
                }));
            })
            .await;

        let users = client(&server).with_page_size(2).list_users().await.unwrap();

        page_one.assert_async().await;
        page_two.assert_async().await;
        let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![first, second, third]);
        assert!(users[2].invited_at.is_some());
    }

    #[tokio::test]
    async fn update_user_puts_email_and_metadata() {
        let server = MockServer::start_async().await;
        let id = Uuid::new_v4();
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path(format!("/auth/v1/admin/users/{}", id))
                    .json_body(json!({
                        "email": "novo@exemplo.com",
                        "user_metadata": { "full_name": "Carlos Lima" }
                    }));
                then.status(200).json_body(json!({ "id": id, "email": "novo@exemplo.com" }));
            })
            .await;

        let user = client(&server)
            .update_user(id, "novo@exemplo.com", json!({ "full_name": "Carlos Lima" }))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(user.email.as_deref(), Some("novo@exemplo.com"));
    }

    #[test]
    fn rejects_empty_project_url() {
        assert!(matches!(GoTrueClient::new("/", KEY), Err(IdentityError::Config(_))));
    }
}
