// src/routes.rs

use axum::{
    extract::State,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    docs::ApiDoc,
    handlers,
    middleware::{i18n::Locale, tenancy::tenant_guard},
};

async fn route_not_found(State(app_state): State<AppState>, locale: Locale) -> ApiError {
    AppError::RouteNotFound.to_api_error(&locale, &app_state.i18n_store)
}

async fn method_not_allowed(State(app_state): State<AppState>, locale: Locale) -> ApiError {
    AppError::MethodNotAllowed.to_api_error(&locale, &app_state.i18n_store)
}

pub fn build_router(app_state: AppState) -> Router {
    // Endpoints administrativos: autenticam por conta própria, depois de validar o corpo
    let admin_routes = Router::new()
        .route("/invite-user", post(handlers::admin::invite_user))
        .route("/resend-invite", post(handlers::admin::resend_invite))
        .route("/delete-user", post(handlers::admin::delete_user))
        .route("/update-user-details", post(handlers::admin::update_user_details))
        .route("/get-team-members", get(handlers::admin::get_team_members));

    // API de dados: token + organização resolvidos pelo middleware
    let api_routes = Router::new()
        .route("/api/me", get(handlers::team::get_me))
        .route("/api/roles", get(handlers::team::list_roles))
        .route("/api/clients"
               ,post(handlers::clients::create_client)
               .get(handlers::clients::list_clients)
        )
        .route("/api/clients/{id}"
               ,get(handlers::clients::get_client)
               .put(handlers::clients::update_client)
               .delete(handlers::clients::delete_client)
        )
        .route("/api/tickets"
               ,post(handlers::tickets::create_ticket)
               .get(handlers::tickets::list_tickets)
        )
        .route("/api/tickets/board", get(handlers::tickets::get_board))
        .route("/api/tickets/{id}"
               ,get(handlers::tickets::get_ticket)
               .put(handlers::tickets::update_ticket)
        )
        .route("/api/tickets/{id}/status", post(handlers::tickets::change_status))
        .route("/api/tickets/{id}/history", get(handlers::tickets::get_history))
        .route("/api/dashboard/summary", get(handlers::dashboard::get_summary))
        .route("/api/crm/funnels"
               ,post(handlers::crm::create_funnel)
               .get(handlers::crm::list_funnels)
        )
        .route("/api/crm/funnels/{id}/stages", post(handlers::crm::add_stage))
        .route("/api/crm/funnels/{id}/board", get(handlers::crm::get_funnel_board))
        .route("/api/crm/deals"
               ,post(handlers::crm::create_deal)
               .get(handlers::crm::list_deals)
        )
        .route("/api/crm/deals/{id}"
               ,axum::routing::put(handlers::crm::update_deal)
               .delete(handlers::crm::delete_deal)
        )
        .route("/api/crm/deals/{id}/stage", post(handlers::crm::move_deal))
        .route("/api/crm/deals/{id}/status", post(handlers::crm::set_deal_status))
        .route("/api/crm/companies"
               ,post(handlers::crm::create_company)
               .get(handlers::crm::list_companies)
        )
        .route("/api/crm/contacts"
               ,post(handlers::crm::create_contact)
               .get(handlers::crm::list_contacts)
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            tenant_guard,
        ));

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(admin_routes)
        .merge(api_routes)
        .fallback(route_not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::{
        config::Settings,
        services::{auth::test_tokens, identity::fake::FakeIdentity},
    };

    // Pool preguiçoso: nenhum destes cenários chega ao banco
    fn app() -> (Router, Arc<FakeIdentity>) {
        let settings = Settings::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://localhost/helpdesk".into()),
            "IDENTITY_URL" => Some("http://localhost:9999".into()),
            "IDENTITY_SERVICE_KEY" => Some("service-role".into()),
            "JWT_SECRET" => Some(test_tokens::SECRET.into()),
            _ => None,
        })
        .unwrap();
        let pool = PgPoolOptions::new()
            .connect_lazy(&settings.database_url)
            .unwrap();
        let identity = Arc::new(FakeIdentity::default());
        let state = AppState::from_parts(pool, settings, identity.clone()).unwrap();
        (build_router(state), identity)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn invite_without_role_name_is_rejected_before_auth() {
        let (app, identity) = app();

        let response = app
            .oneshot(post_json("/invite-user", json!({ "email": "ana@empresa.com", "fullName": "Ana" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("role_name"));
        assert!(body["details"]["role_name"].is_array());
        assert!(identity.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn team_members_without_authorization_is_401() {
        let (app, _) = app();

        let response = app
            .oneshot(Request::builder().uri("/get-team-members").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Cabeçalho Authorization ausente.");
    }

    #[tokio::test]
    async fn valid_body_with_a_forged_token_is_401() {
        let (app, identity) = app();
        let token = test_tokens::token_for(Uuid::new_v4(), "outro-segredo-qualquer-bem-comprido", 3600);

        let mut request = post_json(
            "/invite-user",
            json!({ "email": "ana@empresa.com", "fullName": "Ana", "role_name": "Agente" }),
        );
        request
            .headers_mut()
            .insert(header::AUTHORIZATION, format!("Bearer {}", token).parse().unwrap());

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(identity.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_json_is_400_with_error_body() {
        let (app, _) = app();

        let request = Request::builder()
            .method("POST")
            .uri("/delete-user")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{ userId: "))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn wrong_method_is_405_with_error_body() {
        let (app, _) = app();

        let response = app
            .oneshot(Request::builder().uri("/invite-user").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json_body(response).await["error"], "Método não permitido.");
    }

    #[tokio::test]
    async fn unknown_route_is_404_in_the_client_language() {
        let (app, _) = app();

        let request = Request::builder()
            .uri("/nao-existe")
            .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn data_api_requires_a_token() {
        let (app, _) = app();

        let response = app
            .oneshot(Request::builder().uri("/api/tickets").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn health_and_openapi_are_public() {
        let (app, _) = app();

        let health = app
            .clone()
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);

        let docs = app
            .oneshot(Request::builder().uri("/api-docs/openapi.json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(docs.status(), StatusCode::OK);
        let doc = json_body(docs).await;
        assert!(doc["paths"]["/invite-user"].is_object());
        assert!(doc["paths"]["/api/tickets/{id}/status"].is_object());
    }
}
