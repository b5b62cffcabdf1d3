// src/models/auth.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

// Claims dos tokens emitidos pelo provedor de identidade
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,  // ID do usuário no provedor (= id do perfil)
    pub exp: usize,
    #[serde(default)]
    pub iat: Option<usize>,
    // String ou lista, dependendo do provedor
    #[serde(default)]
    pub aud: Option<Value>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Quem fez a requisição, já com o token validado.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
}
