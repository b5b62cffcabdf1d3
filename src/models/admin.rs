// src/models/admin.rs
//
// Payloads dos endpoints administrativos. Os nomes dos campos no JSON
// seguem o que o painel já envia (mistura de camelCase e snake_case).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::team::TeamMember;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct InviteUserPayload {
    #[validate(required(message = "required"), email(message = "invalid_email"))]
    #[schema(example = "ana@exemplo.com")]
    pub email: Option<String>,

    #[serde(rename = "fullName")]
    #[validate(required(message = "required"), length(min = 1, message = "empty"))]
    #[schema(example = "Ana Souza")]
    pub full_name: Option<String>,

    #[validate(required(message = "required"), length(min = 1, message = "empty"))]
    #[schema(example = "Agente")]
    pub role_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResendInvitePayload {
    #[validate(required(message = "required"), email(message = "invalid_email"))]
    #[schema(example = "ana@exemplo.com")]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DeleteUserPayload {
    #[serde(rename = "userId")]
    #[validate(required(message = "required"))]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateUserDetailsPayload {
    #[serde(rename = "userId")]
    #[validate(required(message = "required"))]
    pub user_id: Option<Uuid>,

    #[validate(required(message = "required"), length(min = 1, message = "empty"))]
    #[schema(example = "Ana Souza Lima")]
    pub name: Option<String>,

    #[validate(required(message = "required"), email(message = "invalid_email"))]
    #[schema(example = "ana.lima@exemplo.com")]
    pub email: Option<String>,

    #[validate(required(message = "required"), length(min = 1, message = "empty"))]
    #[schema(example = "Supervisor")]
    pub role: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InviteUserResponse {
    pub message: String,
    pub user: TeamMember,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpdateUserDetailsResponse {
    pub message: String,
    pub member: TeamMember,
}
