// src/services/auth.rs

use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::{
    common::error::AppError,
    models::auth::{AuthUser, Claims},
};

// Audiência que o provedor coloca nos tokens de usuários logados
const TOKEN_AUDIENCE: &str = "authenticated";

#[derive(Clone)]
pub struct AuthService {
    jwt_secret: String,
}

impl AuthService {
    pub fn new(jwt_secret: String) -> Self {
        Self { jwt_secret }
    }

    /// Lê o `Authorization: Bearer <token>` e valida o token.
    pub fn authenticate_headers(&self, headers: &HeaderMap) -> Result<AuthUser, AppError> {
        let auth_header = headers
            .get(header::AUTHORIZATION)
            .ok_or(AppError::MissingToken)?
            .to_str()
            .map_err(|_| AppError::InvalidToken)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::InvalidToken)?;

        self.validate_token(token)
    }

    pub fn validate_token(&self, token: &str) -> Result<AuthUser, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[TOKEN_AUDIENCE]);

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &validation,
        )
        .map_err(|e| {
            tracing::debug!("Token rejeitado: {}", e);
            AppError::InvalidToken
        })?;

        Ok(AuthUser {
            id: token_data.claims.sub,
            email: token_data.claims.email,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_tokens {
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use uuid::Uuid;

    use crate::models::auth::Claims;

    pub const SECRET: &str = "segredo-de-teste-com-tamanho-suficiente";

    pub fn token_for(user_id: Uuid, secret: &str, expires_in_secs: i64) -> String {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            exp: (now.timestamp() + expires_in_secs) as usize,
            iat: Some(now.timestamp() as usize),
            aud: Some(serde_json::Value::from("authenticated")),
            email: Some("agente@exemplo.com".to_string()),
            role: Some("authenticated".to_string()),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref())).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_tokens::{token_for, SECRET};
    use super::*;
    use axum::http::HeaderValue;
    use uuid::Uuid;

    fn service() -> AuthService {
        AuthService::new(SECRET.to_string())
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn accepts_a_valid_bearer_token() {
        let id = Uuid::new_v4();
        let token = token_for(id, SECRET, 3600);

        let user = service()
            .authenticate_headers(&headers_with(&format!("Bearer {}", token)))
            .unwrap();

        assert_eq!(user.id, id);
        assert_eq!(user.email.as_deref(), Some("agente@exemplo.com"));
    }

    #[test]
    fn missing_header_is_its_own_error() {
        let err = service().authenticate_headers(&HeaderMap::new()).unwrap_err();
        assert!(matches!(err, AppError::MissingToken));
    }

    #[test]
    fn rejects_wrong_scheme_wrong_secret_and_expired_tokens() {
        let id = Uuid::new_v4();

        let basic = service().authenticate_headers(&headers_with("Basic abc"));
        assert!(matches!(basic, Err(AppError::InvalidToken)));

        let forged = token_for(id, "outro-segredo-qualquer-de-teste", 3600);
        assert!(matches!(service().validate_token(&forged), Err(AppError::InvalidToken)));

        // Bem além da tolerância padrão de 60s
        let expired = token_for(id, SECRET, -3600);
        assert!(matches!(service().validate_token(&expired), Err(AppError::InvalidToken)));
    }
}
