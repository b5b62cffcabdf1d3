use serde_json::json;
use sqlx::{Postgres, Transaction};

use crate::common::error::AppError;
use crate::config::AppState;
use crate::middleware::auth::AuthenticatedUser;
use crate::middleware::tenancy::TenantContext;

// ---
// Helper RLS: a "chave" para o banco de dados
// ---
/// Abre uma transação com as variáveis de sessão que as políticas de RLS do
/// provedor leem (`request.jwt.claims` e `app.tenant_id`). O `set_config(.., true)`
/// vale só até o fim da transação, então nada vaza para a próxima requisição.
pub(crate) async fn begin_rls_transaction(
    app_state: &AppState,
    tenant_ctx: &TenantContext,
    user: &AuthenticatedUser,
) -> Result<Transaction<'static, Postgres>, AppError> {
    let mut tx = app_state.db_pool.begin().await?;

    let claims = json!({
        "sub": user.0.id,
        "email": user.0.email,
        "role": "authenticated",
    });

    sqlx::query("SELECT set_config('request.jwt.claims', $1, true)")
        .bind(claims.to_string())
        .execute(&mut *tx)
        .await?;

    sqlx::query("SELECT set_config('app.tenant_id', $1, true)")
        .bind(tenant_ctx.0.to_string())
        .execute(&mut *tx)
        .await?;

    Ok(tx)
}
