use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::db::Database;
use crate::error::AppError;
use crate::models::CurrentUser;
use crate::services::AuthService;
use crate::AppState;

/// Auth gate applied to every protected route.
///
/// The bearer token is validated per request and the resolved identity is
/// attached as a `CurrentUser` extension; its `id` is the mandatory owner
/// scope for every repository call further down.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Unauthorized("Missing or invalid Authorization header".to_string())
        })?;

    let claims = AuthService::validate_token(token, &state.config)?;
    let current_user = resolve_current_user(&state.db, &claims.sub).await?;

    request.extensions_mut().insert(current_user);

    Ok(next.run(request).await)
}

/// Tokens outlive accounts; a deleted account's tokens must stop working.
/// A missing user is `Unauthorized`; a record-store failure stays a
/// `Database` error so an outage reports as one, not as a bad credential.
async fn resolve_current_user(db: &Database, user_id: &str) -> Result<CurrentUser, AppError> {
    let email: Option<String> = sqlx::query_scalar("SELECT email FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(db.pool())
        .await?;

    match email {
        Some(email) => Ok(CurrentUser {
            id: user_id.to_string(),
            email,
        }),
        None => Err(AppError::Unauthorized("Invalid token".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn test_db() -> Database {
        let path = std::env::temp_dir().join(format!("skyvault_gate_{}.db", Uuid::new_v4()));
        let db = Database::new(path.to_str().unwrap()).await.unwrap();
        db.run_migrations().await.unwrap();
        db
    }

    #[tokio::test]
    async fn resolves_existing_user() {
        let db = test_db().await;
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, created_at, updated_at) \
             VALUES ('u1', 'ann@example.com', 'x', '2026-01-01', '2026-01-01')",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let user = resolve_current_user(&db, "u1").await.unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.email, "ann@example.com");
    }

    #[tokio::test]
    async fn missing_user_is_unauthorized() {
        let db = test_db().await;
        let err = resolve_current_user(&db, "ghost").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn store_failure_is_not_unauthorized() {
        let db = test_db().await;
        db.pool().close().await;

        let err = resolve_current_user(&db, "u1").await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }
}
