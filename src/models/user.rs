use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Account row. The password hash never leaves this struct; responses go
/// through `UserResponse`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Wire shape of an account, minus credentials
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: UserResponse,
}

/// Identity resolved by the auth gate, attached to the request extensions.
/// Its `id` scopes every repository call on the request.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
}

/// Claims carried in the HS256 access token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Owner id
    pub sub: String,
    pub email: String,
    pub jti: String,
    pub exp: usize,
    pub iat: usize,
}
