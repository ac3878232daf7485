use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use uuid::Uuid;

use crate::config::Config;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{Claims, LoginRequest, LoginResponse, SignupRequest, User, UserResponse};

const MIN_PASSWORD_LEN: usize = 6;

/// Account registration and credential verification. Sign-up and login issue
/// HS256 access tokens; every protected request presents one as a bearer
/// credential and gets resolved back to an owner id by `validate_token`.
pub struct AuthService;

impl AuthService {
    /// Create an account. The email is normalized (trimmed, lowercased)
    /// before the uniqueness check so `A@x.com` and `a@x.com` collide.
    pub async fn signup(db: &Database, req: SignupRequest) -> Result<UserResponse> {
        let email = normalize_email(&req.email)?;

        if req.password.len() < MIN_PASSWORD_LEN {
            return Err(AppError::BadRequest(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let taken: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(db.pool())
            .await?;
        if taken.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            email,
            password_hash: hash_password(&req.password)?,
            created_at: Utc::now().to_rfc3339(),
            updated_at: Utc::now().to_rfc3339(),
        };

        sqlx::query(
            "INSERT INTO users (id, email, password_hash, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.created_at)
        .bind(&user.updated_at)
        .execute(db.pool())
        .await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(UserResponse::from(user))
    }

    /// Verify credentials and issue an access token.
    ///
    /// A missing account and a wrong password produce the same error so the
    /// endpoint cannot be used to probe which emails exist.
    pub async fn login(db: &Database, config: &Config, req: LoginRequest) -> Result<LoginResponse> {
        let email = normalize_email(&req.email)?;
        let bad_credentials = || AppError::Unauthorized("Invalid email or password".to_string());

        let user: User = sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(bad_credentials)?;

        if !verify_password(&req.password, &user.password_hash)? {
            return Err(bad_credentials());
        }

        let access_token = Self::issue_token(&user, config)?;

        Ok(LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: config.jwt.access_token_expire_minutes * 60,
            user: UserResponse::from(user),
        })
    }

    fn issue_token(user: &User, config: &Config) -> Result<String> {
        let issued_at = Utc::now();
        let expires_at =
            issued_at + Duration::minutes(config.jwt.access_token_expire_minutes as i64);

        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: issued_at.timestamp() as usize,
            exp: expires_at.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt.secret.as_bytes()),
        )?)
    }

    /// Decode and verify a bearer token, including its expiry.
    pub fn validate_token(token: &str, config: &Config) -> Result<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.jwt.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))
    }
}

fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_ascii_lowercase();
    // Shape check only; deliverability is the identity provider's problem
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::BadRequest("Invalid email format".to_string())),
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Stored password hash is corrupt: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
