//! Authentication service for login and token management

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared::{login_name, GeoLevel, Role};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::user::UserProfile;

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
    jwt_secret: String,
    access_token_expiry: i64,
    refresh_token_expiry: i64,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

/// Authentication tokens
#[derive(Debug, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Successful login payload
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: AuthTokens,
    pub user: CurrentUserProfile,
}

/// Profile of the signed-in user with the level their role operates at
#[derive(Debug, Serialize)]
pub struct CurrentUserProfile {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub geo_level: GeoLevel,
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    id: Uuid,
    password_hash: String,
    active: bool,
}

/// Hash a password for storage
pub fn hash_password(password: &str) -> AppResult<String> {
    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Decode and validate an access token
pub fn decode_access_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::InvalidToken)
}

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            jwt_secret: config.jwt.secret.clone(),
            access_token_expiry: config.jwt.access_token_expiry,
            refresh_token_expiry: config.jwt.refresh_token_expiry,
        }
    }

    /// Authenticate with a username (or an e-mail whose local part is the
    /// username) and password
    pub async fn login(&self, identifier: &str, password: &str) -> AppResult<LoginResponse> {
        let username = login_name(identifier);

        let credentials = sqlx::query_as::<_, CredentialRow>(
            "SELECT id, password_hash, active FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

        let valid = verify(password, &credentials.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;

        if !valid {
            tracing::info!(username, "Rejected login: bad password");
            return Err(AppError::InvalidCredentials);
        }

        if !credentials.active {
            return Err(AppError::Unauthorized("Account is disabled".to_string()));
        }

        let profile = self.me(credentials.id).await?;
        let tokens = self.generate_tokens(profile.profile.id, profile.profile.role)?;
        self.store_refresh_token(profile.profile.id, &tokens.refresh_token)
            .await?;

        tracing::info!(user_id = %profile.profile.id, role = %profile.profile.role, "User logged in");

        Ok(LoginResponse {
            tokens,
            user: profile,
        })
    }

    /// Load the signed-in user's profile
    pub async fn me(&self, user_id: Uuid) -> AppResult<CurrentUserProfile> {
        let profile = UserProfile::fetch(&self.db, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        Ok(CurrentUserProfile {
            geo_level: profile.role.geo_level(),
            profile,
        })
    }

    /// Exchange a refresh token for a new token pair, revoking the old one
    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<AuthTokens> {
        let token_hash = Self::hash_token(refresh_token);
        let mut tx = self.db.begin().await?;

        let (user_id, role) = sqlx::query_as::<_, (Uuid, String)>(
            r#"
            UPDATE refresh_tokens rt
            SET revoked_at = NOW()
            FROM users u
            WHERE u.id = rt.user_id
              AND rt.token_hash = $1
              AND rt.expires_at > NOW()
              AND rt.revoked_at IS NULL
              AND u.active = true
            RETURNING rt.user_id, u.role
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired refresh token".to_string()))?;

        let role = role
            .parse::<Role>()
            .map_err(|e| AppError::Internal(e.to_string()))?;

        let tokens = self.generate_tokens(user_id, role)?;

        sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(Self::hash_token(&tokens.refresh_token))
        .bind(Utc::now() + Duration::seconds(self.refresh_token_expiry))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(tokens)
    }

    /// Generate access and refresh tokens
    fn generate_tokens(&self, user_id: Uuid, role: Role) -> AppResult<AuthTokens> {
        let now = Utc::now();
        let access_exp = now + Duration::seconds(self.access_token_expiry);

        let claims = Claims {
            sub: user_id.to_string(),
            role: role.as_str().to_string(),
            exp: access_exp.timestamp(),
            iat: now.timestamp(),
        };

        let access_token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

        Ok(AuthTokens {
            access_token,
            refresh_token: Uuid::new_v4().to_string(),
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry,
        })
    }

    /// Store refresh token in database
    async fn store_refresh_token(&self, user_id: Uuid, token: &str) -> AppResult<()> {
        let expires_at = Utc::now() + Duration::seconds(self.refresh_token_expiry);

        sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(Self::hash_token(token))
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Hash a token for storage
    fn hash_token(token: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService {
            db: PgPool::connect_lazy("postgres://localhost/unused").unwrap(),
            jwt_secret: "test-secret".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 7200,
        }
    }

    #[tokio::test]
    async fn test_token_round_trip_carries_role() {
        let svc = service();
        let user_id = Uuid::new_v4();
        let tokens = svc.generate_tokens(user_id, Role::ChefZone).unwrap();

        let claims = decode_access_token(&tokens.access_token, "test-secret").unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, "chef_zone");
        assert_eq!(tokens.expires_in, 3600);
    }

    #[tokio::test]
    async fn test_token_rejected_with_wrong_secret() {
        let svc = service();
        let tokens = svc.generate_tokens(Uuid::new_v4(), Role::Admin).unwrap();
        assert!(matches!(
            decode_access_token(&tokens.access_token, "other-secret"),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_hash_token_is_stable_and_opaque() {
        let a = AuthService::hash_token("abc");
        assert_eq!(a, AuthService::hash_token("abc"));
        assert_ne!(a, AuthService::hash_token("abd"));
        assert!(!a.contains("abc"));
    }

    #[test]
    fn test_password_hash_verifies() {
        let hashed = hash_password("s3cret!").unwrap();
        assert!(verify("s3cret!", &hashed).unwrap());
    }
}
