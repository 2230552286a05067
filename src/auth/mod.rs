/*!
 * # Authentication
 *
 * Bearer tokens (JWT, HS256) carry an explicit [`Session`]: who the caller is, which role
 * they hold, which seller they belong to and when the session expires. Handlers receive the
 * session through the [`Session`] extractor and pass it down to the services, which make
 * every authorization decision from it.
 *
 * Passwords are stored as argon2 PHC strings.
 */

use crate::config::AppConfig;
use crate::entities::user::{self, Role};
use crate::errors::ServiceError;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,               // Subject (user ID)
    pub role: String,              // Portal role
    pub seller_id: Option<String>, // Seller the caller acts for
    pub jti: String,               // JWT ID
    pub iat: i64,                  // Issued at time
    pub exp: i64,                  // Expiration time
    pub nbf: i64,                  // Not valid before time
    pub iss: String,               // Issuer
    pub aud: String,               // Audience
}

/// Identity of the caller for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user_id: Uuid,
    pub role: Role,
    /// For sellers their own id, for customers their assigned seller.
    pub seller_id: Option<Uuid>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// A session is expired from `expires_at` onwards.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Fails with `Forbidden` unless the caller is master or admin.
    pub fn require_staff(&self) -> Result<(), ServiceError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "This action requires an admin account".to_string(),
            ))
        }
    }

    /// Session a user receives on login.
    pub fn for_user(user: &user::Model, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        let seller_id = match user.role {
            Role::Seller => Some(user.id),
            _ => user.seller_id,
        };
        let ttl = ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::hours(1));
        Self {
            user_id: user.id,
            role: user.role,
            seller_id,
            issued_at,
            expires_at: issued_at + ttl,
        }
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub session_ttl: Duration,
}

impl AuthConfig {
    pub fn new(jwt_secret: String, session_ttl: Duration) -> Self {
        Self {
            jwt_secret,
            jwt_audience: "portal-api".to_string(),
            jwt_issuer: "portal-auth".to_string(),
            session_ttl,
        }
    }

    pub fn from_app_config(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            Duration::from_secs(cfg.session_ttl_secs),
        )
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No authentication token provided")]
    MissingToken,

    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Account no longer exists")]
    UnknownAccount,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::AccountDisabled => ServiceError::Forbidden(err.to_string()),
            AuthError::TokenCreation(msg) => ServiceError::InternalError(msg),
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

/// Issued bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub expires_at: DateTime<Utc>,
}

/// Successful login: the token plus the account it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub token: TokenResponse,
    pub user: user::Model,
}

/// Authentication service that handles password checks and token issuance
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    db: Arc<DatabaseConnection>,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self { config, db }
    }

    /// Hashes a password into an argon2 PHC string.
    pub fn hash_password(password: &str) -> Result<String, ServiceError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ServiceError::HashError(e.to_string()))
    }

    /// Checks a password against a stored hash; a malformed hash never verifies.
    pub fn verify_password(password: &str, password_hash: &str) -> bool {
        match PasswordHash::new(password_hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                warn!("Stored password hash is malformed: {}", e);
                false
            }
        }
    }

    /// Signs a token for `user` valid for the configured session lifetime.
    pub fn issue_token(&self, user: &user::Model) -> Result<TokenResponse, AuthError> {
        let session = Session::for_user(user, Utc::now(), self.config.session_ttl);
        let claims = Claims {
            sub: session.user_id.to_string(),
            role: session.role.to_string(),
            seller_id: session.seller_id.map(|id| id.to_string()),
            jti: Uuid::new_v4().to_string(),
            iat: session.issued_at.timestamp(),
            exp: session.expires_at.timestamp(),
            nbf: session.issued_at.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.session_ttl.as_secs(),
            expires_at: session.expires_at,
        })
    }

    /// Decodes and verifies a bearer token into a [`Session`].
    pub fn validate_token(&self, token: &str) -> Result<Session, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);
        validation.leeway = 0;

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

        let session = Session {
            user_id: Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?,
            role: Role::from_str(&claims.role).map_err(|_| AuthError::InvalidToken)?,
            seller_id: claims
                .seller_id
                .as_deref()
                .map(Uuid::parse_str)
                .transpose()
                .map_err(|_| AuthError::InvalidToken)?,
            issued_at: Utc
                .timestamp_opt(claims.iat, 0)
                .single()
                .ok_or(AuthError::InvalidToken)?,
            expires_at: Utc
                .timestamp_opt(claims.exp, 0)
                .single()
                .ok_or(AuthError::InvalidToken)?,
        };

        if session.is_expired(Utc::now()) {
            return Err(AuthError::TokenExpired);
        }

        Ok(session)
    }

    /// Validates a bearer token and checks the account behind it is still active.
    ///
    /// Role and seller are taken from the current account rather than the token, so a
    /// deactivation or reassignment applies to tokens issued before it.
    #[instrument(skip(self, token))]
    pub async fn authenticate(&self, token: &str) -> Result<Session, ServiceError> {
        let session = self.validate_token(token)?;
        let user = user::Entity::find_by_id(session.user_id)
            .one(&*self.db)
            .await?
            .ok_or(AuthError::UnknownAccount)?;

        if !user.is_active {
            warn!(user_id = %user.id, "Rejected token of a deactivated account");
            return Err(AuthError::AccountDisabled.into());
        }

        let current = Session::for_user(&user, session.issued_at, Duration::ZERO);
        Ok(Session {
            expires_at: session.expires_at,
            ..current
        })
    }

    /// Verifies credentials of an active user and issues a token.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ServiceError> {
        let email = email.trim().to_lowercase();
        let user = user::Entity::find()
            .filter(user::Column::Email.eq(email.as_str()))
            .one(&*self.db)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !Self::verify_password(password, &user.password_hash) {
            debug!(user_id = %user.id, "Password mismatch");
            return Err(AuthError::InvalidCredentials.into());
        }

        if !user.is_active {
            return Err(AuthError::AccountDisabled.into());
        }

        let token = self.issue_token(&user)?;
        debug!(user_id = %user.id, role = %user.role, "User logged in");
        Ok(LoginResponse { token, user })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    Arc<AuthService>: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = Arc::<AuthService>::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;

        auth.authenticate(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn service(ttl: Duration) -> AuthService {
        let db = Arc::new(DatabaseConnection::Disconnected);
        AuthService::new(
            AuthConfig::new(
                "test_secret_with_enough_entropy_0123456789abcdef".to_string(),
                ttl,
            ),
            db,
        )
    }

    fn user(role: Role, seller_id: Option<Uuid>) -> user::Model {
        let now = Utc::now();
        user::Model {
            id: Uuid::new_v4(),
            email: "someone@example.com".into(),
            name: "Someone".into(),
            password_hash: String::new(),
            role,
            seller_id,
            document: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn password_hash_verifies() {
        let hash = AuthService::hash_password("s3cret-pass").unwrap();
        assert!(AuthService::verify_password("s3cret-pass", &hash));
        assert!(!AuthService::verify_password("wrong", &hash));
        assert!(!AuthService::verify_password("s3cret-pass", "not-a-hash"));
    }

    #[test]
    fn token_round_trips_into_session() {
        let auth = service(Duration::from_secs(600));
        let seller = Uuid::new_v4();
        let customer = user(Role::Customer, Some(seller));

        let token = auth.issue_token(&customer).unwrap();
        let session = auth.validate_token(&token.access_token).unwrap();

        assert_eq!(session.user_id, customer.id);
        assert_eq!(session.role, Role::Customer);
        assert_eq!(session.seller_id, Some(seller));
        assert!(!session.is_expired(Utc::now()));
    }

    #[test]
    fn seller_session_acts_for_itself() {
        let auth = service(Duration::from_secs(600));
        let seller = user(Role::Seller, None);
        let token = auth.issue_token(&seller).unwrap();
        let session = auth.validate_token(&token.access_token).unwrap();
        assert_eq!(session.seller_id, Some(seller.id));
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let token = service(Duration::from_secs(600))
            .issue_token(&user(Role::Admin, None))
            .unwrap();
        let mut other = service(Duration::from_secs(600));
        other.config.jwt_secret = "another_secret_entirely_different_9876543210".into();
        assert_matches!(
            other.validate_token(&token.access_token),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = service(Duration::from_secs(0));
        let token = auth.issue_token(&user(Role::Admin, None)).unwrap();
        assert_matches!(
            auth.validate_token(&token.access_token),
            Err(AuthError::TokenExpired)
        );
    }

    #[test]
    fn session_expiry_boundary() {
        let issued = Utc::now();
        let session = Session::for_user(&user(Role::Admin, None), issued, Duration::from_secs(300));
        assert!(!session.is_expired(issued + ChronoDuration::seconds(299)));
        assert!(session.is_expired(issued + ChronoDuration::seconds(300)));
    }

    #[test]
    fn require_staff_rejects_customers() {
        let session = Session::for_user(&user(Role::Customer, None), Utc::now(), Duration::from_secs(60));
        assert_matches!(session.require_staff(), Err(ServiceError::Forbidden(_)));
    }
}
