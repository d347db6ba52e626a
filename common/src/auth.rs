// Authentication: JWT issuing/validation and email + password login

use crate::db::repositories::user::UserRepository;
use crate::errors::{AuthError, DatabaseError, FieldErrors, ValidationError};
use crate::models::{User, UserClaims};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, instrument};
use uuid::Uuid;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MAX_USERNAME_LENGTH: usize = 150;
pub const MAX_PERSON_NAME_LENGTH: usize = 150;

lazy_static! {
    static ref EMAIL: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid");
    static ref USERNAME: Regex = Regex::new(r"^[\w.@+-]+$").expect("username pattern is valid");
}

/// JWT token service for encoding and decoding tokens
#[derive(Clone)]
pub struct JwtService {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    expiration_hours: i64,
}

impl JwtService {
    /// Create a new JWT service with the given secret and expiration
    #[instrument(skip(secret))]
    pub fn new(secret: &str, expiration_hours: u64) -> Self {
        Self {
            encoding_key: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding_key: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            expiration_hours: expiration_hours as i64,
        }
    }

    /// Encode user claims into a JWT token
    #[instrument(skip(self))]
    pub fn encode_token(
        &self,
        user_id: &str,
        email: &str,
        username: &str,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = UserClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            username: username.to_string(),
            exp: (now + Duration::hours(self.expiration_hours)).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "Failed to encode JWT token");
            AuthError::AuthenticationFailed(format!("Failed to encode token: {}", e))
        })
    }

    /// Decode and validate a JWT token
    #[instrument(skip(self, token))]
    pub fn decode_token(&self, token: &str) -> Result<UserClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let token_data =
            decode::<UserClaims>(token, &self.decoding_key, &validation).map_err(|e| {
                tracing::warn!(error = %e, "Failed to decode JWT token");
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    _ => AuthError::InvalidToken(format!("Token validation failed: {}", e)),
                }
            })?;

        Ok(token_data.claims)
    }
}

/// Sign-up payload
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub password: String,
}

impl Registration {
    /// Check field formats before touching the database
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = FieldErrors::new();

        if self.email.len() > MAX_EMAIL_LENGTH || !EMAIL.is_match(&self.email) {
            errors.add("email", "Enter a valid email address.");
        }
        if self.username.is_empty()
            || self.username.chars().count() > MAX_USERNAME_LENGTH
            || !USERNAME.is_match(&self.username)
        {
            errors.add(
                "username",
                "Use up to 150 letters, digits and @/./+/-/_ characters.",
            );
        }
        if self.first_name.chars().count() > MAX_PERSON_NAME_LENGTH {
            errors.add("first_name", "First name is too long.");
        }
        if self.last_name.chars().count() > MAX_PERSON_NAME_LENGTH {
            errors.add("last_name", "Last name is too long.");
        }
        check_password("password", &self.password, &mut errors);

        errors.into_result()
    }
}

fn check_password(field: &str, password: &str, errors: &mut FieldErrors) {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.add(
            field,
            format!(
                "Password must be at least {} characters.",
                MIN_PASSWORD_LENGTH
            ),
        );
    }
}

/// Database authentication service for validating credentials and managing users
#[derive(Clone)]
pub struct DatabaseAuthService {
    jwt_service: JwtService,
    user_repository: Arc<UserRepository>,
}

impl DatabaseAuthService {
    pub fn new(jwt_service: JwtService, user_repository: UserRepository) -> Self {
        Self {
            jwt_service,
            user_repository: Arc::new(user_repository),
        }
    }

    /// Authenticate a user with email and password, returning a JWT
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let user = self
            .user_repository
            .find_by_email(email)
            .await
            .map_err(|e| {
                error!(error = %e, email = %email, "Database error during login");
                AuthError::AuthenticationFailed(format!("Database error: {}", e))
            })?
            .ok_or_else(|| {
                tracing::warn!(email = %email, "Login for unknown email");
                AuthError::InvalidCredentials
            })?;

        let password_valid = bcrypt::verify(password, &user.password_hash).map_err(|e| {
            error!(error = %e, "Failed to verify password");
            AuthError::AuthenticationFailed(format!("Password verification failed: {}", e))
        })?;

        if !password_valid {
            tracing::warn!(email = %email, "Invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        let token =
            self.jwt_service
                .encode_token(&user.id.to_string(), &user.email, &user.username)?;

        tracing::info!(user_id = %user.id, "User logged in successfully");
        Ok(token)
    }

    /// Register a new user with a bcrypt-hashed password
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: Registration) -> Result<User, AuthError> {
        registration.validate()?;

        let password_hash = hash_password(&registration.password)?;
        let user = User {
            id: Uuid::new_v4(),
            email: registration.email.to_lowercase(),
            username: registration.username,
            first_name: registration.first_name,
            last_name: registration.last_name,
            password_hash,
            created_at: Utc::now(),
        };

        self.user_repository.create(&user).await.map_err(|e| match e {
            DatabaseError::DuplicateKey(_) => {
                AuthError::UserExists("email or username already taken".to_string())
            }
            other => {
                error!(error = %other, "Failed to create user");
                AuthError::AuthenticationFailed(format!("Failed to create user: {}", other))
            }
        })?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Replace the password after checking the current one
    #[instrument(skip(self, current_password, new_password))]
    pub async fn set_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let mut errors = FieldErrors::new();
        check_password("new_password", new_password, &mut errors);
        errors.into_result()?;

        let user = self
            .user_repository
            .find_by_id(user_id)
            .await
            .map_err(|e| AuthError::AuthenticationFailed(format!("Database error: {}", e)))?
            .ok_or_else(|| AuthError::UserNotFound(user_id.to_string()))?;

        let current_valid = bcrypt::verify(current_password, &user.password_hash)
            .map_err(|e| AuthError::AuthenticationFailed(e.to_string()))?;
        if !current_valid {
            return Err(ValidationError::invalid("current_password", "Incorrect password.").into());
        }

        let password_hash = hash_password(new_password)?;
        self.user_repository
            .update_password(user_id, &password_hash)
            .await
            .map_err(|e| {
                error!(error = %e, user_id = %user_id, "Failed to update password");
                AuthError::AuthenticationFailed(format!("Failed to update password: {}", e))
            })?;

        tracing::info!(user_id = %user_id, "Password updated");
        Ok(())
    }
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| {
        error!(error = %e, "Failed to hash password");
        AuthError::AuthenticationFailed(format!("Password hashing failed: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> Registration {
        Registration {
            email: "cook@example.com".to_string(),
            username: "cook".to_string(),
            first_name: "Ann".to_string(),
            last_name: "Cook".to_string(),
            password: "s3cret-pass".to_string(),
        }
    }

    #[test]
    fn test_jwt_service_encode_decode() {
        let service = JwtService::new("test-secret", 24);
        let token = service
            .encode_token("user-123", "cook@example.com", "cook")
            .expect("Failed to encode token");
        let claims = service.decode_token(&token).expect("Failed to decode token");

        assert_eq!(claims.sub, "user-123");
        assert_eq!(claims.email, "cook@example.com");
        assert_eq!(claims.username, "cook");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_jwt_service_expired_token() {
        let service = JwtService::new("test-secret", 1);
        let now = Utc::now();
        let claims = UserClaims {
            sub: "user-123".to_string(),
            email: "cook@example.com".to_string(),
            username: "cook".to_string(),
            exp: (now - Duration::hours(1)).timestamp(),
            iat: (now - Duration::hours(2)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("test-secret".as_bytes()),
        )
        .expect("Failed to encode token");

        assert!(matches!(
            service.decode_token(&token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn test_jwt_service_rejects_foreign_secret() {
        let issuer = JwtService::new("one-secret", 24);
        let verifier = JwtService::new("another-secret", 24);
        let token = issuer.encode_token("u", "e@example.com", "u").unwrap();
        assert!(matches!(
            verifier.decode_token(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_jwt_service_invalid_token() {
        let service = JwtService::new("test-secret", 24);
        let result = service.decode_token("invalid.token.here");
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_registration_accepts_valid_payload() {
        assert!(registration().validate().is_ok());
    }

    #[test]
    fn test_registration_rejects_bad_fields() {
        let mut reg = registration();
        reg.email = "not-an-email".to_string();
        reg.username = "has spaces".to_string();
        reg.password = "short".to_string();

        let Err(ValidationError::Fields(fields)) = reg.validate() else {
            panic!("expected field errors");
        };
        assert!(fields.contains("email"));
        assert!(fields.contains("username"));
        assert!(fields.contains("password"));
        assert!(!fields.contains("first_name"));
    }
}
