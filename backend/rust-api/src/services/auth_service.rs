use anyhow::Context;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use validator::Validate;

use crate::config::AuthSettings;
use crate::error::{ServiceError, ServiceResult};
use crate::middlewares::auth::{JwtClaims, JwtService};
use crate::models::new_id;
use crate::models::refresh_token::RefreshToken;
use crate::models::user::{AuthResponse, LoginRequest, RegisterRequest, User, UserProfile, UserRole};
use crate::repository::{RepositoryError, Store};
use crate::utils::time::truncate_to_millis;

pub struct AuthService {
    store: Arc<dyn Store>,
    jwt_service: JwtService,
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
    bcrypt_cost: u32,
}

/// SHA-256 of a refresh token. Only the hash is ever stored.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_refresh_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, jwt_service: JwtService, settings: &AuthSettings) -> Self {
        Self {
            store,
            jwt_service,
            access_token_ttl_seconds: settings.access_token_ttl_seconds,
            refresh_token_ttl_seconds: settings.refresh_token_ttl_seconds,
            bcrypt_cost: settings.bcrypt_cost,
        }
    }

    pub async fn register(&self, req: RegisterRequest) -> ServiceResult<UserProfile> {
        req.validate()?;

        let email = req.email.trim().to_lowercase();
        let password_hash =
            hash(&req.password, self.bcrypt_cost).context("Failed to hash password")?;

        let now = truncate_to_millis(Utc::now());
        let user = User {
            id: new_id(),
            email,
            password_hash,
            role: UserRole::default(),
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };

        match self.store.insert_user(&user).await {
            Ok(()) => {}
            Err(RepositoryError::Duplicate) => return Err(ServiceError::UserAlreadyExists),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(user_id = %user.id, email = %user.email, "User registered");
        Ok(UserProfile::from(user))
    }

    pub async fn login(&self, req: LoginRequest) -> ServiceResult<AuthResponse> {
        let email = req.email.trim().to_lowercase();

        let Some(mut user) = self.store.find_user_by_email(&email).await? else {
            tracing::warn!(email = %email, "Failed login attempt: unknown email");
            return Err(ServiceError::InvalidCredentials);
        };

        if !verify(&req.password, &user.password_hash).context("Failed to verify password")? {
            tracing::warn!(email = %email, "Failed login attempt: invalid password");
            return Err(ServiceError::InvalidCredentials);
        }

        let now = truncate_to_millis(Utc::now());
        self.store.record_login(&user.id, now).await?;
        user.last_login_at = Some(now);

        let access_token = self.generate_access_token(&user)?;
        let refresh_token = self.create_refresh_token(&user.id).await?;

        tracing::info!(user_id = %user.id, email = %user.email, "Successful login");

        Ok(AuthResponse {
            access_token,
            refresh_token,
            user: UserProfile::from(user),
        })
    }

    fn generate_access_token(&self, user: &User) -> ServiceResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.access_token_ttl_seconds);

        let claims = JwtClaims {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role.as_str().to_string(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        self.jwt_service
            .generate_token(&claims)
            .map_err(|e| anyhow::anyhow!("Failed to generate token: {}", e).into())
    }

    async fn create_refresh_token(&self, user_id: &str) -> ServiceResult<String> {
        let token = generate_refresh_token();
        let now = truncate_to_millis(Utc::now());

        let record = RefreshToken {
            id: new_id(),
            user_id: user_id.to_string(),
            token_hash: hash_token(&token),
            created_at: now,
            expires_at: now + Duration::seconds(self.refresh_token_ttl_seconds),
            last_used_at: now,
            revoked: false,
        };
        self.store.insert_refresh_token(&record).await?;

        Ok(token)
    }

    /// Issues a new access token for a live refresh token.
    pub async fn refresh_token(&self, refresh_token: &str) -> ServiceResult<String> {
        let token_hash = hash_token(refresh_token);
        let now = truncate_to_millis(Utc::now());

        let record = self
            .store
            .find_refresh_token(&token_hash)
            .await?
            .filter(|t| t.is_usable_at(now))
            .ok_or(ServiceError::InvalidToken)?;

        self.store.touch_refresh_token(&token_hash, now).await?;

        let user = self
            .store
            .find_user_by_id(&record.user_id)
            .await?
            .ok_or(ServiceError::InvalidToken)?;

        self.generate_access_token(&user)
    }

    pub async fn logout(&self, refresh_token: &str) -> ServiceResult<()> {
        if !self
            .store
            .revoke_refresh_token(&hash_token(refresh_token))
            .await?
        {
            return Err(ServiceError::InvalidToken);
        }
        Ok(())
    }

    pub async fn get_user(&self, user_id: &str) -> ServiceResult<UserProfile> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .map(UserProfile::from)
            .ok_or(ServiceError::UserNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_hash_is_stable_hex() {
        let a = hash_token("secret");
        assert_eq!(a, hash_token("secret"));
        assert_eq!(a.len(), 64);
        assert_ne!(a, hash_token("other"));
    }

    #[test]
    fn test_refresh_tokens_are_random() {
        let a = generate_refresh_token();
        let b = generate_refresh_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
    }
}
