use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::models::{NewUser, PublicUser};
use crate::services::case_store::CaseStore;
use crate::utils::password::{dummy_hash, hash_password, verify_password};
use anyhow::anyhow;
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use uuid::Uuid;

/// Shown for both unknown usernames and wrong passwords.
pub const LOGIN_FAILED: &str = "Incorrect username or password";

pub struct AuthService {
    db: DatabaseConnection,
    store: Arc<dyn CaseStore>,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(db: DatabaseConnection, store: Arc<dyn CaseStore>, session_ttl_hours: i64) -> Self {
        Self {
            db,
            store,
            session_ttl: Duration::hours(session_ttl_hours),
        }
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<PublicUser, AppError> {
        // Friendly messages first; the unique indexes still decide a concurrent race.
        if self.store.get_user_by_username(username).await?.is_some() {
            return Err(AppError::Conflict("Username already exists".to_string()));
        }
        if self.store.get_user_by_email(email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| anyhow!("Hashing task failed: {}", e))??;

        let user = self
            .store
            .create_user(NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
            })
            .await?;

        tracing::info!(user_id = user.id, "👤 New user registered: {}", user.username);
        Ok(user.into())
    }

    /// Verifies credentials and opens a session. Returns the session id with the user.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(String, PublicUser), AppError> {
        let user = self.store.get_user_by_username(username).await?;

        // Unknown users are checked against a dummy hash
        let password = password.to_string();
        let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
        let valid = tokio::task::spawn_blocking(move || {
            let hash = stored_hash.as_deref().unwrap_or_else(|| dummy_hash());
            verify_password(&password, hash)
        })
        .await
        .map_err(|e| anyhow!("Verification task failed: {}", e))?;

        let user = match user {
            Some(user) if valid => user,
            other => {
                tracing::debug!(user_id = other.map(|u| u.id), "login rejected");
                return Err(AppError::Unauthorized(LOGIN_FAILED.to_string()));
            }
        };

        let now = Utc::now();
        let session = sessions::ActiveModel {
            id: Set(Uuid::new_v4().simple().to_string()),
            user_id: Set(user.id),
            created_at: Set(now),
            expires_at: Set(now + self.session_ttl),
        }
        .insert(&self.db)
        .await?;

        tracing::info!(user_id = user.id, "🔑 User logged in");
        Ok((session.id, user.into()))
    }

    pub async fn logout(&self, session_id: &str) -> Result<(), AppError> {
        let res = Sessions::delete_by_id(session_id.to_string())
            .exec(&self.db)
            .await?;
        if res.rows_affected > 0 {
            tracing::debug!("session closed");
        }
        Ok(())
    }

    /// Maps a session id to its user. Expired sessions and deleted users resolve to `None`.
    pub async fn resolve_session(&self, session_id: &str) -> Result<Option<users::Model>, AppError> {
        if session_id.is_empty() {
            return Ok(None);
        }

        let session = Sessions::find_by_id(session_id.to_string())
            .filter(sessions::Column::ExpiresAt.gt(Utc::now()))
            .one(&self.db)
            .await?;

        match session {
            Some(session) => Ok(self.store.get_user(session.user_id).await?),
            None => Ok(None),
        }
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64, DbErr> {
        let res = Sessions::delete_many()
            .filter(sessions::Column::ExpiresAt.lte(Utc::now()))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected)
    }
}
