//! User service.
//!
//! Tokens are issued by an external provider, which also writes the user
//! rows. This service resolves tokens and lets users edit their profile.

use std::sync::Arc;

use crate::services::video::MediaUpload;
use chrono::{DateTime, Utc};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;
use vidshare_common::{
    AppError, AppResult, IdGenerator, MediaKind, StorageBackend, generate_storage_key,
};
use vidshare_db::{entities::user, repositories::UserRepository};

/// Input for registering a user.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(length(min = 1, max = 64))]
    pub username: String,

    #[validate(length(max = 1024))]
    pub profile_picture: Option<String>,
}

/// Profile changes the user may make themself.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserInput {
    #[validate(length(min = 1, max = 64))]
    pub username: Option<String>,
}

fn check_username(username: &str) -> AppResult<()> {
    if username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Ok(())
    } else {
        Err(AppError::Validation(
            "Username may only contain letters, digits and underscores".to_string(),
        ))
    }
}

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    storage: Arc<dyn StorageBackend>,
    id_gen: IdGenerator,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub fn new(user_repo: UserRepository, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            user_repo,
            storage,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a user holding the given bearer token, or a fresh one.
    pub async fn create(
        &self,
        input: CreateUserInput,
        token: Option<String>,
        token_expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<user::Model> {
        input.validate()?;
        check_username(&input.username)?;

        if self
            .user_repo
            .find_by_username(&input.username)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "Username {} is taken",
                input.username
            )));
        }

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            username: Set(input.username),
            profile_picture: Set(input.profile_picture),
            profile_picture_key: Set(None),
            token: Set(Some(token.unwrap_or_else(|| self.id_gen.generate_token()))),
            token_expires_at: Set(token_expires_at.map(Into::into)),
            created_at: Set(Utc::now().into()),
        };

        let user = self.user_repo.create(model).await?;
        tracing::info!(user_id = %user.id, username = %user.username, "User created");
        Ok(user)
    }

    /// Resolve a bearer token. Unknown and expired tokens are both unauthorized.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<user::Model> {
        let user = self
            .user_repo
            .find_by_token(token)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if let Some(expires_at) = user.token_expires_at
            && expires_at <= Utc::now()
        {
            tracing::debug!(user_id = %user.id, "Rejected expired token");
            return Err(AppError::Unauthorized);
        }

        Ok(user)
    }

    /// Get a user by ID.
    pub async fn get(&self, id: &str) -> AppResult<user::Model> {
        self.user_repo.get_by_id(id).await
    }

    /// Get a user by username.
    pub async fn get_by_username(&self, username: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::UserNotFound(username.to_string()))
    }

    /// Apply a profile edit. Renaming to a taken username is a conflict.
    pub async fn update(&self, user_id: &str, input: UpdateUserInput) -> AppResult<user::Model> {
        input.validate()?;
        let user = self.user_repo.get_by_id(user_id).await?;

        let Some(username) = input.username.filter(|name| *name != user.username) else {
            return Ok(user);
        };
        check_username(&username)?;
        if self.user_repo.find_by_username(&username).await?.is_some() {
            return Err(AppError::Conflict(format!("Username {username} is taken")));
        }

        let mut model: user::ActiveModel = user.into();
        model.username = Set(username);
        let user = self.user_repo.update(model).await?;
        tracing::info!(user_id = %user.id, username = %user.username, "User renamed");
        Ok(user)
    }

    /// Store a new avatar and point the profile at it. The old upload is removed.
    pub async fn set_profile_picture(
        &self,
        user_id: &str,
        picture: MediaUpload,
    ) -> AppResult<user::Model> {
        if picture.data.is_empty() {
            return Err(AppError::BadRequest("Profile picture is empty".to_string()));
        }
        MediaKind::Avatar.check_content_type(&picture.content_type)?;
        let user = self.user_repo.get_by_id(user_id).await?;

        let key = generate_storage_key(MediaKind::Avatar, user_id, &picture.file_name);
        let stored = self
            .storage
            .upload(&key, &picture.data, &picture.content_type)
            .await?;

        let old_key = user.profile_picture_key.clone();
        let mut model: user::ActiveModel = user.into();
        model.profile_picture = Set(Some(stored.url.clone()));
        model.profile_picture_key = Set(Some(stored.key.clone()));

        match self.user_repo.update(model).await {
            Ok(user) => {
                if let Some(old) = old_key {
                    self.discard(&old).await;
                }
                tracing::debug!(user_id = %user.id, "Profile picture replaced");
                Ok(user)
            }
            Err(e) => {
                self.discard(&stored.key).await;
                Err(e)
            }
        }
    }

    /// Best-effort removal of a stored file.
    async fn discard(&self, key: &str) {
        if let Err(e) = self.storage.delete(key).await {
            tracing::warn!(storage_key = %key, error = %e, "Failed to delete file from storage");
        }
    }
}
