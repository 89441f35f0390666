use std::sync::Arc;

use serde::Deserialize;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{
    application::{
        auth::CredentialHasher,
        context::{ServiceContext, conflict_on_duplicate, parse_id},
        error::AppError,
        filter::{QueryPredicate, USER_FIELDS},
        pagination::{Page, PageRequest},
    },
    domain::{
        document::StoredRecord,
        entities::UserRecord,
        payload::{Projection, UserPayload},
        types::Role,
    },
};

pub const USER_EXISTS: &str = "User with this email exists";
pub const USER_NOT_FOUND: &str = "User not found";
pub const INVALID_USER_ID: &str = "Invalid user ID";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserCommand {
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserCommand {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

#[derive(Clone)]
pub struct UserService {
    ctx: ServiceContext,
    hasher: Arc<dyn CredentialHasher>,
}

impl UserService {
    pub fn new(ctx: ServiceContext, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self { ctx, hasher }
    }

    pub async fn create(&self, command: CreateUserCommand) -> Result<UserPayload, AppError> {
        let email = valid_email(&command.email)?;
        let password = required_password(&command.password)?;
        if self.find_by_email(&email).await?.is_some() {
            return Err(AppError::conflict(USER_EXISTS));
        }

        let now = OffsetDateTime::now_utc();
        let record = UserRecord {
            id: Uuid::new_v4(),
            email,
            password_hash: self.hasher.hash(password)?,
            refresh_token_hash: None,
            role: command.role.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        self.ctx
            .store()
            .insert(UserRecord::COLLECTION, &record.to_document()?)
            .await
            .map_err(|err| conflict_on_duplicate(err, USER_EXISTS))?;

        info!(user_id = %record.id, role = record.role.as_str(), "user created");
        Ok(record.project())
    }

    /// Users are listed straight from storage; the listing is never cached.
    pub async fn list(&self, request: &PageRequest) -> Result<Page<UserPayload>, AppError> {
        self.ctx.page::<UserRecord>(request, &USER_FIELDS).await
    }

    pub async fn get(&self, raw_id: &str) -> Result<UserPayload, AppError> {
        let id = parse_id(raw_id, INVALID_USER_ID)?;
        self.ctx
            .cached_payload::<UserRecord>(id, USER_NOT_FOUND)
            .await
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        let predicate = QueryPredicate::text_equals("email", email.trim());
        match self
            .ctx
            .store()
            .find_one(UserRecord::COLLECTION, &predicate)
            .await?
        {
            Some(document) => Ok(Some(UserRecord::from_document(document)?)),
            None => Ok(None),
        }
    }

    pub async fn find_record(&self, id: Uuid) -> Result<Option<UserRecord>, AppError> {
        self.ctx.load::<UserRecord>(id).await
    }

    pub async fn update(
        &self,
        raw_id: &str,
        command: UpdateUserCommand,
    ) -> Result<UserPayload, AppError> {
        let id = parse_id(raw_id, INVALID_USER_ID)?;
        let mut record = self
            .find_record(id)
            .await?
            .ok_or_else(|| AppError::not_found(USER_NOT_FOUND))?;

        if let Some(email) = command.email {
            let email = valid_email(&email)?;
            if email != record.email
                && let Some(other) = self.find_by_email(&email).await?
                && other.id != id
            {
                return Err(AppError::conflict(USER_EXISTS));
            }
            record.email = email;
        }
        if let Some(password) = command.password {
            record.password_hash = self.hasher.hash(required_password(&password)?)?;
        }
        if let Some(role) = command.role {
            record.role = role;
        }

        let record = self.save(record).await?;
        info!(user_id = %id, "user updated");
        Ok(record.project())
    }

    pub async fn delete(&self, raw_id: &str) -> Result<(), AppError> {
        let id = parse_id(raw_id, INVALID_USER_ID)?;
        let deleted = self
            .ctx
            .store()
            .delete_by_id(UserRecord::COLLECTION, id)
            .await?;
        if !deleted {
            return Err(AppError::not_found(USER_NOT_FOUND));
        }

        self.ctx.evict::<UserRecord>(id).await;
        info!(user_id = %id, "user deleted");
        Ok(())
    }

    pub(crate) async fn store_refresh_hash(
        &self,
        mut record: UserRecord,
        refresh_token_hash: Option<String>,
    ) -> Result<UserRecord, AppError> {
        record.refresh_token_hash = refresh_token_hash;
        self.save(record).await
    }

    async fn save(&self, mut record: UserRecord) -> Result<UserRecord, AppError> {
        record.updated_at = OffsetDateTime::now_utc();
        let updated = self
            .ctx
            .store()
            .update_by_id(UserRecord::COLLECTION, &record.to_document()?)
            .await
            .map_err(|err| conflict_on_duplicate(err, USER_EXISTS))?;
        if !updated {
            return Err(AppError::not_found(USER_NOT_FOUND));
        }
        self.ctx.evict::<UserRecord>(record.id).await;
        Ok(record)
    }
}

fn valid_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim();
    let well_formed = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !well_formed {
        return Err(AppError::validation("email must be a valid email address"));
    }
    Ok(email.to_string())
}

fn required_password(raw: &str) -> Result<&str, AppError> {
    if raw.is_empty() {
        return Err(AppError::validation("Password is required"));
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use super::*;
    use crate::{
        cache::ReadThrough, infra::error::InfraError, infra::memory::InMemoryDocumentStore,
    };

    struct ReversingHasher;

    impl CredentialHasher for ReversingHasher {
        fn hash(&self, secret: &str) -> Result<String, InfraError> {
            Ok(secret.chars().rev().collect())
        }

        fn verify(&self, secret: &str, hash: &str) -> Result<bool, InfraError> {
            Ok(self.hash(secret)? == hash)
        }
    }

    fn service() -> UserService {
        let ctx = ServiceContext::new(
            Arc::new(InMemoryDocumentStore::new()),
            ReadThrough::disabled(),
            NonZeroU32::new(10).expect("non-zero"),
            true,
        );
        UserService::new(ctx, Arc::new(ReversingHasher))
    }

    fn command(email: &str) -> CreateUserCommand {
        CreateUserCommand {
            email: email.to_string(),
            password: "hunter22".to_string(),
            role: None,
        }
    }

    #[test]
    fn email_shape_is_checked() {
        assert!(valid_email("ada@example.com").is_ok());
        for bad in ["", "ada", "@example.com", "ada@example", "ada@@example.com", "a da@x.io"] {
            assert!(valid_email(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[tokio::test]
    async fn create_hashes_password_and_defaults_role() {
        let service = service();
        let payload = service.create(command("ada@example.com")).await.expect("create");
        assert_eq!(payload.role, Role::Customer);

        let record = service
            .find_by_email("ada@example.com")
            .await
            .expect("lookup")
            .expect("stored");
        assert_eq!(record.password_hash, "22retnuh");
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let service = service();
        service.create(command("ada@example.com")).await.expect("first");
        let err = service
            .create(command("ada@example.com"))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, AppError::Conflict(message) if message == USER_EXISTS));
    }

    #[tokio::test]
    async fn update_changes_role_without_touching_password() {
        let service = service();
        let created = service.create(command("grace@example.com")).await.expect("create");
        let updated = service
            .update(
                &created.id.to_string(),
                UpdateUserCommand {
                    role: Some(Role::Vendor),
                    ..UpdateUserCommand::default()
                },
            )
            .await
            .expect("update");
        assert_eq!(updated.role, Role::Vendor);

        let record = service
            .find_record(created.id)
            .await
            .expect("lookup")
            .expect("stored");
        assert_eq!(record.password_hash, "22retnuh");
    }
}
