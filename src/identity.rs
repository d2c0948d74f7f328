//! Credential storage and verification.

use argon2::{
    password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::Utc;
use model::entities::{prelude::User, user};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set, SqlErr,
};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Username already taken.")]
    UsernameTaken,
    #[error("Email already used.")]
    EmailTaken,
    #[error("Password hashing error: {0}")]
    Hashing(String),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Account to be created.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// Hash a password into a PHC string.
pub fn hash_password(password: &str) -> Result<String, IdentityError> {
    let salt = SaltString::generate(&mut rand_core::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| IdentityError::Hashing(e.to_string()))
}

/// Check a password against a stored PHC string. Unparseable hashes never verify.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

pub async fn username_exists(db: &DatabaseConnection, username: &str) -> Result<bool, DbErr> {
    Ok(User::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await?
        .is_some())
}

pub async fn email_exists(db: &DatabaseConnection, email: &str) -> Result<bool, DbErr> {
    Ok(User::find()
        .filter(user::Column::Email.eq(email))
        .one(db)
        .await?
        .is_some())
}

/// Create an account, refusing duplicate usernames (checked first) and emails.
#[instrument(skip(db, new_user), fields(username = new_user.username))]
pub async fn create_user(
    db: &DatabaseConnection,
    new_user: NewUser<'_>,
) -> Result<user::Model, IdentityError> {
    if username_exists(db, new_user.username).await? {
        return Err(IdentityError::UsernameTaken);
    }
    if email_exists(db, new_user.email).await? {
        return Err(IdentityError::EmailTaken);
    }

    let password_hash = hash_password(new_user.password)?;
    let record = user::ActiveModel {
        username: Set(new_user.username.to_string()),
        email: Set(new_user.email.to_string()),
        password_hash: Set(password_hash),
        is_staff: Set(new_user.is_staff),
        is_superuser: Set(new_user.is_superuser),
        date_joined: Set(Utc::now()),
        ..Default::default()
    };

    // A unique violation here means a concurrent registration won the race
    let created = record.insert(db).await.map_err(insert_error)?;
    info!("Created user {} with ID {}", created.username, created.id);
    Ok(created)
}

fn insert_error(e: DbErr) -> IdentityError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) if detail.contains("email") => {
            IdentityError::EmailTaken
        }
        Some(SqlErr::UniqueConstraintViolation(_)) => IdentityError::UsernameTaken,
        _ => IdentityError::Database(e),
    }
}

/// Resolve a username/password pair to the account it belongs to.
#[instrument(skip(db, password))]
pub async fn authenticate(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
) -> Result<Option<user::Model>, DbErr> {
    let Some(found) = User::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await?
    else {
        debug!("No such user");
        // Spend the same argon2 work as a wrong password
        let _ = hash_password(password);
        return Ok(None);
    };

    if verify_password(password, &found.password_hash) {
        Ok(Some(found))
    } else {
        debug!("Password mismatch");
        Ok(None)
    }
}
