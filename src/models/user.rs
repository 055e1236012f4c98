//! Gateway users
//!
//! Users own routing records and authenticate against the admin API.

use std::time::{SystemTime, UNIX_EPOCH};

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::record::find_records_for_owner;
use crate::document::{Changes, Document};
use crate::error::{Result, StoreError};
use crate::store::Store;

/// Email of the user created on first start
pub const ADMIN_EMAIL: &str = "admin@localhost";

/// Length of the generated admin password
const ADMIN_PASSWORD_LEN: usize = 10;

/// A single user of the application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Hash")]
    pub hash: String,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "CreatedAt")]
    pub created_at: i64,
    #[serde(rename = "UpdatedAt")]
    pub updated_at: i64,
}

impl Document for User {
    const KIND: &'static str = "User";
    const ALIASES: &'static [(&'static str, &'static str)] = &[
        ("Hash", "hash"),
        ("Email", "email"),
        ("CreatedAt", "created_at"),
        ("UpdatedAt", "updated_at"),
    ];
}

impl User {
    /// A new, unsaved user with a hashed password
    pub fn new(email: impl Into<String>, password: &str) -> Result<Self> {
        let now = unix_now();
        Ok(Self {
            hash: hash_password(password)?,
            email: email.into(),
            created_at: now,
            updated_at: now,
            ..Self::default()
        })
    }

    /// Lookups return a zero-value user when nothing matched
    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }

    /// Check `password` against the stored hash
    pub fn verify_password(&self, password: &str) -> bool {
        match PasswordHash::new(&self.hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

// =============================================================================
// Lookups
// =============================================================================

/// The user registered with `email`.
///
/// Scans every user; when none matches the result is an empty user
/// (check [`User::is_empty`]), not an error.
pub fn find_user_by_email(store: &Store, email: &str) -> Result<User> {
    let mut users: Vec<User> = Vec::new();
    store.all(&mut users)?;

    Ok(users
        .into_iter()
        .find(|user| user.email == email)
        .unwrap_or_default())
}

/// The user matching both `email` and `password`, `None` otherwise
pub fn authenticate(store: &Store, email: &str, password: &str) -> Result<Option<User>> {
    let user = find_user_by_email(store, email)?;
    if user.is_empty() || !user.verify_password(password) {
        return Ok(None);
    }
    Ok(Some(user))
}

// =============================================================================
// Mutations
// =============================================================================

/// Register a new user; the email must not be taken yet
pub fn create_user(store: &Store, email: &str, password: &str) -> Result<User> {
    if email.is_empty() {
        return Err(StoreError::InvalidRequest("email is required".to_string()));
    }
    if password.is_empty() {
        return Err(StoreError::InvalidRequest("password is required".to_string()));
    }
    if !find_user_by_email(store, email)?.is_empty() {
        return Err(StoreError::Conflict(format!(
            "user email {} must be unique across the application",
            email
        )));
    }

    let mut user = User::new(email, password)?;
    store.save(&mut user)?;

    info!(id = %user.id, email, "user created");
    Ok(user)
}

/// Replace a stored user's password hash, leaving other fields untouched.
///
/// `user` only needs its identifier; it comes back fully populated.
pub fn set_password(store: &Store, user: &mut User, password: &str) -> Result<()> {
    let mut changes = Changes::new();
    changes.insert("Hash".to_string(), json!(hash_password(password)?));
    changes.insert("UpdatedAt".to_string(), json!(unix_now()));

    store.update(user, &changes)
}

/// Delete a user unless they still own records
pub fn delete_user(store: &Store, user: &User) -> Result<()> {
    let owned = find_records_for_owner(store, &user.id)?;
    if !owned.is_empty() {
        warn!(user_id = %user.id, records = owned.len(), "refusing to delete record owner");
        return Err(StoreError::OwnershipConflict {
            user_id: user.id.clone(),
            records: owned.len(),
        });
    }

    store.delete(user)
}

/// Create the admin user when no user exists yet.
///
/// Returns the generated password so it can be shown once.
pub fn ensure_admin(store: &Store) -> Result<Option<String>> {
    if !store.keys(&User::default())?.is_empty() {
        return Ok(None);
    }

    let password: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ADMIN_PASSWORD_LEN)
        .map(char::from)
        .collect();

    let mut admin = User::new(ADMIN_EMAIL, &password)?;
    store.save(&mut admin)?;

    info!(id = %admin.id, email = ADMIN_EMAIL, "no users found, created admin user");
    Ok(Some(password))
}

// =============================================================================
// Helpers
// =============================================================================

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StoreError::Credentials(e.to_string()))
}

/// Seconds since the Unix epoch
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
