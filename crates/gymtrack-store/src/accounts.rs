//! Email/password accounts backed by the local database
//!
//! Passwords are stored as Argon2id PHC strings; the salt and parameters
//! travel inside the hash.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use gymtrack_remote::{AuthProvider, RemoteResult};
use gymtrack_util::UserId;
use rusqlite::{OptionalExtension, params};
use tracing::{debug, info};

use crate::{SqliteStore, StoreError, StoreResult};

fn hash_password(password: &str) -> StoreResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> StoreResult<bool> {
    let parsed = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

impl SqliteStore {
    pub fn create_account(&self, email: &str, password: &str) -> StoreResult<UserId> {
        let key = email.trim().to_lowercase();
        let hash = hash_password(password)?;
        let uid = uuid::Uuid::new_v4().simple().to_string();

        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO accounts (email, uid, password_hash) VALUES (?, ?, ?)",
            params![key, uid, hash],
        )?;
        if inserted == 0 {
            return Err(StoreError::EmailInUse);
        }

        info!(uid = %uid, "Account registered");
        Ok(UserId::new(uid))
    }

    pub fn verify_account(&self, email: &str, password: &str) -> StoreResult<UserId> {
        let key = email.trim().to_lowercase();
        let row: Option<(String, String)> = self
            .conn()?
            .query_row(
                "SELECT uid, password_hash FROM accounts WHERE email = ?",
                [&key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((uid, hash)) if verify_password(password, &hash)? => Ok(UserId::new(uid)),
            _ => Err(StoreError::InvalidCredentials),
        }
    }

    pub fn change_account_password(
        &self,
        uid: &UserId,
        current: &str,
        new: &str,
    ) -> StoreResult<()> {
        let hash: Option<String> = self
            .conn()?
            .query_row(
                "SELECT password_hash FROM accounts WHERE uid = ?",
                [uid.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let hash = hash.ok_or_else(|| StoreError::NotFound {
            collection: "accounts".into(),
            id: uid.to_string(),
        })?;
        if !verify_password(current, &hash)? {
            return Err(StoreError::InvalidCredentials);
        }

        let new_hash = hash_password(new)?;
        self.conn()?.execute(
            "UPDATE accounts SET password_hash = ? WHERE uid = ?",
            params![new_hash, uid.as_str()],
        )?;
        debug!(uid = %uid, "Password changed");
        Ok(())
    }

    pub fn set_account_display_name(&self, uid: &UserId, name: &str) -> StoreResult<()> {
        let changed = self.conn()?.execute(
            "UPDATE accounts SET display_name = ? WHERE uid = ?",
            params![name, uid.as_str()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                collection: "accounts".into(),
                id: uid.to_string(),
            });
        }
        Ok(())
    }

    pub fn account_display_name(&self, uid: &UserId) -> StoreResult<Option<String>> {
        let name: Option<Option<String>> = self
            .conn()?
            .query_row(
                "SELECT display_name FROM accounts WHERE uid = ?",
                [uid.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name.flatten())
    }
}

#[async_trait]
impl AuthProvider for SqliteStore {
    async fn create_user(&self, email: &str, password: &str) -> RemoteResult<UserId> {
        Ok(self.create_account(email, password)?)
    }

    async fn sign_in(&self, email: &str, password: &str) -> RemoteResult<UserId> {
        Ok(self.verify_account(email, password)?)
    }

    async fn update_password(&self, uid: &UserId, current: &str, new: &str) -> RemoteResult<()> {
        Ok(self.change_account_password(uid, current, new)?)
    }

    async fn update_display_name(&self, uid: &UserId, name: &str) -> RemoteResult<()> {
        Ok(self.set_account_display_name(uid, name)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gymtrack_remote::RemoteError;

    #[test]
    fn hash_is_argon2id_and_salted() {
        let a = hash_password("Str0ng!pass").unwrap();
        let b = hash_password("Str0ng!pass").unwrap();
        assert!(a.starts_with("$argon2id$"));
        assert_ne!(a, b);
        assert!(verify_password("Str0ng!pass", &a).unwrap());
        assert!(!verify_password("wrong", &a).unwrap());
    }

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let store = SqliteStore::in_memory().unwrap();
        let uid = store.create_user("Asha@Example.com", "Str0ng!pass").await.unwrap();

        // Email lookup ignores case
        let signed_in = store.sign_in("asha@example.com", "Str0ng!pass").await.unwrap();
        assert_eq!(signed_in, uid);

        let err = store.sign_in("asha@example.com", "nope").await.unwrap_err();
        assert!(matches!(err, RemoteError::InvalidCredentials));
        let err = store.sign_in("nobody@example.com", "Str0ng!pass").await.unwrap_err();
        assert!(matches!(err, RemoteError::InvalidCredentials));
    }

    #[tokio::test]
    async fn duplicate_email_rejected() {
        let store = SqliteStore::in_memory().unwrap();
        store.create_user("asha@example.com", "Str0ng!pass").await.unwrap();
        let err = store
            .create_user("ASHA@example.com", "Other!pass1")
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::EmailInUse));
    }

    #[tokio::test]
    async fn password_change_requires_current() {
        let store = SqliteStore::in_memory().unwrap();
        let uid = store.create_user("asha@example.com", "Str0ng!pass").await.unwrap();

        let err = store
            .update_password(&uid, "wrong", "N3w!password")
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::InvalidCredentials));

        store
            .update_password(&uid, "Str0ng!pass", "N3w!password")
            .await
            .unwrap();
        assert!(store.sign_in("asha@example.com", "Str0ng!pass").await.is_err());
        assert_eq!(
            store.sign_in("asha@example.com", "N3w!password").await.unwrap(),
            uid
        );
    }

    #[tokio::test]
    async fn display_name_for_unknown_uid() {
        let store = SqliteStore::in_memory().unwrap();
        let uid = store.create_user("asha@example.com", "Str0ng!pass").await.unwrap();

        store.update_display_name(&uid, "Asha").await.unwrap();
        assert_eq!(store.account_display_name(&uid).unwrap().as_deref(), Some("Asha"));

        let err = store
            .update_display_name(&UserId::new("ghost"), "Nobody")
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::NotFound { .. }));
    }
}
