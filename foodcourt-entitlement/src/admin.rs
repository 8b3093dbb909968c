//! The admin capability and the credential check that grants it.

use core::fmt;
use core::time::Duration;
use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString};
use argon2::Argon2;
use tracing::{info, warn};

use crate::error::EntitlementError;
use crate::store::{within, AdminCredentialStore};

/// What the caller of an entitlement operation is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Caller {
    #[default]
    Anonymous,
    Admin,
}

impl Caller {
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// Username plus an Argon2id hash of the secret in PHC string format, which
/// carries its own salt and parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminCredential {
    username: String,
    password_hash: String,
}

impl AdminCredential {
    pub fn new(username: &str, password: &str) -> Result<Self, EntitlementError> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|err| EntitlementError::Internal(Box::new(err)))?
            .to_string();
        Ok(Self {
            username: username.to_owned(),
            password_hash,
        })
    }

    #[must_use]
    pub const fn from_parts(username: String, password_hash: String) -> Self {
        Self {
            username,
            password_hash,
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    #[must_use]
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let parsed = match PasswordHash::new(&self.password_hash) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("stored admin credential is not a valid password hash: {err}");
                return false;
            }
        };
        // hash first so a wrong username costs as much as a wrong password
        let password_matches = Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok();
        password_matches && username == self.username
    }
}

impl fmt::Debug for AdminCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminCredential")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Turns presented credentials into a [`Caller`].
#[derive(Clone)]
pub struct AdminGateway {
    store: Arc<dyn AdminCredentialStore>,
    store_timeout: Duration,
}

impl AdminGateway {
    pub fn new(store: Arc<dyn AdminCredentialStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    /// Creates the admin credential unless one exists. An existing credential
    /// is left alone even if `password` differs. Returns whether one was
    /// created.
    pub async fn bootstrap(&self, username: &str, password: &str) -> Result<bool, EntitlementError> {
        let created = within(
            self.store_timeout,
            self.store
                .insert_admin_credential(AdminCredential::new(username, password)?),
        )
        .await?;
        if created {
            info!(username, "created admin credential");
        } else {
            info!("admin credential already exists");
        }
        Ok(created)
    }

    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Caller, EntitlementError> {
        let credential = within(self.store_timeout, self.store.admin_credential()).await?;
        match credential {
            Some(credential) if credential.verify(username, password) => Ok(Caller::Admin),
            Some(_) => {
                warn!(username, "rejected admin credentials");
                Err(EntitlementError::Unauthorized)
            }
            None => {
                warn!("no admin credential has been set up");
                Err(EntitlementError::Unauthorized)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;

    #[test]
    fn verifies_only_the_registered_secret() {
        let credential = AdminCredential::new("cscr", "s3cret").unwrap();
        assert!(credential.password_hash().starts_with("$argon2"));
        assert!(credential.verify("cscr", "s3cret"));
        assert!(!credential.verify("cscr", "s3cret "));
        assert!(!credential.verify("other", "s3cret"));
        assert!(!credential.verify("cscr", ""));
    }

    #[test]
    fn salts_differ_between_credentials() {
        let first = AdminCredential::new("cscr", "same").unwrap();
        let second = AdminCredential::new("cscr", "same").unwrap();
        assert_ne!(first.password_hash(), second.password_hash());
        assert!(first.verify("cscr", "same"));
        assert!(second.verify("cscr", "same"));
    }

    #[test]
    fn debug_output_hides_the_hash() {
        let credential = AdminCredential::new("cscr", "s3cret").unwrap();
        let debug = format!("{credential:?}");
        assert!(debug.contains("cscr"));
        assert!(!debug.contains(credential.password_hash()));
    }

    #[test]
    fn corrupt_credentials_never_verify() {
        let credential =
            AdminCredential::from_parts("cscr".to_owned(), "not-a-valid-hash".to_owned());
        assert!(!credential.verify("cscr", "anything"));
    }

    #[tokio::test]
    async fn bootstrap_keeps_the_first_credential() {
        let gateway = AdminGateway::new(Arc::new(InMemoryStore::new()), Duration::from_secs(1));
        assert!(matches!(
            gateway.authenticate("admin", "pw").await,
            Err(EntitlementError::Unauthorized)
        ));

        assert!(gateway.bootstrap("admin", "pw").await.unwrap());
        assert!(!gateway.bootstrap("admin", "changed").await.unwrap());

        assert_eq!(gateway.authenticate("admin", "pw").await.unwrap(), Caller::Admin);
        assert!(matches!(
            gateway.authenticate("admin", "changed").await,
            Err(EntitlementError::Unauthorized)
        ));
    }
}
