use std::sync::Arc;

use domains::{
    Account, AccountRepository, CredentialHasher, DomainError, Result, Session, SessionStore,
    DELETED_SENTINEL,
};
use tracing::{info, instrument};

use crate::deadline::Deadline;

/// Returned for any credential mismatch so callers cannot tell which part failed.
pub const INVALID_CREDENTIALS: &str = "Invalid username or password";
pub const NOT_LOGGED_IN: &str = "You must be logged in for this operation.";

/// Registration, login state and the credential check every mutation goes through.
#[derive(Clone)]
pub struct AccountService {
    accounts: Arc<dyn AccountRepository>,
    sessions: Arc<dyn SessionStore>,
    hasher: Arc<dyn CredentialHasher>,
    deadline: Deadline,
}

impl AccountService {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        sessions: Arc<dyn SessionStore>,
        hasher: Arc<dyn CredentialHasher>,
        deadline: Deadline,
    ) -> Self {
        Self {
            accounts,
            sessions,
            hasher,
            deadline,
        }
    }

    #[instrument(skip(self, password))]
    pub async fn create_account(&self, username: &str, password: &str) -> Result<()> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(DomainError::validation(
                "Username or password not supplied in request",
            ));
        }
        if username == DELETED_SENTINEL || username.trim() != username {
            return Err(DomainError::validation(format!(
                "Username '{username}' is not allowed"
            )));
        }
        let taken = self
            .deadline
            .run("find account", self.accounts.find(username))
            .await?
            .is_some();
        if taken {
            return Err(DomainError::Conflict(format!("Username '{username}' taken")));
        }

        let hash = self.hasher.hash(password).await?;
        self.deadline
            .run("create account", self.accounts.create(Account::new(username, hash)))
            .await?;
        info!("account created");
        Ok(())
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        self.check_credentials(username, password).await?;
        let session = self
            .deadline
            .run("begin session", self.sessions.begin(username))
            .await?;
        info!(expires_at = %session.expires_at, "logged in");
        Ok(session)
    }

    /// Ends the session when the credentials check out. Never fails on bad credentials.
    #[instrument(skip(self, password))]
    pub async fn logout(&self, username: &str, password: &str) -> Result<()> {
        if self.check_credentials(username, password).await.is_ok() {
            let ended = self
                .deadline
                .run("end session", self.sessions.end(username))
                .await?;
            info!(ended, "logged out");
        }
        Ok(())
    }

    pub async fn is_logged_in(&self, username: &str) -> Result<bool> {
        if username.is_empty() {
            return Ok(false);
        }
        self.deadline
            .run("check session", self.sessions.is_active(username))
            .await
    }

    /// Valid credentials and a live session, or an `Unauthorized` error.
    pub async fn authorize(&self, username: &str, password: &str) -> Result<()> {
        if username.is_empty() || password.is_empty() {
            return Err(DomainError::Unauthorized(NOT_LOGGED_IN.into()));
        }
        self.check_credentials(username, password).await?;
        if !self.is_logged_in(username).await? {
            return Err(DomainError::Unauthorized(NOT_LOGGED_IN.into()));
        }
        Ok(())
    }

    async fn check_credentials(&self, username: &str, password: &str) -> Result<()> {
        let account = self
            .deadline
            .run("find account", self.accounts.find(username))
            .await?
            .ok_or_else(|| DomainError::Unauthorized(INVALID_CREDENTIALS.into()))?;
        if !self.hasher.verify(password, &account.password_hash).await? {
            return Err(DomainError::Unauthorized(INVALID_CREDENTIALS.into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domains::{MockAccountRepository, MockCredentialHasher, MockSessionStore};
    use mockall::predicate::eq;

    fn hasher() -> MockCredentialHasher {
        let mut hasher = MockCredentialHasher::new();
        hasher.expect_hash().returning(|pw| Ok(format!("hashed:{pw}")));
        hasher
            .expect_verify()
            .returning(|pw, hash| Ok(hash == format!("hashed:{pw}")));
        hasher
    }

    fn service(accounts: MockAccountRepository, sessions: MockSessionStore) -> AccountService {
        AccountService::new(
            Arc::new(accounts),
            Arc::new(sessions),
            Arc::new(hasher()),
            Deadline::default(),
        )
    }

    fn alice() -> Option<Account> {
        Some(Account::new("alice", "hashed:pw"))
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_the_same() {
        let mut accounts = MockAccountRepository::new();
        accounts.expect_find().with(eq("alice")).returning(|_| Ok(alice()));
        accounts.expect_find().with(eq("mallory")).returning(|_| Ok(None));
        let svc = service(accounts, MockSessionStore::new());

        let wrong = svc.login("alice", "nope").await.unwrap_err();
        let unknown = svc.login("mallory", "pw").await.unwrap_err();
        assert_eq!(wrong, unknown);
        assert_eq!(wrong, DomainError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    #[tokio::test]
    async fn authorize_requires_live_session() {
        let mut accounts = MockAccountRepository::new();
        accounts.expect_find().returning(|_| Ok(alice()));
        let mut sessions = MockSessionStore::new();
        sessions.expect_is_active().returning(|_| Ok(false));
        let svc = service(accounts, sessions);

        let err = svc.authorize("alice", "pw").await.unwrap_err();
        assert_eq!(err, DomainError::Unauthorized(NOT_LOGGED_IN.into()));
        let err = svc.authorize("", "").await.unwrap_err();
        assert_eq!(err, DomainError::Unauthorized(NOT_LOGGED_IN.into()));
    }

    #[tokio::test]
    async fn login_starts_session() {
        let mut accounts = MockAccountRepository::new();
        accounts.expect_find().returning(|_| Ok(alice()));
        let mut sessions = MockSessionStore::new();
        sessions.expect_begin().with(eq("alice")).times(1).returning(|user| {
            let now = Utc::now();
            Ok(Session {
                username: user.to_string(),
                started_at: now,
                expires_at: now + chrono::Duration::hours(1),
            })
        });
        let svc = service(accounts, sessions);
        assert_eq!(svc.login("alice", "pw").await.unwrap().username, "alice");
    }

    #[tokio::test]
    async fn duplicate_and_reserved_usernames_are_rejected() {
        let mut accounts = MockAccountRepository::new();
        accounts.expect_find().returning(|_| Ok(alice()));
        accounts.expect_create().never();
        let svc = service(accounts, MockSessionStore::new());

        assert!(matches!(svc.create_account("alice", "pw").await, Err(DomainError::Conflict(_))));
        assert!(matches!(svc.create_account(DELETED_SENTINEL, "pw").await, Err(DomainError::Validation(_))));
        assert!(matches!(svc.create_account("bob", "").await, Err(DomainError::Validation(_))));
    }
}
