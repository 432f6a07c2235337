/// User directory seam
///
/// The admin auth core never owns user records. It reads principals through
/// `UserDirectory`; `InMemoryUserDirectory` is the implementation the server
/// ships with, seeded from configuration.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{OnceLock, RwLock};

use crate::auth::{hash_password_with_cost, verify_password};
use crate::error::AppError;

/// Authenticated identity as the directory reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: i64,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
}

impl Principal {
    /// Staff or superuser
    pub fn is_admin(&self) -> bool {
        self.is_staff || self.is_superuser
    }
}

/// Errors raised by a directory backend
#[derive(Debug, Clone)]
pub enum DirectoryError {
    /// Backend could not answer (lookup failure, corrupt record)
    Unavailable(String),
    /// Id or email already taken
    Conflict(String),
    /// Account data refused, e.g. a weak password
    Rejected(String),
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectoryError::Unavailable(msg) => write!(f, "User directory unavailable: {}", msg),
            DirectoryError::Conflict(msg) => write!(f, "User directory conflict: {}", msg),
            DirectoryError::Rejected(msg) => write!(f, "Account rejected: {}", msg),
        }
    }
}

impl std::error::Error for DirectoryError {}

/// Lookup operations the auth core consumes
///
/// `Ok(None)` means "no such principal" (or wrong password for
/// `authenticate`); `Err` means the lookup itself failed.
pub trait UserDirectory: Send + Sync {
    fn authenticate(&self, email: &str, password: &str) -> Result<Option<Principal>, DirectoryError>;

    fn get_by_id(&self, id: i64) -> Result<Option<Principal>, DirectoryError>;
}

struct Account {
    principal: Principal,
    password_hash: String,
}

// Verified against on unknown emails so a miss costs the same bcrypt round
const DUMMY_PASSWORD: &str = "DirectoryMiss0";

/// Process-local directory with bcrypt password hashes
pub struct InMemoryUserDirectory {
    accounts: RwLock<HashMap<i64, Account>>,
    hash_cost: u32,
    dummy_hash: OnceLock<Option<String>>,
}

impl Default for InMemoryUserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            hash_cost: bcrypt::DEFAULT_COST,
            dummy_hash: OnceLock::new(),
        }
    }

    /// Override the bcrypt cost used by `register`
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self.dummy_hash = OnceLock::new();
        self
    }

    /// Add an account, hashing `password` first
    ///
    /// # Errors
    /// Fails on a weak password or when the id/email is already present
    pub fn register(&self, principal: Principal, password: &str) -> Result<(), DirectoryError> {
        let password_hash =
            hash_password_with_cost(password, self.hash_cost).map_err(|e| match e {
                AppError::Validation(v) => DirectoryError::Rejected(v.to_string()),
                other => DirectoryError::Unavailable(other.to_string()),
            })?;
        self.insert_hashed(principal, password_hash)
    }

    /// Add an account whose password is already a bcrypt hash
    pub fn insert_hashed(
        &self,
        principal: Principal,
        password_hash: String,
    ) -> Result<(), DirectoryError> {
        let mut accounts = self.accounts.write().unwrap_or_else(|e| e.into_inner());

        if accounts.contains_key(&principal.id) {
            return Err(DirectoryError::Conflict(format!("id {} already registered", principal.id)));
        }
        let email = normalize_email(&principal.email);
        if accounts
            .values()
            .any(|account| normalize_email(&account.principal.email) == email)
        {
            return Err(DirectoryError::Conflict("email already registered".to_string()));
        }

        accounts.insert(
            principal.id,
            Account {
                principal,
                password_hash,
            },
        );
        Ok(())
    }

    /// Flip `is_active`; returns false if the id is unknown
    pub fn set_active(&self, id: i64, active: bool) -> bool {
        self.update(id, |principal| principal.is_active = active)
    }

    /// Change role flags; returns false if the id is unknown
    pub fn set_roles(&self, id: i64, is_staff: bool, is_superuser: bool) -> bool {
        self.update(id, |principal| {
            principal.is_staff = is_staff;
            principal.is_superuser = is_superuser;
        })
    }

    pub fn remove(&self, id: i64) -> Option<Principal> {
        let mut accounts = self.accounts.write().unwrap_or_else(|e| e.into_inner());
        accounts.remove(&id).map(|account| account.principal)
    }

    pub fn len(&self) -> usize {
        self.accounts.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spend one bcrypt verification at `hash_cost` on a miss
    fn burn_dummy_hash(&self, password: &str) {
        let dummy = self
            .dummy_hash
            .get_or_init(|| bcrypt::hash(DUMMY_PASSWORD, self.hash_cost).ok());
        if let Some(hash) = dummy {
            let _ = verify_password(password, hash);
        }
    }

    fn update(&self, id: i64, change: impl FnOnce(&mut Principal)) -> bool {
        let mut accounts = self.accounts.write().unwrap_or_else(|e| e.into_inner());
        match accounts.get_mut(&id) {
            Some(account) => {
                change(&mut account.principal);
                true
            }
            None => false,
        }
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn authenticate(&self, email: &str, password: &str) -> Result<Option<Principal>, DirectoryError> {
        let email = normalize_email(email);
        let candidate = {
            let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
            accounts
                .values()
                .find(|account| normalize_email(&account.principal.email) == email)
                .map(|account| (account.principal.clone(), account.password_hash.clone()))
        };

        let Some((principal, password_hash)) = candidate else {
            self.burn_dummy_hash(password);
            return Ok(None);
        };

        // bcrypt runs outside the lock
        let matches = verify_password(password, &password_hash)
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;

        Ok(matches.then_some(principal))
    }

    fn get_by_id(&self, id: i64) -> Result<Option<Principal>, DirectoryError> {
        let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
        Ok(accounts.get(&id).map(|account| account.principal.clone()))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
