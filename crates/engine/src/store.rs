//! Account persistence seam.
//!
//! The engine sees accounts through the [`AccountStore`] trait: read by
//! email or session token, insert at signup, and whole-collection
//! fingerprint updates. [`RedisAccountStore`] is the single real
//! implementation; [`MemoryAccountStore`] backs tests and local demos.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{EngineError, Result};
use crate::fingerprint::{self, RawEntry};

/// Persisted identity record.
///
/// `fingerprints` is decoded tolerantly: legacy rows where the column is
/// not an array decode to the empty collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub username: String,
    /// Opaque, pre-hashed by the caller
    pub password_hash: String,
    pub session_token: String,
    #[serde(default, deserialize_with = "fingerprint::deserialize_collection")]
    pub fingerprints: Vec<RawEntry>,
}

/// Signup payload, before an id and session token exist.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

/// Account store capability.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;
    async fn find_by_session(&self, token: &str) -> Result<Option<Account>>;
    /// Insert a new account. Fails with [`EngineError::DuplicateEmail`]
    /// when the email is already registered.
    async fn insert(&self, account: Account) -> Result<()>;
    /// Replace the account's whole fingerprint collection in one update.
    async fn update_fingerprints(&self, id: &str, fingerprints: &[RawEntry]) -> Result<()>;
}

fn account_key(id: &str) -> String {
    format!("account:{id}")
}

fn email_key(email: &str) -> String {
    format!("account:email:{email}")
}

fn session_key(token: &str) -> String {
    format!("account:session:{token}")
}

fn store_err(e: redis::RedisError) -> EngineError {
    EngineError::Store(e.to_string())
}

/// Redis-backed account store.
///
/// Layout: the account JSON lives at `account:{id}`, with secondary index
/// keys `account:email:{email}` and `account:session:{token}` holding the
/// id. The read-decide-write sequence across a request is not guarded by
/// any concurrency control: two concurrent attempts for the same account
/// race, and the second fingerprint write wins (documented lost-update
/// anomaly, see DESIGN.md).
#[derive(Clone)]
pub struct RedisAccountStore {
    conn: ConnectionManager,
}

impl RedisAccountStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(store_err)?;
        let conn = client.get_connection_manager().await.map_err(store_err)?;
        Ok(Self { conn })
    }

    async fn load(&self, id: &str) -> Result<Option<Account>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(account_key(id)).await.map_err(store_err)?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn load_by_index(&self, index_key: String) -> Result<Option<Account>> {
        let mut conn = self.conn.clone();
        let id: Option<String> = conn.get(index_key).await.map_err(store_err)?;
        match id {
            Some(id) => self.load(&id).await,
            None => Ok(None),
        }
    }
}

#[async_trait]
impl AccountStore for RedisAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.load_by_index(email_key(email)).await
    }

    async fn find_by_session(&self, token: &str) -> Result<Option<Account>> {
        self.load_by_index(session_key(token)).await
    }

    async fn insert(&self, account: Account) -> Result<()> {
        let mut conn = self.conn.clone();

        // SET NX on the email index doubles as the duplicate check.
        let claimed: bool = conn
            .set_nx(email_key(&account.email), account.id.clone())
            .await
            .map_err(store_err)?;
        if !claimed {
            return Err(EngineError::DuplicateEmail {
                email: account.email,
            });
        }

        let json = serde_json::to_string(&account)?;
        let _: () = conn
            .set(account_key(&account.id), json)
            .await
            .map_err(store_err)?;
        let _: () = conn
            .set(session_key(&account.session_token), account.id.clone())
            .await
            .map_err(store_err)?;

        tracing::info!(account_id = %account.id, "account created");
        Ok(())
    }

    async fn update_fingerprints(&self, id: &str, fingerprints: &[RawEntry]) -> Result<()> {
        let mut account = self
            .load(id)
            .await?
            .ok_or_else(|| EngineError::Store(format!("account not found: {id}")))?;
        account.fingerprints = fingerprints.to_vec();

        let json = serde_json::to_string(&account)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set(account_key(id), json).await.map_err(store_err)?;
        Ok(())
    }
}

/// In-process account store for tests and local demos.
#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: Mutex<HashMap<String, Account>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot an account by id, for test assertions.
    pub fn get(&self, id: &str) -> Option<Account> {
        self.accounts.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let accounts = self.accounts.lock().unwrap();
        Ok(accounts.values().find(|a| a.email == email).cloned())
    }

    async fn find_by_session(&self, token: &str) -> Result<Option<Account>> {
        let accounts = self.accounts.lock().unwrap();
        Ok(accounts.values().find(|a| a.session_token == token).cloned())
    }

    async fn insert(&self, account: Account) -> Result<()> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.values().any(|a| a.email == account.email) {
            return Err(EngineError::DuplicateEmail {
                email: account.email,
            });
        }
        accounts.insert(account.id.clone(), account);
        Ok(())
    }

    async fn update_fingerprints(&self, id: &str, fingerprints: &[RawEntry]) -> Result<()> {
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts
            .get_mut(id)
            .ok_or_else(|| EngineError::Store(format!("account not found: {id}")))?;
        account.fingerprints = fingerprints.to_vec();
        Ok(())
    }
}
