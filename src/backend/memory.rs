//! In-process stand-ins for the hosted services, used for local runs with
//! `BACKEND=memory` and by the test suite.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, RwLock},
    time::{Duration, Instant},
};

use futures::{
    StreamExt,
    future::BoxFuture,
    stream::{self},
};
use serde_json::{Map, Value};
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use super::{
    BackendError, BackendResult, Identity, IdentityProvider, MediaHost, Query, RealtimeDatabase,
    SnapshotStream, paths_overlap, segments, tree,
};

const MAX_FAILED_SIGN_INS: u32 = 5;
const DEFAULT_LOCKOUT: Duration = Duration::from_secs(15 * 60);

struct DatabaseInner {
    root: RwLock<Value>,
    changes: broadcast::Sender<Vec<String>>,
}

impl DatabaseInner {
    fn read(&self, path: &[String]) -> Option<Value> {
        let root = self.root.read().unwrap_or_else(|p| p.into_inner());
        tree::read(&root, path)
    }

    fn notify(&self, path: Vec<String>) {
        // No receivers is fine: nobody is subscribed.
        let _ = self.changes.send(path);
    }
}

#[derive(Clone)]
pub struct MemoryDatabase {
    inner: Arc<DatabaseInner>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(DatabaseInner {
                root: RwLock::new(Value::Null),
                changes,
            }),
        }
    }

    /// Seeds the tree, e.g. from a JSON export of the hosted database.
    pub fn with_data(data: Value) -> Self {
        let database = Self::new();
        tree::write(
            &mut database
                .inner
                .root
                .write()
                .unwrap_or_else(|p| p.into_inner()),
            &[],
            data,
        );
        database
    }

    fn write_with<F>(&self, path: &str, apply: F) -> BackendResult<()>
    where
        F: FnOnce(&mut Value, &[String]) -> BackendResult<()>,
    {
        let path = segments(path)?;
        {
            let mut root = self.inner.root.write().unwrap_or_else(|p| p.into_inner());
            apply(&mut *root, &path[..])?;
        }
        self.inner.notify(path);
        Ok(())
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeDatabase for MemoryDatabase {
    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, BackendResult<Option<Value>>> {
        Box::pin(async move { Ok(self.inner.read(&segments(path)?)) })
    }

    fn set<'a>(&'a self, path: &'a str, value: Value) -> BoxFuture<'a, BackendResult<()>> {
        Box::pin(async move {
            self.write_with(path, |root, path| {
                tree::write(root, path, value);
                Ok(())
            })
        })
    }

    fn update<'a>(
        &'a self,
        path: &'a str,
        fields: Map<String, Value>,
    ) -> BoxFuture<'a, BackendResult<()>> {
        Box::pin(async move { self.write_with(path, |root, path| tree::merge(root, path, fields)) })
    }

    fn remove<'a>(&'a self, path: &'a str) -> BoxFuture<'a, BackendResult<()>> {
        self.set(path, Value::Null)
    }

    fn query<'a>(
        &'a self,
        path: &'a str,
        query: &'a Query,
    ) -> BoxFuture<'a, BackendResult<Vec<(String, Value)>>> {
        Box::pin(async move {
            let node = self.inner.read(&segments(path)?);
            Ok(tree::apply_query(node, query))
        })
    }

    fn subscribe(&self, path: &str) -> SnapshotStream {
        let watched = match segments(path) {
            Ok(watched) => watched,
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };

        // Subscribe before the first read so no change slips in between.
        let receiver = self.inner.changes.subscribe();
        let initial = self.inner.read(&watched);
        let inner = Arc::clone(&self.inner);

        let changes = stream::unfold(
            (inner, receiver, watched),
            |(inner, mut receiver, watched)| async move {
                loop {
                    match receiver.recv().await {
                        Ok(changed) if paths_overlap(&watched, &changed) => break,
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!("Snapshot subscriber lagged by {} changes", skipped);
                            break;
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }
                let snapshot = inner.read(&watched);
                Some((Ok(snapshot), (inner, receiver, watched)))
            },
        );

        stream::once(async move { Ok(initial) })
            .chain(changes)
            .boxed()
    }
}

struct Account {
    uid: String,
    password_hash: String,
    failed_attempts: u32,
    locked_until: Option<Instant>,
}

/// Email/password accounts with bcrypt hashed passwords.
pub struct MemoryIdentity {
    accounts: Mutex<HashMap<String, Account>>,
    reset_requests: Mutex<Vec<String>>,
    hash_cost: u32,
    lockout: Duration,
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self::with_hash_cost(bcrypt::DEFAULT_COST)
    }

    pub fn with_hash_cost(hash_cost: u32) -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            reset_requests: Mutex::new(Vec::new()),
            hash_cost,
            lockout: DEFAULT_LOCKOUT,
        }
    }

    /// How long an account stays locked after too many failed sign-ins.
    pub fn with_lockout(mut self, lockout: Duration) -> Self {
        self.lockout = lockout;
        self
    }

    /// Emails a password reset was requested for, oldest first.
    pub fn reset_requests(&self) -> Vec<String> {
        self.reset_requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl Default for MemoryIdentity {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn provider_error(error: impl std::fmt::Display) -> BackendError {
    BackendError::Provider(error.to_string())
}

// bcrypt is CPU bound, keep it off the async workers
async fn hash_password(password: &str, cost: u32) -> BackendResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(provider_error)?
        .map_err(provider_error)
}

async fn verify_password(password: &str, hash: String) -> BackendResult<bool> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(provider_error)?
        .map_err(provider_error)
}

impl IdentityProvider for MemoryIdentity {
    fn sign_up<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, BackendResult<Identity>> {
        Box::pin(async move {
            if password.chars().count() < 6 {
                return Err(BackendError::WeakPassword);
            }
            let key = normalize_email(email);
            if self
                .accounts
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .contains_key(&key)
            {
                return Err(BackendError::EmailExists);
            }

            let password_hash = hash_password(password, self.hash_cost).await?;
            let uid = Uuid::new_v4().simple().to_string();

            let mut accounts = self.accounts.lock().unwrap_or_else(|p| p.into_inner());
            if accounts.contains_key(&key) {
                return Err(BackendError::EmailExists);
            }
            accounts.insert(
                key.clone(),
                Account {
                    uid: uid.clone(),
                    password_hash,
                    failed_attempts: 0,
                    locked_until: None,
                },
            );

            Ok(Identity {
                uid,
                email: key,
                id_token: None,
            })
        })
    }

    fn sign_in<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, BackendResult<Identity>> {
        Box::pin(async move {
            let key = normalize_email(email);
            let password_hash = {
                let mut accounts = self.accounts.lock().unwrap_or_else(|p| p.into_inner());
                let account = accounts
                    .get_mut(&key)
                    .ok_or(BackendError::InvalidCredentials)?;

                match account.locked_until {
                    Some(until) if until > Instant::now() => {
                        return Err(BackendError::TooManyAttempts);
                    }
                    Some(_) => {
                        account.locked_until = None;
                        account.failed_attempts = 0;
                    }
                    None => {}
                }
                account.password_hash.clone()
            };

            let valid = verify_password(password, password_hash).await?;

            let mut accounts = self.accounts.lock().unwrap_or_else(|p| p.into_inner());
            let account = accounts
                .get_mut(&key)
                .ok_or(BackendError::InvalidCredentials)?;
            if !valid {
                account.failed_attempts += 1;
                if account.failed_attempts >= MAX_FAILED_SIGN_INS {
                    account.locked_until = Some(Instant::now() + self.lockout);
                }
                return Err(BackendError::InvalidCredentials);
            }

            account.failed_attempts = 0;
            Ok(Identity {
                uid: account.uid.clone(),
                email: key,
                id_token: None,
            })
        })
    }

    fn send_password_reset<'a>(&'a self, email: &'a str) -> BoxFuture<'a, BackendResult<()>> {
        Box::pin(async move {
            let key = normalize_email(email);
            if !self
                .accounts
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .contains_key(&key)
            {
                return Err(BackendError::UserNotFound);
            }
            self.reset_requests
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .push(key);
            Ok(())
        })
    }
}

#[derive(Debug, Clone)]
pub struct StoredImage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub struct MemoryMedia {
    base_url: String,
    images: Mutex<HashMap<String, StoredImage>>,
}

impl MemoryMedia {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            images: Mutex::new(HashMap::new()),
        }
    }

    pub fn image(&self, url: &str) -> Option<StoredImage> {
        self.images
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(url)
            .cloned()
    }
}

impl MediaHost for MemoryMedia {
    fn upload_image<'a>(
        &'a self,
        file_name: &'a str,
        content_type: &'a str,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, BackendResult<String>> {
        Box::pin(async move {
            if bytes.is_empty() {
                return Err(BackendError::Upload("empty file".to_string()));
            }
            let url = format!(
                "{}/{}-{}",
                self.base_url.trim_end_matches('/'),
                Uuid::new_v4().simple(),
                file_name
            );
            self.images.lock().unwrap_or_else(|p| p.into_inner()).insert(
                url.clone(),
                StoredImage {
                    file_name: file_name.to_string(),
                    content_type: content_type.to_string(),
                    bytes,
                },
            );
            Ok(url)
        })
    }
}
