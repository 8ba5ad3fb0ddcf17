//! Session revocation and rate limiting, kept in process since every
//! durable record lives in the hosted database.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::{Duration, Instant},
};

use moka::{Expiry, future::Cache};

/// Upper bound on tracked sessions and rate-limit windows each.
const MAX_ENTRIES: u64 = 100_000;

#[derive(Clone)]
struct Session {
    user_id: String,
    ttl: Duration,
}

struct Window {
    count: AtomicU32,
    ttl: Duration,
}

trait Lifetime {
    fn ttl(&self) -> Duration;
}

impl Lifetime for Session {
    fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl Lifetime for Arc<Window> {
    fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Every entry expires after the lifetime it was created with.
struct EntryLifetime;

impl<V: Lifetime> Expiry<String, V> for EntryLifetime {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &V,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl())
    }
}

pub struct SessionStore {
    sessions: Cache<String, Session>,
    rate_limits: Cache<String, Arc<Window>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_capacity(MAX_ENTRIES)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_entries: u64) -> Self {
        Self {
            sessions: Cache::builder()
                .max_capacity(max_entries)
                .expire_after(EntryLifetime)
                .build(),
            rate_limits: Cache::builder()
                .max_capacity(max_entries)
                .expire_after(EntryLifetime)
                .build(),
        }
    }

    // Session management
    pub async fn store_session(&self, session_id: &str, user_id: &str, ttl_seconds: u64) {
        self.sessions
            .insert(
                session_id.to_string(),
                Session {
                    user_id: user_id.to_string(),
                    ttl: Duration::from_secs(ttl_seconds),
                },
            )
            .await;
    }

    pub async fn get_session(&self, session_id: &str) -> Option<String> {
        self.sessions
            .get(session_id)
            .await
            .map(|session| session.user_id)
    }

    pub async fn delete_session(&self, session_id: &str) {
        self.sessions.invalidate(session_id).await;
    }

    // Rate limiting, one fixed window per key
    pub async fn check_rate_limit(&self, key: &str, limit: u32, window_seconds: u64) -> bool {
        if window_seconds == 0 {
            return true;
        }

        let window = self
            .rate_limits
            .entry(key.to_string())
            .or_insert_with(async {
                Arc::new(Window {
                    count: AtomicU32::new(0),
                    ttl: Duration::from_secs(window_seconds),
                })
            })
            .await
            .into_value();

        window
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                (count < limit).then_some(count + 1)
            })
            .is_ok()
    }
}
