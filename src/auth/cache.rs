//! Credential cache with single-flight prompt serialization.
//!
//! One mutex guards both the key→credential map and the in-flight set: a
//! `put` must be visible to a waiter that is about to re-check the cache
//! after being woken. The condition variable implements the "one prompt,
//! then broadcast" sequence — of all callers racing on a protection-space
//! key, exactly one is told to prompt while the rest block and re-check.

use crate::auth::credential::Credential;
use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex, MutexGuard};

#[derive(Default)]
struct StoreInner {
    entries: HashMap<String, Vec<Credential>>,
    in_flight: HashSet<String>,
}

/// Process-shareable credential cache. Clone-free: share via `Arc`.
pub struct CredentialStore {
    inner: Mutex<StoreInner>,
    cond: Condvar,
    serialize: bool,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore {
    /// A store that serializes interactive prompts per key.
    pub fn new() -> Self {
        Self::with_serialization(true)
    }

    /// `serialize = false` disables single-flight coordination entirely;
    /// [`CredentialStore::acquire_or_wait`] degrades to a plain get.
    pub fn with_serialization(serialize: bool) -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            cond: Condvar::new(),
            serialize,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pure cache read. With a `request_path`, a stored credential matches
    /// when its path is a prefix of it — narrower stored paths still answer
    /// wider requests under the same root. Without one (post-challenge
    /// lookups, where the realm-qualified key is already exact), any entry
    /// under the key answers.
    pub fn get(&self, key: &str, request_path: Option<&str>) -> Option<Credential> {
        lookup(&self.lock(), key, request_path)
    }

    /// Insert under the realm-qualified key and, when the scheme supports
    /// preemptive authorization, under the realm-less location key as well.
    /// An existing entry with the same path is replaced.
    pub fn put(&self, credential: &Credential) {
        let space = credential.space();
        let mut inner = self.lock();
        insert(&mut inner, space.cache_key(true), credential);
        if credential.supports_preemptive() {
            insert(&mut inner, space.location_key(), credential);
        }
        tracing::debug!(
            host = %space.host,
            realm = space.realm.as_deref().unwrap_or(""),
            scheme = space.scheme.as_str(),
            "cached credential"
        );
    }

    /// Remove entries under `key`: all of them, or with a credential given,
    /// only those sharing its path (several credentials may coexist under
    /// one fuzzy-matching key for different paths).
    pub fn remove(&self, key: &str, credential: Option<&Credential>) {
        let mut inner = self.lock();
        match credential {
            None => {
                inner.entries.remove(key);
            }
            Some(cred) => {
                if let Some(list) = inner.entries.get_mut(key) {
                    list.retain(|e| e.path() != cred.path());
                    if list.is_empty() {
                        inner.entries.remove(key);
                    }
                }
            }
        }
    }

    /// Remove a credential from both of its key renderings.
    pub fn remove_credential(&self, credential: &Credential) {
        let space = credential.space();
        self.remove(&space.cache_key(true), Some(credential));
        self.remove(&space.location_key(), Some(credential));
    }

    /// The single-flight primitive.
    ///
    /// Returns a credential when the cache already answers. Otherwise, the
    /// first caller for `key` claims the in-flight slot and gets `None` — it
    /// must perform the interactive acquisition and eventually call
    /// [`CredentialStore::release`] (use [`CredentialStore::release_guard`]
    /// so an abandoned prompt cannot starve the waiters). Any other caller
    /// blocks until the claim is released, then re-checks the cache; waking
    /// without re-checking is not possible by construction.
    pub fn acquire_or_wait(&self, key: &str, request_path: Option<&str>) -> Option<Credential> {
        let mut inner = self.lock();
        loop {
            if let Some(found) = lookup(&inner, key, request_path) {
                return Some(found);
            }
            if !self.serialize {
                return None;
            }
            if !inner.in_flight.contains(key) {
                inner.in_flight.insert(key.to_string());
                tracing::debug!(key, "claimed in-flight credential acquisition");
                return None;
            }
            tracing::debug!(key, "waiting on in-flight credential acquisition");
            inner = self
                .cond
                .wait(inner)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Unblock waiters for `key`. Called exactly once by whichever caller
    /// won the in-flight claim, whether or not acquisition succeeded. Safe
    /// to call for a key that was never claimed.
    pub fn release(&self, key: &str) {
        let mut inner = self.lock();
        if inner.in_flight.remove(key) {
            tracing::debug!(key, "released in-flight credential acquisition");
        }
        drop(inner);
        self.cond.notify_all();
    }

    /// Scope guard releasing the in-flight claim on drop.
    pub fn release_guard<'a>(&'a self, key: &str) -> ReleaseGuard<'a> {
        ReleaseGuard {
            store: self,
            key: key.to_string(),
        }
    }

    /// Number of distinct cache keys.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Drop every cached credential.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }
}

/// Releases an in-flight claim when dropped, so a panicking or abandoned
/// prompt still unblocks the waiters.
pub struct ReleaseGuard<'a> {
    store: &'a CredentialStore,
    key: String,
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        self.store.release(&self.key);
    }
}

fn lookup(inner: &StoreInner, key: &str, request_path: Option<&str>) -> Option<Credential> {
    inner
        .entries
        .get(key)?
        .iter()
        .find(|e| match request_path {
            Some(p) => p.starts_with(e.path()),
            None => true,
        })
        .cloned()
}

fn insert(inner: &mut StoreInner, key: String, credential: &Credential) {
    let list = inner.entries.entry(key).or_default();
    if let Some(existing) = list.iter_mut().find(|e| e.path() == credential.path()) {
        *existing = credential.clone();
    } else {
        list.push(credential.clone());
    }
}
