//! Session context: in-memory signing key, authenticated status, events
//!
//! One `SessionContext` is built per session and shared (via `Arc`) by the
//! broker and the `AuthState` facade. Status changes are published on a
//! `watch` channel; advisories (rate limiting, credential wipes) on a
//! `broadcast` channel.
//!
//! Locks are `std::sync` and never held across an await. Concurrent writers
//! follow last-writer-wins; every successful exchange yields an equally
//! valid token.
//!
//! Every wipe bumps the session epoch. An exchange records the epoch it
//! started in and may only cache its token if no wipe happened since.

use std::sync::{Mutex, PoisonError, RwLock};

use common::Secret;
use github_app_auth::CredentialStore;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Exchange step named in advisories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeStep {
    InstallationLookup,
    CreateToken,
}

/// Advisory events for interested consumers (UI, CLI, logs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// GitHub answered 422: the client is calling too fast. The exchange
    /// still failed and may be retried later.
    RateLimited { step: ExchangeStep },
    /// A 401 was observed and all credentials were wiped.
    Unauthorized,
}

const EVENT_CAPACITY: usize = 16;

pub struct SessionContext {
    store: CredentialStore,
    secret: RwLock<Option<Secret<String>>>,
    epoch: Mutex<u64>,
    status: watch::Sender<bool>,
    events: broadcast::Sender<AuthEvent>,
}

impl SessionContext {
    /// Fresh, unauthenticated session over `store`. Call [`Self::load`] to
    /// restore a previous session's state.
    pub fn new(store: CredentialStore) -> Self {
        let (status, _) = watch::channel(false);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            secret: RwLock::new(None),
            epoch: Mutex::new(0),
            status,
            events,
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Restore the signing key from the store, then recompute status.
    pub fn load(&self) -> bool {
        if let Some(secret) = self.store.secret() {
            debug!("restored signing key from session storage");
            *self.secret.write().unwrap_or_else(PoisonError::into_inner) = Some(secret);
        }
        self.refresh()
    }

    /// Signing key from memory, falling back to the store. A key found in
    /// the store is kept in memory for later calls.
    pub fn secret(&self) -> Option<Secret<String>> {
        if let Some(secret) = self
            .secret
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Some(secret.clone());
        }

        let restored = self.store.secret()?;
        *self.secret.write().unwrap_or_else(PoisonError::into_inner) = Some(restored.clone());
        Some(restored)
    }

    /// Hold `secret` in memory and mark the session authenticated. With
    /// `persist`, also cache it encrypted in the store.
    pub fn set_secret(&self, secret: String, persist: bool) {
        if persist {
            self.store.save_secret(&secret);
        }
        *self.secret.write().unwrap_or_else(PoisonError::into_inner) = Some(Secret::new(secret));
        self.publish(true);
        info!(persisted = persist, "signing key set");
    }

    /// Wipe the store and the in-memory key.
    pub fn clear(&self) {
        {
            let mut epoch = self.epoch.lock().unwrap_or_else(PoisonError::into_inner);
            *epoch += 1;
            self.store.clear_all();
            self.secret
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
        }
        self.publish(false);
        info!("session credentials cleared");
    }

    /// Number of wipes so far.
    pub fn epoch(&self) -> u64 {
        *self.epoch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cache `token` and refresh status, unless the session was wiped after
    /// `epoch`. Returns whether the token was stored.
    pub(crate) fn commit_token(&self, epoch: u64, token: &str) -> bool {
        {
            let current = self.epoch.lock().unwrap_or_else(PoisonError::into_inner);
            if *current != epoch {
                return false;
            }
            self.store.save_token(token);
        }
        self.refresh();
        true
    }

    /// Recompute status: a key in memory or a usable credential in the store.
    pub fn refresh(&self) -> bool {
        let in_memory = self
            .secret
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        let authenticated = in_memory || self.store.has_credential();
        self.publish(authenticated);
        authenticated
    }

    /// Wipe credentials in response to a 401 and announce it.
    pub fn handle_unauthorized(&self) {
        warn!("GitHub rejected credentials (401), wiping session");
        crate::metrics::record_credential_wipe();
        self.clear();
        self.emit(AuthEvent::Unauthorized);
    }

    pub fn is_authenticated(&self) -> bool {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.status.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: AuthEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn publish(&self, authenticated: bool) {
        self.status.send_if_modified(|current| {
            if *current == authenticated {
                return false;
            }
            *current = authenticated;
            true
        });
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("authenticated", &self.is_authenticated())
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
