//! Session-facing authentication facade
//!
//! `AuthState` is what a front end holds: authenticated status, key entry,
//! logout, and token retrieval. It owns one `SessionContext` and the
//! `TokenBroker` wired to it.
//!
//! Components that spend the token (content API wrappers and the like) get
//! an [`UnauthorizedHandle`] and report 401 responses through it. The handle
//! holds a weak reference, so a dropped session is never kept alive by its
//! consumers.

use std::sync::{Arc, Weak};

use github_app_auth::CredentialStore;
use tokio::sync::{broadcast, watch};

use crate::broker::{BrokerConfig, TokenBroker};
use crate::error::Result;
use crate::session::{AuthEvent, SessionContext};

#[derive(Debug)]
pub struct AuthState {
    session: Arc<SessionContext>,
    broker: TokenBroker,
}

impl AuthState {
    /// Unloaded state: unauthenticated until [`Self::refresh`] or a key is set.
    pub fn new(store: CredentialStore, config: BrokerConfig, http: reqwest::Client) -> Self {
        let session = Arc::new(SessionContext::new(store));
        let broker = TokenBroker::new(session.clone(), config, http);
        Self { session, broker }
    }

    /// Startup path: restore the stored signing key, then compute status.
    pub fn init(store: CredentialStore, config: BrokerConfig, http: reqwest::Client) -> Self {
        let state = Self::new(store, config, http);
        state.session.load();
        state
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Accept a signing key entered by the user.
    pub fn set_secret(&self, secret: String, persist: bool) {
        self.session.set_secret(secret, persist);
    }

    /// Log out: wipe stored and in-memory credentials.
    pub fn clear(&self) {
        self.session.clear();
    }

    pub fn refresh(&self) -> bool {
        self.session.refresh()
    }

    pub async fn get_token(&self) -> Result<String> {
        self.broker.get_token().await
    }

    /// Watch the authenticated flag.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.session.subscribe()
    }

    /// Advisory events (rate limiting, credential wipes).
    pub fn events(&self) -> broadcast::Receiver<AuthEvent> {
        self.session.events()
    }

    /// A 401 was seen outside the broker.
    pub fn report_unauthorized(&self) {
        self.session.handle_unauthorized();
    }

    pub fn unauthorized_handle(&self) -> UnauthorizedHandle {
        UnauthorizedHandle(Arc::downgrade(&self.session))
    }

    pub fn broker(&self) -> &TokenBroker {
        &self.broker
    }
}

/// Cloneable reporter for 401 responses seen by token consumers.
#[derive(Debug, Clone)]
pub struct UnauthorizedHandle(Weak<SessionContext>);

impl UnauthorizedHandle {
    /// Wipe the session's credentials. No-op once the session is gone.
    pub fn notify(&self) {
        if let Some(session) = self.0.upgrade() {
            session.handle_unauthorized();
        }
    }

    /// Notify when `status` is 401. Returns whether it was.
    pub fn observe(&self, status: reqwest::StatusCode) -> bool {
        let unauthorized = status == reqwest::StatusCode::UNAUTHORIZED;
        if unauthorized {
            self.notify();
        }
        unauthorized
    }
}
