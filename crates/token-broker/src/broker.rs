//! Installation token broker
//!
//! `get_token()` state machine:
//! 1. CheckCache: a cached token is returned as is, no signing, no network
//! 2. NeedSecret: signing key from memory or store, else `NotAuthenticated`
//! 3. SignJWT: RS256 App assertion
//! 4. LookupInstallation: `GET /repos/{owner}/{repo}/installation`
//! 5. CreateToken: `POST /app/installations/{id}/access_tokens`
//! 6. CacheAndReturn: store the token, refresh status
//!
//! Nothing retries automatically. A caller that gets a retryable error calls
//! again and the exchange restarts at step 2 with the key still held.
//!
//! Cache misses are coalesced: the first miss starts the exchange as a
//! `Shared` future in a one-slot cache, later misses await the same future,
//! and every caller sees the same outcome. The slot is tagged with a
//! generation number so a finished exchange never evicts its successor.
//!
//! The slot also records the session epoch its exchange started in. After
//! a logout or a 401 wipe, a stale slot is discarded instead of joined, and
//! an exchange that finishes after a wipe returns `NotAuthenticated`
//! without caching its token.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::metrics;
use crate::session::{AuthEvent, ExchangeStep, SessionContext};

/// Static exchange parameters.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// GitHub App id, used as the JWT issuer
    pub app_id: String,
    /// Repository owner the installation is resolved for
    pub owner: String,
    /// Repository name the installation is resolved for
    pub repo: String,
    /// REST API base URL
    pub api_base: String,
}

impl BrokerConfig {
    pub fn new(app_id: impl Into<String>, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            owner: owner.into(),
            repo: repo.into(),
            api_base: github_app_auth::GITHUB_API_URL.to_owned(),
        }
    }

    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

type Exchange = Shared<BoxFuture<'static, Result<String>>>;

struct InFlight {
    generation: u64,
    epoch: u64,
    exchange: Exchange,
}

enum Lookup {
    Cached(String),
    Exchange(u64, Exchange),
}

/// Hands out installation tokens, exchanging the App key when needed.
pub struct TokenBroker {
    exchanger: Arc<Exchanger>,
    in_flight: Mutex<Option<InFlight>>,
    generation: AtomicU64,
}

impl TokenBroker {
    /// `http` carries any timeouts; the broker adds none of its own.
    pub fn new(session: Arc<SessionContext>, config: BrokerConfig, http: reqwest::Client) -> Self {
        Self {
            exchanger: Arc::new(Exchanger {
                session,
                config,
                http,
            }),
            in_flight: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.exchanger.session
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.exchanger.config
    }

    /// Cached token, or a freshly exchanged one.
    pub async fn get_token(&self) -> Result<String> {
        if let Some(token) = self.exchanger.session.store().token() {
            debug!("serving cached installation token");
            metrics::record_token_request("cache");
            return Ok(token);
        }

        let (generation, exchange) = match self.join_or_start() {
            Lookup::Cached(token) => return Ok(token),
            Lookup::Exchange(generation, exchange) => (generation, exchange),
        };
        let result = exchange.await;
        self.finish(generation);
        result
    }

    fn join_or_start(&self) -> Lookup {
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);

        // An exchange may have cached its token and left the slot since the
        // unlocked check above
        if let Some(token) = self.exchanger.session.store().token() {
            debug!("serving installation token cached by a concurrent exchange");
            metrics::record_token_request("cache");
            return Lookup::Cached(token);
        }

        let epoch = self.exchanger.session.epoch();
        match slot.as_ref() {
            Some(current) if current.epoch == epoch => {
                debug!(generation = current.generation, "joining in-flight token exchange");
                metrics::record_token_request("coalesced");
                return Lookup::Exchange(current.generation, current.exchange.clone());
            }
            Some(stale) => {
                debug!(generation = stale.generation, "discarding exchange started before a wipe");
            }
            None => {}
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        debug!(generation, epoch, "starting token exchange");
        metrics::record_token_request("exchange");

        let exchange = self.exchanger.clone().run(epoch).boxed().shared();
        *slot = Some(InFlight {
            generation,
            epoch,
            exchange: exchange.clone(),
        });
        Lookup::Exchange(generation, exchange)
    }

    fn finish(&self, generation: u64) {
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if slot
            .as_ref()
            .is_some_and(|current| current.generation == generation)
        {
            *slot = None;
        }
    }
}

impl std::fmt::Debug for TokenBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBroker")
            .field("config", &self.exchanger.config)
            .finish_non_exhaustive()
    }
}

/// Everything one exchange needs, shareable into a `'static` future.
struct Exchanger {
    session: Arc<SessionContext>,
    config: BrokerConfig,
    http: reqwest::Client,
}

impl Exchanger {
    async fn run(self: Arc<Self>, epoch: u64) -> Result<String> {
        let jwt = {
            let Some(secret) = self.session.secret() else {
                metrics::record_exchange_failure("not_authenticated");
                return Err(Error::NotAuthenticated);
            };
            github_app_auth::sign_app_jwt(&self.config.app_id, secret.expose())
                .map_err(|e| self.fail(e, None))?
        };

        let installation_id = github_app_auth::installation_id(
            &self.http,
            &self.config.api_base,
            &jwt,
            &self.config.owner,
            &self.config.repo,
        )
        .await
        .map_err(|e| self.fail(e, Some(ExchangeStep::InstallationLookup)))?;

        let token = github_app_auth::create_installation_token(
            &self.http,
            &self.config.api_base,
            &jwt,
            installation_id,
        )
        .await
        .map_err(|e| self.fail(e, Some(ExchangeStep::CreateToken)))?;

        if !self.session.commit_token(epoch, &token) {
            metrics::record_exchange_failure("wiped");
            warn!("session was wiped during the token exchange, discarding token");
            return Err(Error::NotAuthenticated);
        }
        info!(
            owner = %self.config.owner,
            repo = %self.config.repo,
            installation_id,
            "installation token issued"
        );
        Ok(token)
    }

    /// Apply side effects of a failed step and wrap the error.
    fn fail(&self, err: github_app_auth::Error, step: Option<ExchangeStep>) -> Error {
        if err.is_unauthorized() {
            metrics::record_exchange_failure("unauthorized");
            self.session.handle_unauthorized();
        } else if err.is_rate_limited() {
            metrics::record_exchange_failure("rate_limited");
            warn!(?step, "GitHub is rate limiting the token exchange (422), slow down");
            if let Some(step) = step {
                self.session.emit(AuthEvent::RateLimited { step });
            }
        } else {
            let reason = match &err {
                github_app_auth::Error::Signing(_) => "signing",
                github_app_auth::Error::InstallationLookup { .. } => "installation_lookup",
                github_app_auth::Error::AccessToken { .. } => "access_token",
                _ => "other",
            };
            metrics::record_exchange_failure(reason);
            warn!(?step, error = %err, "token exchange failed");
        }
        Error::Auth(err)
    }
}
