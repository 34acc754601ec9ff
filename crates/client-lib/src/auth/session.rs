// ============================
// quickbite-client-lib/src/auth/session.rs
// ============================
//! Session lifecycle: cold-start restoration, login, logout, token
//! refresh, and the bearer-attaching call interceptor.

use std::future::Future;
use std::sync::Arc;

use metrics::counter;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info, warn};

use super::tokens::{AuthSnapshot, TokenPair};
use crate::error::AppError;
use crate::gateway::ApiGateway;
use crate::metrics as keys;
use crate::storage::CredentialStore;
use crate::validation;
use quickbite_common::{AuthPayload, NewAccount, ProfilePatch, SelectedAddress, UserProfile};

/// Mutable session state. Tokens and user move together through the
/// signed-in/signed-out transitions; `generation` increments on every
/// token rotation so derived components can tell a rotated session from
/// an unchanged one.
#[derive(Default)]
struct SessionState {
    tokens: Option<TokenPair>,
    user: Option<UserProfile>,
    initialized: bool,
    loading: bool,
    generation: u64,
}

/// Owns the authenticated session and the durable credential store.
///
/// All collaborators are injected; the manager performs no I/O of its own
/// beyond what the gateway and store provide.
pub struct SessionManager {
    gateway: Arc<dyn ApiGateway>,
    store: Arc<dyn CredentialStore>,
    state: RwLock<SessionState>,
    /// Serializes refresh exchanges so concurrent 401s produce one rotation
    refresh_lock: Mutex<()>,
    snapshot_tx: watch::Sender<AuthSnapshot>,
}

impl SessionManager {
    pub fn new(gateway: Arc<dyn ApiGateway>, store: Arc<dyn CredentialStore>) -> Self {
        let (snapshot_tx, _) = watch::channel(AuthSnapshot::default());
        Self {
            gateway,
            store,
            state: RwLock::new(SessionState::default()),
            refresh_lock: Mutex::new(()),
            snapshot_tx,
        }
    }

    /// Lifecycle feed for derived components (realtime, location). The
    /// receiver always observes the latest published state.
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub async fn current_user(&self) -> Option<UserProfile> {
        self.state.read().await.user.clone()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.state
            .read()
            .await
            .tokens
            .as_ref()
            .map(|t| t.access.clone())
    }

    pub async fn is_authenticated(&self) -> bool {
        let state = self.state.read().await;
        state.tokens.is_some() && state.user.is_some()
    }

    /// Whether cold-start restoration has completed
    pub async fn is_initialized(&self) -> bool {
        self.state.read().await.initialized
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    /** Rebuild the session from durable storage at cold start.

    Never fails: a rejected access token gets one refresh cycle and one
    profile retry, after which credentials are cleared; connectivity
    problems leave the stored pair alone for the next launch. Every path
    ends with `initialized` set. */
    pub async fn restore(&self) {
        {
            let mut state = self.state.write().await;
            if state.initialized {
                debug!("restore called on an initialized session, ignoring");
                return;
            }
            state.loading = true;
        }

        let stored = match self.store.load_tokens().await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "credential store unreadable during restore");
                None
            },
        };

        let Some(pair) = stored else {
            debug!("no stored credentials, starting signed out");
            self.finish_signed_out().await;
            return;
        };

        match self.gateway.me(&pair.access).await {
            Ok(user) => {
                info!(user_id = %user.id, "session restored from storage");
                counter!(keys::SESSION_RESTORED).increment(1);
                self.finish_signed_in(pair, user).await;
            },
            Err(e) if e.is_unauthorized() => {
                debug!("stored access token rejected, attempting refresh");
                match self.refresh_pair(&pair).await {
                    Ok(new_pair) => match self.gateway.me(&new_pair.access).await {
                        Ok(user) => {
                            info!(user_id = %user.id, "session restored after token refresh");
                            counter!(keys::SESSION_RESTORED).increment(1);
                            counter!(keys::TOKEN_REFRESH).increment(1);
                            self.finish_signed_in(new_pair, user).await;
                        },
                        Err(e) => {
                            warn!(error = %e, "profile fetch failed after refresh, clearing credentials");
                            self.clear_stored_and_finish().await;
                        },
                    },
                    Err(e) => {
                        warn!(error = %e, "token refresh failed during restore, clearing credentials");
                        counter!(keys::TOKEN_REFRESH_FAILED).increment(1);
                        self.clear_stored_and_finish().await;
                    },
                }
            },
            Err(e) => {
                // Server unreachable or erroring; keep the stored pair for
                // the next launch and start signed out
                warn!(error = %e, "could not validate stored session, starting signed out");
                self.finish_signed_out().await;
            },
        }
    }

    /// Exchange credentials for a session. On success the pair is
    /// persisted and the profile published; on failure state is left
    /// untouched so the caller can retry.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, AppError> {
        validation::validate_email(email)?;
        let payload = self.gateway.login(email, password).await?;
        let user = self.commit_signin(payload).await?;
        counter!(keys::SESSION_LOGIN).increment(1);
        info!(user_id = %user.id, role = ?user.role, "signed in");
        Ok(user)
    }

    /// Create an account and sign in with the returned pair
    pub async fn register(&self, account: &NewAccount) -> Result<UserProfile, AppError> {
        validation::validate_name(&account.name)?;
        validation::validate_email(&account.email)?;
        validation::validate_password(&account.password)?;
        let payload = self.gateway.register(account).await?;
        let user = self.commit_signin(payload).await?;
        info!(user_id = %user.id, "account registered");
        Ok(user)
    }

    /// Ask the server to send a password-reset email
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AppError> {
        validation::validate_email(email)?;
        self.gateway.request_password_reset(email).await
    }

    /// Sign out. Server-side invalidation is best-effort; local state and
    /// durable storage are always cleared.
    pub async fn logout(&self) {
        let refresh_token = {
            let state = self.state.read().await;
            state.tokens.as_ref().map(|t| t.refresh.clone())
        };

        if let Some(token) = refresh_token {
            if let Err(e) = self.gateway.invalidate(&token).await {
                warn!(error = %e, "server-side logout failed, clearing locally anyway");
            }
        }

        if let Err(e) = self.store.clear_tokens().await {
            warn!(error = %e, "failed to clear stored credentials");
        }

        let mut state = self.state.write().await;
        state.tokens = None;
        state.user = None;
        state.loading = false;
        state.initialized = true;
        self.publish(&state);
        counter!(keys::SESSION_LOGOUT).increment(1);
        info!("signed out");
    }

    /** Exchange the refresh token for a fresh pair.

    Single-flight: concurrent callers serialize on the refresh lock, and a
    caller that acquires it after another caller already rotated the pair
    returns success without a second network exchange. An unrecoverable
    failure signs the session out and propagates the error. */
    pub async fn refresh(&self) -> Result<(), AppError> {
        let entry_generation = self.state.read().await.generation;
        let _guard = self.refresh_lock.lock().await;

        let pair = {
            let state = self.state.read().await;
            if state.generation != entry_generation {
                debug!("token pair already rotated by a concurrent caller");
                return Ok(());
            }
            match &state.tokens {
                Some(pair) => pair.clone(),
                None => return Err(AppError::NotAuthenticated),
            }
        };

        match self.refresh_pair(&pair).await {
            Ok(new_pair) => {
                let mut state = self.state.write().await;
                state.tokens = Some(new_pair);
                state.generation += 1;
                self.publish(&state);
                counter!(keys::TOKEN_REFRESH).increment(1);
                info!("token pair rotated");
                Ok(())
            },
            Err(e) => {
                warn!(error = %e, "token refresh failed, signing out");
                counter!(keys::TOKEN_REFRESH_FAILED).increment(1);
                drop(_guard);
                self.logout().await;
                Err(e)
            },
        }
    }

    /** Run an API call with the current bearer token attached.

    If the call fails with the authorization-failure status, refresh once
    and re-issue the call exactly once with the rotated token; the retry
    cannot loop. When the refresh itself fails, the session is signed out
    and the **original** error propagates to the caller. */
    pub async fn with_auth<T, F, Fut>(&self, op: F) -> Result<T, AppError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let Some(token) = self.access_token().await else {
            return Err(AppError::NotAuthenticated);
        };

        let original = match op(token).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_unauthorized() => e,
            Err(e) => return Err(e),
        };

        if let Err(refresh_err) = self.refresh().await {
            debug!(error = %refresh_err, "refresh failed during retry, propagating original error");
            return Err(original);
        }

        let Some(token) = self.access_token().await else {
            return Err(original);
        };
        op(token).await
    }

    /// Re-fetch the profile through the interceptor and publish it
    pub async fn fetch_profile(&self) -> Result<UserProfile, AppError> {
        let gateway = Arc::clone(&self.gateway);
        let user = self
            .with_auth(|token| {
                let gateway = Arc::clone(&gateway);
                async move { gateway.me(&token).await }
            })
            .await?;

        let mut state = self.state.write().await;
        state.user = Some(user.clone());
        self.publish(&state);
        Ok(user)
    }

    /// Apply a partial profile update and publish the server's view
    pub async fn update_profile(&self, patch: &ProfilePatch) -> Result<UserProfile, AppError> {
        if let Some(name) = &patch.name {
            validation::validate_name(name)?;
        }

        let gateway = Arc::clone(&self.gateway);
        let user = self
            .with_auth(|token| {
                let gateway = Arc::clone(&gateway);
                let patch = patch.clone();
                async move { gateway.update_profile(&token, &patch).await }
            })
            .await?;

        let mut state = self.state.write().await;
        state.user = Some(user.clone());
        self.publish(&state);
        Ok(user)
    }

    pub async fn selected_address(&self) -> Result<Option<SelectedAddress>, AppError> {
        self.store.load_selected_address().await
    }

    pub async fn set_selected_address(&self, address: &SelectedAddress) -> Result<(), AppError> {
        self.store.store_selected_address(address).await
    }

    pub async fn clear_selected_address(&self) -> Result<(), AppError> {
        self.store.clear_selected_address().await
    }

    /// Exchange and persist, without touching in-memory state. Restore
    /// commits only after the profile retry succeeds.
    async fn refresh_pair(&self, pair: &TokenPair) -> Result<TokenPair, AppError> {
        let payload = self.gateway.refresh(&pair.refresh).await?;
        let new_pair = TokenPair::new(payload.access_token, payload.refresh_token);
        self.store.store_tokens(&new_pair).await?;
        Ok(new_pair)
    }

    async fn commit_signin(&self, payload: AuthPayload) -> Result<UserProfile, AppError> {
        let AuthPayload {
            access_token,
            refresh_token,
            user,
        } = payload;
        let pair = TokenPair::new(access_token, refresh_token);

        let user = match user {
            Some(user) => user,
            None => self.gateway.me(&pair.access).await?,
        };

        self.store.store_tokens(&pair).await?;

        let mut state = self.state.write().await;
        state.tokens = Some(pair);
        state.user = Some(user.clone());
        state.generation += 1;
        state.loading = false;
        state.initialized = true;
        self.publish(&state);
        Ok(user)
    }

    async fn finish_signed_in(&self, pair: TokenPair, user: UserProfile) {
        let mut state = self.state.write().await;
        state.tokens = Some(pair);
        state.user = Some(user);
        state.generation += 1;
        state.loading = false;
        state.initialized = true;
        self.publish(&state);
    }

    async fn finish_signed_out(&self) {
        let mut state = self.state.write().await;
        state.tokens = None;
        state.user = None;
        state.loading = false;
        state.initialized = true;
        self.publish(&state);
    }

    async fn clear_stored_and_finish(&self) {
        if let Err(e) = self.store.clear_tokens().await {
            warn!(error = %e, "failed to clear stored credentials");
        }
        self.finish_signed_out().await;
    }

    fn publish(&self, state: &SessionState) {
        self.snapshot_tx.send_replace(AuthSnapshot {
            user: state.user.clone(),
            access_token: state.tokens.as_ref().map(|t| t.access.clone()),
            generation: state.generation,
        });
    }
}
