// ============================================================================
// crates/client-lib/src/location/tracker.rs
// ============================================================================

//! Device location tracking.
//!
//! [`LocationTracker`] sits between the position provider and the rest
//! of the client. It caches the permission answer and the last fix,
//! bounds one-shot fixes with a timeout, and while watching uploads each
//! sample through the session so couriers stay visible server-side.
//! Upload failures are logged and skipped; tracking never stops because
//! the network blinked.

use std::sync::Arc;

use metrics::counter;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};

use quickbite_common::LocationSample;

use super::provider::{PositionProvider, PositionStream, WatchConfig};
use crate::auth::{AuthSnapshot, SessionManager};
use crate::config::LocationSettings;
use crate::error::AppError;
use crate::gateway::ApiGateway;
use crate::metrics::{LOCATION_SAMPLE, LOCATION_UPLOADED, LOCATION_UPLOAD_FAILED};

pub struct LocationTracker {
    provider: Arc<dyn PositionProvider>,
    session: Arc<SessionManager>,
    gateway: Arc<dyn ApiGateway>,
    config: LocationSettings,
    permission: tokio::sync::Mutex<Option<bool>>,
    last_fix: Arc<parking_lot::Mutex<Option<LocationSample>>>,
    watcher: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl LocationTracker {
    pub fn new(
        provider: Arc<dyn PositionProvider>,
        session: Arc<SessionManager>,
        gateway: Arc<dyn ApiGateway>,
        config: LocationSettings,
    ) -> Self {
        Self {
            provider,
            session,
            gateway,
            config,
            permission: tokio::sync::Mutex::new(None),
            last_fix: Arc::new(parking_lot::Mutex::new(None)),
            watcher: parking_lot::Mutex::new(None),
        }
    }

    /// Ask for location permission, prompting the platform at most once.
    /// Both grants and refusals are cached; a provider error is not, so
    /// the next call asks again.
    pub async fn request_permission(&self) -> Result<bool, AppError> {
        let mut cached = self.permission.lock().await;
        if let Some(granted) = *cached {
            return Ok(granted);
        }
        let granted = self.provider.request_permission().await?;
        *cached = Some(granted);
        Ok(granted)
    }

    /// Last sample seen, from either a one-shot fix or the watch stream
    #[must_use]
    pub fn last_fix(&self) -> Option<LocationSample> {
        self.last_fix.lock().clone()
    }

    /**
    Returns the device position.

    With `force_refresh` unset a cached fix is returned when one exists;
    otherwise the provider is asked for a fresh fix, bounded by the
    configured acquisition timeout. Concurrent callers each get their
    own fix; requests are not coalesced.
    */
    pub async fn current_location(&self, force_refresh: bool) -> Result<LocationSample, AppError> {
        self.ensure_permission().await?;
        if !force_refresh {
            if let Some(sample) = self.last_fix() {
                return Ok(sample);
            }
        }
        let sample = timeout(self.config.fix_timeout(), self.provider.current_position())
            .await
            .map_err(|_| AppError::Timeout("position fix"))??;
        counter!(LOCATION_SAMPLE).increment(1);
        *self.last_fix.lock() = Some(sample.clone());
        Ok(sample)
    }

    /// Begin continuous tracking. Idempotent while a watch is running.
    pub async fn start_watching(&self) -> Result<(), AppError> {
        if self.is_watching() {
            return Ok(());
        }
        self.ensure_permission().await?;
        let stream = self.provider.watch(WatchConfig::from(&self.config)).await?;
        info!("position watch started");
        let task = tokio::spawn(Self::pump(
            stream,
            Arc::clone(&self.session),
            Arc::clone(&self.gateway),
            Arc::clone(&self.last_fix),
        ));
        let mut watcher = self.watcher.lock();
        if let Some(previous) = watcher.replace(task) {
            previous.abort();
        }
        Ok(())
    }

    pub fn stop_watching(&self) {
        if let Some(handle) = self.watcher.lock().take() {
            handle.abort();
            info!("position watch stopped");
        }
    }

    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.watcher
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Keeps the watch in step with the session: tracking runs exactly
    /// while a delivery person is signed in.
    pub fn auto_watch(self: &Arc<Self>, mut auth: watch::Receiver<AuthSnapshot>) -> JoinHandle<()> {
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let wants_watch = {
                    let snapshot = auth.borrow_and_update();
                    snapshot.is_authenticated()
                        && snapshot
                            .user
                            .as_ref()
                            .is_some_and(|user| user.role.is_delivery_person())
                };
                if wants_watch {
                    if let Err(e) = tracker.start_watching().await {
                        warn!(error = %e, "could not start courier position watch");
                    }
                } else {
                    tracker.stop_watching();
                }
                if auth.changed().await.is_err() {
                    tracker.stop_watching();
                    return;
                }
            }
        })
    }

    async fn ensure_permission(&self) -> Result<(), AppError> {
        if self.request_permission().await? {
            Ok(())
        } else {
            Err(AppError::PermissionDenied)
        }
    }

    async fn pump(
        mut stream: Box<dyn PositionStream>,
        session: Arc<SessionManager>,
        gateway: Arc<dyn ApiGateway>,
        last_fix: Arc<parking_lot::Mutex<Option<LocationSample>>>,
    ) {
        while let Some(next) = stream.next().await {
            match next {
                Ok(sample) => {
                    counter!(LOCATION_SAMPLE).increment(1);
                    *last_fix.lock() = Some(sample.clone());
                    Self::upload(&session, &gateway, &sample).await;
                },
                Err(e) => {
                    warn!(error = %e, "position watch error");
                },
            }
        }
        info!("position watch stream ended");
    }

    async fn upload(session: &SessionManager, gateway: &Arc<dyn ApiGateway>, sample: &LocationSample) {
        let lat = sample.lat;
        let lng = sample.lng;
        let gateway = Arc::clone(gateway);
        let outcome = session
            .with_auth(move |token| {
                let gateway = Arc::clone(&gateway);
                async move { gateway.upload_courier_location(&token, lat, lng).await }
            })
            .await;
        match outcome {
            Ok(()) => counter!(LOCATION_UPLOADED).increment(1),
            Err(e) => {
                counter!(LOCATION_UPLOAD_FAILED).increment(1);
                warn!(error = %e, "location upload failed");
            },
        }
    }
}

impl Drop for LocationTracker {
    fn drop(&mut self) {
        if let Some(handle) = self.watcher.lock().take() {
            handle.abort();
        }
    }
}
