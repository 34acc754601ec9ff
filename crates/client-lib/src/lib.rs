// ============================
// quickbite-client-lib/src/lib.rs
// ============================
//! Core client-lib functionality for the QuickBite delivery client.

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod location;
pub mod metrics;
pub mod realtime;
pub mod storage;
pub mod validation;

use std::sync::Arc;

use crate::auth::SessionManager;
use crate::config::Settings;
use crate::error::AppError;
use crate::gateway::{ApiGateway, HttpGateway};
use crate::location::{LocationTracker, PositionProvider};
use crate::realtime::{RealtimeManager, RealtimeTransport, WsTransport};
use crate::storage::{CredentialStore, EncryptedFileStore};

/// Client state shared across the app: one session, one realtime
/// connection, one location tracker, all wired to the same auth channel
pub struct Client {
    /// Effective settings
    pub settings: Arc<Settings>,
    /// Session manager
    pub session: Arc<SessionManager>,
    /// Realtime connection manager
    pub realtime: Arc<RealtimeManager>,
    /// Location tracker
    pub location: Arc<LocationTracker>,
    auto_watch: tokio::task::JoinHandle<()>,
}

impl Client {
    /// Wire the managers from explicit collaborators
    pub fn new(
        settings: Settings,
        gateway: Arc<dyn ApiGateway>,
        store: Arc<dyn CredentialStore>,
        transport: Arc<dyn RealtimeTransport>,
        provider: Arc<dyn PositionProvider>,
    ) -> Self {
        let settings = Arc::new(settings);
        let session = Arc::new(SessionManager::new(Arc::clone(&gateway), store));
        let realtime = Arc::new(RealtimeManager::new(
            transport,
            session.subscribe(),
            settings.realtime_url.clone(),
            settings.update_buffer_capacity,
        ));
        let location = Arc::new(LocationTracker::new(
            provider,
            Arc::clone(&session),
            gateway,
            settings.location.clone(),
        ));
        let auto_watch = location.auto_watch(session.subscribe());

        Self {
            settings,
            session,
            realtime,
            location,
            auto_watch,
        }
    }

    /// Production wiring: HTTP gateway, websocket transport and the
    /// encrypted on-disk credential store, under `settings.data_dir`
    pub fn open(settings: Settings, provider: Arc<dyn PositionProvider>) -> Result<Self, AppError> {
        let gateway: Arc<dyn ApiGateway> = Arc::new(HttpGateway::new(&settings)?);
        let store: Arc<dyn CredentialStore> =
            Arc::new(EncryptedFileStore::open(&settings.data_dir)?);
        let transport: Arc<dyn RealtimeTransport> = Arc::new(WsTransport);
        Ok(Self::new(settings, gateway, store, transport, provider))
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.auto_watch.abort();
    }
}
