// ============================================================================
// crates/client-lib/src/location/provider.rs
// ============================================================================

//! Position sources.
//!
//! [`PositionProvider`] is the seam between the tracker and whatever the
//! host platform exposes for geolocation. The watch thresholds travel
//! with the request; enforcing them is the provider's job, not the
//! tracker's.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use quickbite_common::LocationSample;

use crate::config::LocationSettings;
use crate::error::AppError;

/// Watch parameters handed to the provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchConfig {
    /// Minimum movement before a new sample is reported, in metres
    pub min_displacement_m: f64,
    /// Target interval between samples
    pub interval: Duration,
    /// Floor under the interval when fixes arrive early
    pub fastest_interval: Duration,
}

impl From<&LocationSettings> for WatchConfig {
    fn from(settings: &LocationSettings) -> Self {
        Self {
            min_displacement_m: settings.min_displacement_m,
            interval: settings.interval(),
            fastest_interval: settings.fastest_interval(),
        }
    }
}

/// Stream of samples from a watch session. Dropping it ends the watch.
#[async_trait]
pub trait PositionStream: Send {
    /// Next sample; `None` once the watch is exhausted
    async fn next(&mut self) -> Option<Result<LocationSample, AppError>>;
}

/**
A source of device positions.

Implementations wrap the host's geolocation service. `request_permission`
may prompt the user; the tracker calls it at most once and caches the
answer, so implementations do not need their own cache.
*/
#[async_trait]
pub trait PositionProvider: Send + Sync {
    /// Ask the platform for location permission
    async fn request_permission(&self) -> Result<bool, AppError>;

    /// One-shot position fix
    async fn current_position(&self) -> Result<LocationSample, AppError>;

    /// Continuous updates honouring `config`
    async fn watch(&self, config: WatchConfig) -> Result<Box<dyn PositionStream>, AppError>;
}

/// Replays a fixed route, wrapping around at the end. Used by the demo
/// binary and by tests; of the watch thresholds only the interval is
/// honoured, since a replayed route moves however its fixture says.
pub struct SimulatedProvider {
    route: Vec<(f64, f64)>,
    cursor: AtomicUsize,
    permission_granted: bool,
    tick: Option<Duration>,
}

impl SimulatedProvider {
    pub fn new(route: Vec<(f64, f64)>) -> Self {
        Self {
            route,
            cursor: AtomicUsize::new(0),
            permission_granted: true,
            tick: None,
        }
    }

    /// Simulate a user who refuses the permission prompt
    #[must_use]
    pub fn denied(mut self) -> Self {
        self.permission_granted = false;
        self
    }

    /// Override the watch interval, for fast playback in tests
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = Some(tick);
        self
    }

    fn sample_at(&self, index: usize) -> Option<LocationSample> {
        let (lat, lng) = *self.route.get(index % self.route.len().max(1))?;
        Some(LocationSample {
            lat,
            lng,
            captured_at: Utc::now(),
        })
    }
}

#[async_trait]
impl PositionProvider for SimulatedProvider {
    async fn request_permission(&self) -> Result<bool, AppError> {
        Ok(self.permission_granted)
    }

    async fn current_position(&self) -> Result<LocationSample, AppError> {
        if !self.permission_granted {
            return Err(AppError::PermissionDenied);
        }
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.sample_at(index)
            .ok_or_else(|| AppError::InvalidInput("simulated route is empty".to_string()))
    }

    async fn watch(&self, config: WatchConfig) -> Result<Box<dyn PositionStream>, AppError> {
        if !self.permission_granted {
            return Err(AppError::PermissionDenied);
        }
        if self.route.is_empty() {
            return Err(AppError::InvalidInput("simulated route is empty".to_string()));
        }
        Ok(Box::new(SimulatedStream {
            route: self.route.clone(),
            index: 0,
            tick: self.tick.unwrap_or(config.interval),
        }))
    }
}

struct SimulatedStream {
    route: Vec<(f64, f64)>,
    index: usize,
    tick: Duration,
}

#[async_trait]
impl PositionStream for SimulatedStream {
    async fn next(&mut self) -> Option<Result<LocationSample, AppError>> {
        tokio::time::sleep(self.tick).await;
        let (lat, lng) = self.route[self.index % self.route.len()];
        self.index += 1;
        Some(Ok(LocationSample {
            lat,
            lng,
            captured_at: Utc::now(),
        }))
    }
}
