use std::sync::Arc;

use chrono::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument};

use shared_utils::Clock;
use tebra_cell::{AppointmentReason, PracticeApi, Provider, ServiceLocation};

use crate::models::{BookingError, BookingStage, BootstrapSnapshot, CacheStatus};

pub const SNAPSHOT_TTL_HOURS: i64 = 12;

/// Process-wide reference data for the primary practice.
///
/// A snapshot is replaced as a whole, never patched. Refreshes are
/// single-flight: concurrent misses wait on one remote fan-out.
pub struct BootstrapCache {
    gateway: Arc<dyn PracticeApi>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    snapshot: RwLock<Option<Arc<BootstrapSnapshot>>>,
    refresh: Mutex<()>,
}

impl BootstrapCache {
    pub fn new(gateway: Arc<dyn PracticeApi>, clock: Arc<dyn Clock>) -> Self {
        Self {
            gateway,
            clock,
            ttl: Duration::hours(SNAPSHOT_TTL_HOURS),
            snapshot: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    pub async fn get_snapshot(&self) -> Result<Arc<BootstrapSnapshot>, BookingError> {
        if let Some(snapshot) = self.fresh_snapshot().await {
            return Ok(snapshot);
        }

        let _guard = self.refresh.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(snapshot) = self.fresh_snapshot().await {
            return Ok(snapshot);
        }

        let snapshot = Arc::new(self.fetch_snapshot().await?);
        *self.snapshot.write().await = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    pub async fn clear_cache(&self) {
        *self.snapshot.write().await = None;
        info!("Bootstrap cache cleared");
    }

    pub async fn status(&self) -> CacheStatus {
        let now = self.clock.now();
        let guard = self.snapshot.read().await;

        match guard.as_ref() {
            Some(snapshot) if now < snapshot.expires_at => CacheStatus {
                is_cached: true,
                cached_at: Some(snapshot.cached_at),
                expires_at: Some(snapshot.expires_at),
                time_remaining: snapshot.expires_at - now,
            },
            Some(snapshot) => CacheStatus {
                is_cached: false,
                cached_at: Some(snapshot.cached_at),
                expires_at: Some(snapshot.expires_at),
                time_remaining: Duration::zero(),
            },
            None => CacheStatus {
                is_cached: false,
                cached_at: None,
                expires_at: None,
                time_remaining: Duration::zero(),
            },
        }
    }

    async fn fresh_snapshot(&self) -> Option<Arc<BootstrapSnapshot>> {
        let now = self.clock.now();
        self.snapshot
            .read()
            .await
            .as_ref()
            .filter(|snapshot| now < snapshot.expires_at)
            .cloned()
    }

    #[instrument(skip(self))]
    async fn fetch_snapshot(&self) -> Result<BootstrapSnapshot, BookingError> {
        debug!("Bootstrap cache miss, loading reference data");

        let practices = self
            .gateway
            .get_practices()
            .await
            .map_err(BookingError::remote(BookingStage::ResolvingReference))?;

        let practice_id = practices
            .first()
            .map(|p| p.id.clone())
            .ok_or_else(|| BookingError::Configuration("No practices found".to_string()))?;

        let (service_locations, providers, appointment_reasons) = futures::try_join!(
            self.gateway.get_service_locations(&practice_id),
            self.gateway.get_providers(&practice_id),
            self.gateway.get_appointment_reasons(&practice_id),
        )
        .map_err(BookingError::remote(BookingStage::ResolvingReference))?;

        let cached_at = self.clock.now();

        info!(
            "Loaded reference data for practice {}: {} locations, {} providers, {} reasons",
            practice_id,
            service_locations.len(),
            providers.len(),
            appointment_reasons.len()
        );

        Ok(BootstrapSnapshot {
            practices,
            service_locations,
            providers,
            appointment_reasons,
            cached_at,
            expires_at: cached_at + self.ttl,
        })
    }

    // ==============================================================================
    // DERIVED ACCESSORS
    // ==============================================================================

    pub async fn primary_practice_id(&self) -> Result<String, BookingError> {
        let snapshot = self.get_snapshot().await?;
        snapshot
            .practices
            .first()
            .map(|p| p.id.clone())
            .ok_or_else(|| BookingError::Configuration("No practices found".to_string()))
    }

    pub async fn primary_service_location(&self) -> Result<ServiceLocation, BookingError> {
        let snapshot = self.get_snapshot().await?;
        snapshot
            .service_locations
            .first()
            .cloned()
            .ok_or_else(|| BookingError::Configuration("No service locations found".to_string()))
    }

    pub async fn primary_service_location_id(&self) -> Result<String, BookingError> {
        Ok(self.primary_service_location().await?.id)
    }

    pub async fn primary_provider(&self) -> Result<Provider, BookingError> {
        let snapshot = self.get_snapshot().await?;
        snapshot
            .providers
            .first()
            .cloned()
            .ok_or_else(|| BookingError::Configuration("No providers found".to_string()))
    }

    pub async fn primary_provider_id(&self) -> Result<String, BookingError> {
        Ok(self.primary_provider().await?.id)
    }

    pub async fn providers(&self) -> Result<Vec<Provider>, BookingError> {
        Ok(self.get_snapshot().await?.providers.clone())
    }

    /// `Ok(None)` for a provider outside the primary practice.
    pub async fn provider_by_id(&self, provider_id: &str) -> Result<Option<Provider>, BookingError> {
        let snapshot = self.get_snapshot().await?;
        Ok(snapshot.providers.iter().find(|p| p.id == provider_id).cloned())
    }

    pub async fn appointment_reasons(&self) -> Result<Vec<AppointmentReason>, BookingError> {
        Ok(self.get_snapshot().await?.appointment_reasons.clone())
    }

    /// `Ok(None)` for an id the practice does not offer.
    pub async fn reason_by_id(&self, reason_id: &str) -> Result<Option<AppointmentReason>, BookingError> {
        let snapshot = self.get_snapshot().await?;
        Ok(snapshot
            .appointment_reasons
            .iter()
            .find(|r| r.id == reason_id)
            .cloned())
    }
}
