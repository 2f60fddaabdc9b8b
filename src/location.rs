//! Device location with permission handling.
//!
//! [`foreground_location_or_none`] never fails: a denied permission or a
//! provider error both come back as an empty [`LocationFix`].

use crate::config::LocationSource;
use crate::platform::{Capability, Permissions, ensure_permission};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LocationError {
    #[error("location unavailable: {0}")]
    Unavailable(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Requested positioning accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accuracy {
    /// Satellite fix only.
    Highest,
    /// Network-assisted; faster, coarser.
    Balanced,
}

impl From<LocationSource> for Accuracy {
    fn from(source: LocationSource) -> Self {
        match source {
            LocationSource::GpsOnly => Self::Highest,
            LocationSource::GpsNetworks => Self::Balanced,
        }
    }
}

/// A position reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self, accuracy: Accuracy) -> Result<Position, LocationError>;
}

/// Best-effort location; any field may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LocationFix {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
}

impl From<Position> for LocationFix {
    fn from(p: Position) -> Self {
        let finite = |v: f64| Some(v).filter(|v| v.is_finite());
        Self {
            latitude: finite(p.latitude),
            longitude: finite(p.longitude),
            altitude: p.altitude.and_then(finite),
        }
    }
}

/// Ask for foreground location permission if needed, then read a fix at the
/// accuracy the settings call for.
pub async fn foreground_location_or_none(
    permissions: &dyn Permissions,
    provider: &dyn LocationProvider,
    source: LocationSource,
) -> LocationFix {
    if !ensure_permission(permissions, Capability::Location).await {
        return LocationFix::default();
    }
    match provider.current_position(Accuracy::from(source)).await {
        Ok(position) => LocationFix::from(position),
        Err(e) => {
            tracing::warn!("location lookup failed: {e}");
            LocationFix::default()
        }
    }
}
