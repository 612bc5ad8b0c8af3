//! Detector backend implementations
//!
//! This module contains implementations of the Detector trait for different
//! backends. Remote inference is conditionally compiled behind a feature flag.

pub mod fixture;

#[cfg(feature = "detector-remote")]
pub mod remote;

use crate::config::{DetectorConfig, DetectorKind};
use crate::detector::Detector;
use crate::error::AnalysisError;
use serde::Serialize;
use std::sync::Arc;

/// Information about the loaded detector
#[derive(Debug, Clone, Serialize)]
pub struct DetectorInfo {
    pub name: &'static str,
    pub description: &'static str,
}

impl DetectorInfo {
    pub fn of(detector: &dyn Detector) -> Self {
        Self {
            name: detector.name(),
            description: detector.description(),
        }
    }
}

/// Names of the backends compiled into this build
pub fn available() -> Vec<&'static str> {
    let mut names = vec!["fixture"];
    if cfg!(feature = "detector-remote") {
        names.push("remote");
    }
    names
}

/// Build the configured detector backend
pub fn load(config: &DetectorConfig) -> Result<Arc<dyn Detector>, AnalysisError> {
    match config.kind {
        DetectorKind::Fixture => {
            tracing::info!("Initializing fixture detector...");
            let path = config.fixture_path.as_ref().ok_or_else(|| {
                AnalysisError::DetectorUnavailable(
                    "Fixture detector requires --fixture-path".to_string(),
                )
            })?;
            Ok(Arc::new(fixture::FixtureDetector::load(path, config.params.clone())?))
        }
        DetectorKind::Remote => load_remote(config),
    }
}

#[cfg(feature = "detector-remote")]
fn load_remote(config: &DetectorConfig) -> Result<Arc<dyn Detector>, AnalysisError> {
    tracing::info!("Initializing remote detector...");
    let url = config.remote_url.as_deref().ok_or_else(|| {
        AnalysisError::DetectorUnavailable("Remote detector requires --remote-url".to_string())
    })?;
    Ok(Arc::new(remote::RemoteDetector::new(url, config.params.clone())?))
}

#[cfg(not(feature = "detector-remote"))]
fn load_remote(_config: &DetectorConfig) -> Result<Arc<dyn Detector>, AnalysisError> {
    Err(AnalysisError::DetectorUnavailable(
        "Remote detector not compiled in. Build with --features detector-remote".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::DetectorParams;

    #[test]
    fn test_fixture_without_path_is_unavailable() {
        let config = DetectorConfig {
            kind: DetectorKind::Fixture,
            fixture_path: None,
            remote_url: None,
            params: DetectorParams::default(),
        };
        assert!(matches!(
            load(&config),
            Err(AnalysisError::DetectorUnavailable(_))
        ));
    }

    #[test]
    fn test_remote_without_url_is_unavailable() {
        let config = DetectorConfig {
            kind: DetectorKind::Remote,
            fixture_path: None,
            remote_url: None,
            params: DetectorParams::default(),
        };
        assert!(matches!(
            load(&config),
            Err(AnalysisError::DetectorUnavailable(_))
        ));
    }

    #[test]
    fn test_fixture_is_always_available() {
        assert!(available().contains(&"fixture"));
    }
}
