//! Trajectory service client trait and HTTP implementation.
//!
//! The [`TrajectoryClient`] trait abstracts the two-operation contract of
//! the prediction service, allowing the orchestrator to run against mocks in
//! tests. The [`HttpTrajectoryClient`] implementation talks JSON over HTTP
//! via a reusable `reqwest` client.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;

use super::error::SyncError;
use super::point::TrajectoryPoint;

/// Default HTTP timeout for service calls.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default service base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

/// Response body of a submit call.
///
/// The probability is the service's intrusion estimate for the device's
/// area of interest, in `[0, 1]`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PredictionResponse {
    pub probability: f64,
}

/// Trait for the prediction service's trajectory operations.
pub trait TrajectoryClient: Send + Sync {
    /// Submit a point for a device. Returns the updated intrusion
    /// probability.
    fn submit(
        &self,
        device_id: &str,
        point: &TrajectoryPoint,
    ) -> impl Future<Output = Result<f64, SyncError>> + Send;

    /// Fetch the authoritative latest trajectory for a device, ordered
    /// most-recent-first. An empty result is a valid answer for a device
    /// with no history.
    fn fetch_latest(
        &self,
        device_id: &str,
    ) -> impl Future<Output = Result<Vec<TrajectoryPoint>, SyncError>> + Send;
}

/// HTTP client for the prediction service.
///
/// Uses a reusable `reqwest::Client` with connection pooling and a request
/// timeout; timeouts and non-2xx statuses both surface as
/// [`SyncError::RequestFailed`].
#[derive(Debug, Clone)]
pub struct HttpTrajectoryClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTrajectoryClient {
    /// Create a client against the given base URL (e.g.
    /// `http://localhost:8080/api`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, SyncError> {
        Self::with_timeout(base_url, DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::RequestFailed(e.to_string()))?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self { http, base_url })
    }

    fn add_url(&self, device_id: &str) -> String {
        format!("{}/trajectory/{}/add", self.base_url, device_id)
    }

    fn latest_url(&self, device_id: &str) -> String {
        format!("{}/trajectory/{}/latest", self.base_url, device_id)
    }

    fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SyncError> {
        if !response.status().is_success() {
            return Err(SyncError::RequestFailed(format!(
                "HTTP {} for {}",
                response.status(),
                response.url()
            )));
        }
        Ok(response)
    }
}

impl TrajectoryClient for HttpTrajectoryClient {
    async fn submit(&self, device_id: &str, point: &TrajectoryPoint) -> Result<f64, SyncError> {
        let url = self.add_url(device_id);
        let response = self
            .http
            .post(&url)
            .json(point)
            .send()
            .await
            .map_err(|e| SyncError::RequestFailed(e.to_string()))?;
        let response = Self::check_status(response)?;

        let prediction: PredictionResponse = response
            .json()
            .await
            .map_err(|e| SyncError::InvalidResponse(e.to_string()))?;

        tracing::debug!(
            device_id,
            lat = point.lat,
            lon = point.lon,
            probability = prediction.probability,
            "Trajectory point submitted"
        );
        Ok(prediction.probability)
    }

    async fn fetch_latest(&self, device_id: &str) -> Result<Vec<TrajectoryPoint>, SyncError> {
        let url = self.latest_url(device_id);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| SyncError::RequestFailed(e.to_string()))?;
        let response = Self::check_status(response)?;

        let points: Vec<TrajectoryPoint> = response
            .json()
            .await
            .map_err(|e| SyncError::InvalidResponse(e.to_string()))?;

        tracing::debug!(device_id, points = points.len(), "Trajectory fetched");
        Ok(points)
    }
}
