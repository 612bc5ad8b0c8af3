//! Remote detector
//!
//! Sends each pass to an HTTP inference service. The service receives the
//! PNG-encoded raster as the request body and the inference parameters as
//! query arguments, and answers with a JSON array of
//! `{"box": [x1, y1, x2, y2], "confidence": f, "class_id": n}`.

use crate::detection::DetectorOutput;
use crate::detector::{Detector, DetectorParams};
use crate::error::AnalysisError;
use image::{ImageFormat, RgbImage};
use std::io::Cursor;
use std::time::Duration;

/// Per-request deadline
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct RemoteDetector {
    agent: ureq::Agent,
    url: String,
    params: DetectorParams,
}

impl RemoteDetector {
    pub fn new(url: &str, params: DetectorParams) -> Result<Self, AnalysisError> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AnalysisError::DetectorUnavailable(format!(
                "Remote detector URL must be http(s), got {:?}",
                url
            )));
        }

        tracing::info!("Using remote detector at {}", url);
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build()
            .into();

        Ok(Self {
            agent,
            url: url.to_string(),
            params,
        })
    }

    fn encode(image: &RgbImage) -> Result<Vec<u8>, AnalysisError> {
        let mut buf = Cursor::new(Vec::new());
        image
            .write_to(&mut buf, ImageFormat::Png)
            .map_err(|e| AnalysisError::InferenceError(format!("Failed to encode image: {}", e)))?;
        Ok(buf.into_inner())
    }

    fn query(&self, size: u32, augment: bool) -> Vec<(&'static str, String)> {
        let classes = self
            .params
            .classes
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(",");
        vec![
            ("size", size.to_string()),
            ("augment", augment.to_string()),
            ("conf", self.params.confidence.to_string()),
            ("iou", self.params.iou.to_string()),
            ("max_det", self.params.max_detections.to_string()),
            ("agnostic", self.params.agnostic.to_string()),
            ("classes", classes),
        ]
    }
}

impl Detector for RemoteDetector {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn description(&self) -> &'static str {
        "Forwards inference passes to an HTTP detection service"
    }

    fn detect(
        &self,
        image: &RgbImage,
        size: u32,
        augment: bool,
    ) -> Result<Vec<DetectorOutput>, AnalysisError> {
        let body = Self::encode(image)?;

        let mut request = self.agent.post(self.url.as_str()).header("Content-Type", "image/png");
        for (key, value) in self.query(size, augment) {
            request = request.query(key, value);
        }

        let mut response = request
            .send(&body[..])
            .map_err(|e| AnalysisError::InferenceError(format!("Request failed: {}", e)))?;
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| AnalysisError::InferenceError(format!("Failed to read response: {}", e)))?;
        let outputs: Vec<DetectorOutput> = serde_json::from_str(&text)
            .map_err(|e| AnalysisError::InferenceError(format!("Invalid response: {}", e)))?;

        Ok(self.params.filter(outputs))
    }
}
