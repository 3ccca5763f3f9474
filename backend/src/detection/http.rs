use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use reqwest::multipart::{Form, Part};
use reqwest::{Client as HttpClient, StatusCode};
use shared::DetectionResult;
use url::Url;

use super::{DetectionError, Detector};

/// Client for the external inference service's `POST /detect`.
#[derive(Clone)]
pub struct HttpDetector {
    client: HttpClient,
    detect_url: Url,
}

impl HttpDetector {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DetectionError> {
        let detect_url = detect_endpoint(base_url)?;
        let client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DetectionError::Unavailable(format!("failed to build HTTP client: {}", e)))?;
        info!("Detection client targeting {}", detect_url);
        Ok(Self { client, detect_url })
    }
}

fn detect_endpoint(base_url: &str) -> Result<Url, DetectionError> {
    let mut base = Url::parse(base_url)
        .map_err(|e| DetectionError::Unavailable(format!("invalid detection URL '{}': {}", base_url, e)))?;
    // Url::join drops the last segment unless the base ends with '/'.
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("detect")
        .map_err(|e| DetectionError::Unavailable(format!("invalid detection URL '{}': {}", base_url, e)))
}

fn transport_error(e: reqwest::Error) -> DetectionError {
    if e.is_timeout() {
        DetectionError::Unavailable(format!("request timed out: {}", e))
    } else if e.is_connect() {
        DetectionError::Unavailable(format!("connection failed: {}", e))
    } else {
        DetectionError::Unavailable(e.to_string())
    }
}

#[async_trait]
impl Detector for HttpDetector {
    async fn detect(
        &self,
        image: &[u8],
        filename: &str,
        content_type: &str,
    ) -> Result<DetectionResult, DetectionError> {
        let part = Part::bytes(image.to_vec())
            .file_name(filename.to_string())
            .mime_str(content_type)
            .map_err(|e| DetectionError::Service(format!("invalid content type '{}': {}", content_type, e)))?;
        let form = Form::new().part("file", part);

        debug!("Sending {} bytes ({}) to {}", image.len(), filename, self.detect_url);
        let response = self
            .client
            .post(self.detect_url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                error!("Detection request to {} failed: {:?}", self.detect_url, e);
                transport_error(e)
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(transport_error)?;

        if status != StatusCode::OK {
            warn!("Detection service answered {}: {}", status, String::from_utf8_lossy(&body));
            return Err(DetectionError::Service(format!(
                "unexpected status {}",
                status
            )));
        }

        let result: DetectionResult = serde_json::from_slice(&body).map_err(|e| {
            error!("Undecodable detection response: {:?}", e);
            DetectionError::Service(format!("malformed response body: {}", e))
        })?;

        if !result.success {
            return Err(DetectionError::Service(
                "detector reported an unsuccessful run".to_string(),
            ));
        }

        info!(
            "Detection returned {} box(es) for {}x{} image",
            result.detections.len(),
            result.image_width,
            result.image_height
        );
        Ok(result)
    }
}
