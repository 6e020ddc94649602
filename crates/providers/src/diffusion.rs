//! Image rendering over a txt2img HTTP endpoint
//! (`POST {base_url}/sdapi/v1/txt2img`).

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use storyverse_config::ImageConfig;
use storyverse_core::ImageRenderer;
use storyverse_core::error::ImageError;
use tracing::{debug, warn};

pub struct DiffusionHttpRenderer {
    base_url: String,
    steps: u32,
    cfg_scale: f32,
    batch_size: u32,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct TxtToImgRequest<'a> {
    prompt: &'a str,
    steps: u32,
    cfg_scale: f32,
    width: u32,
    height: u32,
    batch_size: u32,
}

#[derive(Debug, Deserialize)]
struct TxtToImgResponse {
    #[serde(default)]
    images: Vec<String>,
}

impl DiffusionHttpRenderer {
    pub fn from_config(config: &ImageConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            steps: config.inference_steps,
            cfg_scale: config.guidance_scale,
            batch_size: config.images_per_prompt,
            client,
        }
    }

    /// Whether the service answers its model listing.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/sdapi/v1/sd-models", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl ImageRenderer for DiffusionHttpRenderer {
    fn name(&self) -> &str {
        "txt2img"
    }

    async fn render_scene(&self, prompt: &str, size: u32) -> std::result::Result<Vec<u8>, ImageError> {
        let url = format!("{}/sdapi/v1/txt2img", self.base_url);
        let body = TxtToImgRequest {
            prompt,
            steps: self.steps,
            cfg_scale: self.cfg_scale,
            width: size,
            height: size,
            batch_size: self.batch_size,
        };

        debug!(size, steps = self.steps, "Sending txt2img request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ImageError::Failed(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Image endpoint returned error");
            return Err(ImageError::Failed(format!("HTTP {status}: {error_body}")));
        }

        let parsed: TxtToImgResponse = response
            .json()
            .await
            .map_err(|e| ImageError::Failed(format!("Failed to parse response: {e}")))?;
        first_image(parsed)
    }
}

/// Decode the first image, accepting bare base64 or a `data:` URL.
fn first_image(response: TxtToImgResponse) -> Result<Vec<u8>, ImageError> {
    let encoded = response
        .images
        .into_iter()
        .next()
        .ok_or_else(|| ImageError::Failed("Response contained no images".into()))?;
    let payload = match encoded.split_once(',') {
        Some((header, data)) if header.starts_with("data:") => data,
        _ => encoded.as_str(),
    };
    STANDARD
        .decode(payload.trim())
        .map_err(|e| ImageError::Failed(format!("Invalid image data: {e}")))
}
