//! Gemini API によるマーキング認識
//!
//! 画像をRGB化・縮小してJPEG（品質90）にし、base64で埋め込んで
//! generateContent を呼ぶ。応答テキストのJSONを RecognizedMarking にする。

use super::{ExtractionError, MarkingRecognizer};
use crate::config::Config;
use crate::error::Result;
use async_trait::async_trait;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use warehouse_recon_common::{build_marking_prompt, parse_marking_response, RecognizedMarking};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const JPEG_QUALITY: u8 = 90;

/// Gemini APIリクエスト
#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

/// Gemini APIレスポンス
#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

pub struct GeminiRecognizer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_image_size: u32,
}

impl GeminiRecognizer {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, max_image_size: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            max_image_size,
        }
    }

    /// 設定（とGEMINI_API_KEY）から作る
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.get_api_key()?;
        Ok(Self::new(api_key, config.model.clone(), config.max_image_size))
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", GEMINI_API_BASE, self.model)
    }

    fn build_request(&self, jpeg: &[u8]) -> GeminiRequest {
        GeminiRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: build_marking_prompt(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/jpeg".into(),
                            data: base64::engine::general_purpose::STANDARD.encode(jpeg),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: 0.1,
                response_mime_type: "application/json".into(),
            },
        }
    }
}

#[async_trait]
impl MarkingRecognizer for GeminiRecognizer {
    async fn recognize(&self, image_path: &Path) -> std::result::Result<RecognizedMarking, ExtractionError> {
        let path = image_path.to_path_buf();
        let max_size = self.max_image_size;
        let jpeg = tokio::task::spawn_blocking(move || prepare_image(&path, max_size))
            .await
            .map_err(|e| ExtractionError::Image(e.to_string()))??;

        tracing::debug!(path = %image_path.display(), bytes = jpeg.len(), model = %self.model, "Gemini呼び出し");

        let response = self
            .client
            .post(format!("{}?key={}", self.endpoint(), self.api_key))
            .json(&self.build_request(&jpeg))
            .send()
            .await
            .map_err(|e| ExtractionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Transport(format!("HTTP {}: {}", status, body)));
        }

        let payload: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::Parse(e.to_string()))?;

        let text = payload
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| ExtractionError::Parse("空のレスポンス".into()))?;

        parse_marking_response(text).map_err(|e| ExtractionError::Parse(e.to_string()))
    }
}

/// RGB化・縮小してJPEGにエンコード
pub fn prepare_image(path: &Path, max_size: u32) -> std::result::Result<Vec<u8>, ExtractionError> {
    let img = image::open(path).map_err(|e| ExtractionError::Image(e.to_string()))?;
    let rgb = resize_if_needed(img, max_size).to_rgb8();

    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
    encoder
        .encode_image(&rgb)
        .map_err(|e| ExtractionError::Image(e.to_string()))?;
    Ok(buffer)
}

/// 長辺が上限を超える場合だけ縮小
fn resize_if_needed(img: DynamicImage, max_size: u32) -> DynamicImage {
    let (width, height) = (img.width(), img.height());
    if max_size == 0 || (width <= max_size && height <= max_size) {
        return img;
    }
    img.resize(max_size, max_size, image::imageops::FilterType::Lanczos3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_prepare_image_downscales_to_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.png");
        RgbImage::from_pixel(800, 400, Rgb([10, 200, 30])).save(&path).unwrap();

        let jpeg = prepare_image(&path, 200).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (200, 100));
    }

    #[test]
    fn test_prepare_image_keeps_small_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.png");
        RgbImage::from_pixel(64, 48, Rgb([0, 0, 0])).save(&path).unwrap();

        let jpeg = prepare_image(&path, 1568).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn test_prepare_image_rejects_non_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.jpg");
        std::fs::write(&path, "text").unwrap();
        assert!(matches!(prepare_image(&path, 100), Err(ExtractionError::Image(_))));
    }

    #[test]
    fn test_request_shape() {
        let recognizer = GeminiRecognizer::new("key", "gemini-2.0-flash", 1568);
        let request = recognizer.build_request(&[1, 2, 3]);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["contents"][0]["parts"][1]["inline_data"]["mime_type"], "image/jpeg");
        assert_eq!(json["contents"][0]["parts"][1]["inline_data"]["data"], "AQID");
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
        assert!(json["contents"][0]["parts"][0]["text"].as_str().unwrap().contains("article"));
        assert_eq!(
            recognizer.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }
}
