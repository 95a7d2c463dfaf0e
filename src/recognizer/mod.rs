//! マーキング認識の境界
//!
//! 外部の認識サービスは `MarkingRecognizer` トレイトの裏に置く。
//! 認識の失敗・タイムアウト・`error` フィールド付きの応答は
//! すべて `Failed` の MarkingRecord に変換し、呼び出し側には伝播しない。

pub mod cache;
pub mod gemini;

pub use cache::CachedRecognizer;
pub use gemini::GeminiRecognizer;

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use warehouse_recon_common::{MarkingRecord, PhotoRecord, RecognizedMarking};

/// 診断コメントに残すエラーメッセージの最大文字数
const COMMENT_DETAIL_LIMIT: usize = 100;

/// 1枚分の認識失敗
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("認識API呼び出しエラー: {0}")]
    Transport(String),

    #[error("認識APIがタイムアウトしました")]
    Timeout,

    #[error("レスポンス解析エラー: {0}")]
    Parse(String),

    #[error("画像の準備に失敗: {0}")]
    Image(String),
}

impl ExtractionError {
    /// MarkingRecord に書く診断コメント
    pub fn comment(&self) -> String {
        match self {
            ExtractionError::Transport(message) | ExtractionError::Image(message) => {
                let detail: String = message.chars().take(COMMENT_DETAIL_LIMIT).collect();
                format!("Ошибка API: {}", detail)
            }
            ExtractionError::Timeout => "Превышено время ожидания".to_string(),
            ExtractionError::Parse(_) => "Ошибка парсинга ответа".to_string(),
        }
    }
}

/// 画像1枚からマーキングを読み取る
#[async_trait]
pub trait MarkingRecognizer: Send + Sync {
    async fn recognize(&self, image_path: &Path) -> Result<RecognizedMarking, ExtractionError>;

    /// セッションのリセット時に呼ばれる（キャッシュ破棄など）
    async fn reset(&self) {}
}

/// 認識結果を記録に変換する
pub fn record_from_recognition(
    index: usize,
    file_name: &str,
    result: Result<RecognizedMarking, ExtractionError>,
) -> MarkingRecord {
    match result {
        Ok(marking) => match marking.error.filter(|e| !e.trim().is_empty()) {
            Some(error) => {
                tracing::debug!(index, file_name, error = %error, "認識サービスが読み取り不可と回答");
                MarkingRecord::failed(index, file_name, error)
            }
            None => MarkingRecord::new(index, file_name, marking.name, marking.article, marking.dimensions),
        },
        Err(e) => {
            tracing::warn!(index, file_name, error = %e, "マーキング認識失敗");
            MarkingRecord::failed(index, file_name, e.comment())
        }
    }
}

/// タイムアウト付きで1枚を認識し、必ず記録を返す
pub async fn extract_marking(
    recognizer: &dyn MarkingRecognizer,
    photo: &PhotoRecord,
    timeout: Duration,
) -> MarkingRecord {
    let result = match tokio::time::timeout(timeout, recognizer.recognize(&photo.file_path)).await {
        Ok(result) => result,
        Err(_) => Err(ExtractionError::Timeout),
    };
    record_from_recognition(photo.index, &photo.file_name, result)
}
