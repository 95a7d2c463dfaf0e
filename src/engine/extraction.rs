//! マーキング抽出ステージ
//!
//! 品質判定で読めないとされた写真は認識に回さず `Фото нечитаемо` の記録にする。
//! 残りは同時実行数を絞って並行に認識し、写真インデックス順に並べ直す。

use crate::quality::PhotoQualityReport;
use crate::recognizer::{extract_marking, MarkingRecognizer};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use warehouse_recon_common::{MarkingRecord, PhotoRecord, StatusTier, COMMENT_PHOTO_UNREADABLE};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkingSummary {
    pub total: usize,
    pub extracted: usize,
    pub partial: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkingReport {
    pub markings: Vec<MarkingRecord>,
    pub summary: MarkingSummary,
}

impl MarkingReport {
    pub fn from_records(markings: Vec<MarkingRecord>) -> Self {
        let tally = |tier: StatusTier| markings.iter().filter(|m| m.status_tier == tier).count();
        let summary = MarkingSummary {
            total: markings.len(),
            extracted: tally(StatusTier::Full),
            partial: tally(StatusTier::Partial),
            failed: tally(StatusTier::Failed),
        };
        Self { markings, summary }
    }
}

pub async fn extract_all(
    recognizer: &dyn MarkingRecognizer,
    photos: &[PhotoRecord],
    quality: &PhotoQualityReport,
    concurrency: usize,
    timeout: Duration,
) -> MarkingReport {
    let tasks = photos.iter().map(|photo| {
        let readable = quality.is_readable(photo.index);
        async move {
            if !readable {
                tracing::debug!(index = photo.index, "品質不良のため認識をスキップ");
                return MarkingRecord::failed(photo.index, photo.file_name.clone(), COMMENT_PHOTO_UNREADABLE);
            }
            extract_marking(recognizer, photo, timeout).await
        }
    });

    let mut records: Vec<MarkingRecord> = stream::iter(tasks)
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    records.sort_by_key(|r| r.index);
    MarkingReport::from_records(records)
}
