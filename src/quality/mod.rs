//! 写真の品質判定
//!
//! 認識APIを呼ぶ前に、解像度・ブレ・露出を簡易チェックする。
//! 縮小画像（最大200x200）のグレースケール輝度から平均と分散を求める。
//! 輝度は ITU-R 601 の重み（0.299/0.587/0.114）で求める。

use image::{DynamicImage, GenericImageView, GrayImage, Luma};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use warehouse_recon_common::{IssueKind, PhotoRecord, QualityAssessment};

/// 判定しきい値
#[derive(Debug, Clone, Copy)]
pub struct QualityThresholds {
    pub min_width: u32,
    pub min_height: u32,
    pub thumbnail_size: u32,
    /// 輝度分散がこれ未満ならブレ
    pub blur_variance: f64,
    pub overexposed_brightness: f64,
    pub underexposed_brightness: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_width: 300,
            min_height: 300,
            thumbnail_size: 200,
            blur_variance: 500.0,
            overexposed_brightness: 240.0,
            underexposed_brightness: 15.0,
        }
    }
}

/// 写真1枚の判定結果（レポート用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoQuality {
    pub index: usize,
    pub file_name: String,
    pub assessment: QualityAssessment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualitySummary {
    pub total: usize,
    pub readable: usize,
    pub unreadable: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoQualityReport {
    pub photos: Vec<PhotoQuality>,
    pub summary: QualitySummary,
}

impl PhotoQualityReport {
    /// 写真インデックスで判定を引く
    pub fn is_readable(&self, index: usize) -> bool {
        self.photos
            .iter()
            .find(|p| p.index == index)
            .map(|p| p.assessment.readable)
            .unwrap_or(false)
    }
}

/// 画像1枚を判定する。デコード失敗は問題として返す
pub fn assess(image_path: &Path) -> QualityAssessment {
    assess_with(image_path, &QualityThresholds::default())
}

pub fn assess_with(image_path: &Path, thresholds: &QualityThresholds) -> QualityAssessment {
    let img = match image::open(image_path) {
        Ok(img) => img,
        Err(e) => {
            tracing::debug!(path = %image_path.display(), error = %e, "画像を開けません");
            return QualityAssessment::unreadable(e.to_string());
        }
    };

    let (width, height) = img.dimensions();
    let mut issues = Vec::new();

    if width < thresholds.min_width || height < thresholds.min_height {
        issues.push(IssueKind::LowResolution);
    }

    // 大きい画像だけ縮小（拡大はしない）
    let bound = thresholds.thumbnail_size;
    let thumb = if width > bound || height > bound {
        img.thumbnail(bound, bound)
    } else {
        img
    };
    let (brightness, variance) = luma_stats(&luma601(&thumb));

    if variance < thresholds.blur_variance {
        issues.push(IssueKind::Blurry);
    }

    if brightness > thresholds.overexposed_brightness {
        issues.push(IssueKind::Overexposed);
    } else if brightness < thresholds.underexposed_brightness {
        issues.push(IssueKind::Underexposed);
    }

    QualityAssessment::from_issues(issues, (width, height), brightness)
}

/// 601 の重みでグレースケール化（16bit固定小数点、四捨五入）
fn luma601(img: &DynamicImage) -> GrayImage {
    let rgb = img.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let l = (r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16;
        Luma([l as u8])
    })
}

/// 平均輝度と母分散
fn luma_stats(gray: &GrayImage) -> (f64, f64) {
    let n = gray.width() as usize * gray.height() as usize;
    if n == 0 {
        return (0.0, 0.0);
    }

    let sum: f64 = gray.pixels().map(|p| p.0[0] as f64).sum();
    let mean = sum / n as f64;
    let variance = gray
        .pixels()
        .map(|p| {
            let d = p.0[0] as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n as f64;

    (mean, variance)
}

/// 全写真を並列に判定し、揃ってから集計する
pub fn assess_photos(photos: &[PhotoRecord]) -> PhotoQualityReport {
    let photos: Vec<PhotoQuality> = photos
        .par_iter()
        .map(|photo| PhotoQuality {
            index: photo.index,
            file_name: photo.file_name.clone(),
            assessment: assess(&photo.file_path),
        })
        .collect();

    let unreadable = photos.iter().filter(|p| !p.assessment.readable).count();
    let summary = QualitySummary {
        total: photos.len(),
        readable: photos.len() - unreadable,
        unreadable,
    };

    PhotoQualityReport { photos, summary }
}
