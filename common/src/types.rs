//! 照合データの型定義
//!
//! エンジンとCLIで共有される型:
//! - PhotoRecord / QualityAssessment: アップロード写真と品質判定
//! - RecognizedMarking / MarkingRecord: 認識APIの生データと正規化後の記録
//! - SpecificationItem / ComparisonRecord: 計画と実績の照合

use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// アップロードされた写真
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    pub index: usize,
    pub file_path: PathBuf,
    pub file_name: String,
}

// =============================================
// 品質判定
// =============================================

/// 品質上の問題
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum IssueKind {
    LowResolution,
    Blurry,
    Overexposed,
    Underexposed,
    /// デコード失敗（メッセージ付き）
    Unreadable(String),
}

impl IssueKind {
    /// 帳票・レポート用の表記
    pub fn label(&self) -> String {
        match self {
            IssueKind::LowResolution => "Низкое разрешение".to_string(),
            IssueKind::Blurry => "Изображение размыто".to_string(),
            IssueKind::Overexposed => "Пересвет".to_string(),
            IssueKind::Underexposed => "Недосвет".to_string(),
            IssueKind::Unreadable(message) => format!("Ошибка обработки: {}", message),
        }
    }
}

/// 3段階の品質ステータス（ok / marginal / failed）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityStatus {
    Ok,
    Marginal,
    Failed,
}

impl QualityStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            QualityStatus::Ok => "✅",
            QualityStatus::Marginal => "⚠️",
            QualityStatus::Failed => "❌",
        }
    }
}

/// 1枚の写真の品質判定結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityAssessment {
    pub readable: bool,
    pub issues: Vec<IssueKind>,
    /// 元画像の (幅, 高さ)。デコード失敗時はNone
    pub resolution: Option<(u32, u32)>,
    /// 平均輝度（小数1桁）
    pub brightness: f64,
}

impl QualityAssessment {
    pub fn from_issues(issues: Vec<IssueKind>, resolution: (u32, u32), brightness: f64) -> Self {
        Self {
            readable: issues.is_empty(),
            issues,
            resolution: Some(resolution),
            brightness: (brightness * 10.0).round() / 10.0,
        }
    }

    /// 画像を開けなかった場合
    pub fn unreadable(message: impl Into<String>) -> Self {
        Self {
            readable: false,
            issues: vec![IssueKind::Unreadable(message.into())],
            resolution: None,
            brightness: 0.0,
        }
    }

    /// 問題0件 → ok、1件 → marginal、それ以外またはデコード失敗 → failed
    pub fn status(&self) -> QualityStatus {
        let undecodable = self
            .issues
            .iter()
            .any(|issue| matches!(issue, IssueKind::Unreadable(_)));

        match self.issues.len() {
            _ if undecodable => QualityStatus::Failed,
            0 => QualityStatus::Ok,
            1 => QualityStatus::Marginal,
            _ => QualityStatus::Failed,
        }
    }

    pub fn resolution_label(&self) -> String {
        match self.resolution {
            Some((w, h)) => format!("{}x{}", w, h),
            None => "неизвестно".to_string(),
        }
    }
}

// =============================================
// マーキング
// =============================================

/// 認識APIが返す生データ
///
/// `{"name": ..., "article": ..., "dimensions": ..., "error": ...}`
/// 品番が数値で返ってくることがあるため文字列に寄せて受ける。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizedMarking {
    #[serde(deserialize_with = "string_or_number")]
    pub name: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub article: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub dimensions: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub error: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// 認識結果の完全度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTier {
    /// 名称と品番の両方あり
    Full,
    /// 品番のみ
    Partial,
    Failed,
}

impl StatusTier {
    pub fn classify(name: Option<&str>, article: Option<&str>) -> Self {
        match (name, article) {
            (Some(_), Some(_)) => StatusTier::Full,
            (None, Some(_)) => StatusTier::Partial,
            _ => StatusTier::Failed,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            StatusTier::Full => "✅",
            StatusTier::Partial => "⚠️",
            StatusTier::Failed => "❌",
        }
    }
}

pub const COMMENT_PHOTO_UNREADABLE: &str = "Фото нечитаемо";
pub const COMMENT_MARKING_UNREADABLE: &str = "Маркировка не читается";

/// 1枚の写真から得たマーキング記録
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkingRecord {
    /// 対応する写真のインデックス
    pub index: usize,
    pub file_name: String,
    pub name: Option<String>,
    pub article: Option<String>,
    pub dimensions: Option<String>,
    pub readable: bool,
    pub status_tier: StatusTier,
    #[serde(default)]
    pub comment: String,
}

impl MarkingRecord {
    /// 認識結果から記録を作る（空文字は欠損扱い）
    pub fn new(
        index: usize,
        file_name: impl Into<String>,
        name: Option<String>,
        article: Option<String>,
        dimensions: Option<String>,
    ) -> Self {
        let name = non_empty(name);
        let article = non_empty(article);
        let dimensions = non_empty(dimensions);

        let status_tier = StatusTier::classify(name.as_deref(), article.as_deref());
        let readable = status_tier != StatusTier::Failed;
        let comment = if readable {
            String::new()
        } else {
            COMMENT_MARKING_UNREADABLE.to_string()
        };

        Self {
            index,
            file_name: file_name.into(),
            name,
            article,
            dimensions,
            readable,
            status_tier,
            comment,
        }
    }

    pub fn failed(index: usize, file_name: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            index,
            file_name: file_name.into(),
            name: None,
            article: None,
            dimensions: None,
            readable: false,
            status_tier: StatusTier::Failed,
            comment: comment.into(),
        }
    }

    /// 集計キーとしての品番（前後空白除去、空ならNone）
    pub fn article_key(&self) -> Option<&str> {
        self.article
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// =============================================
// 仕様書と照合
// =============================================

/// 仕様書の1行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecificationItem {
    pub article: String,
    pub quantity: u32,
    pub name: Option<String>,
}

/// 計画と実績の差の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Match,
    Shortage,
    Excess,
    /// 仕様書にない品番
    Unplanned,
}

impl Classification {
    pub fn classify(difference: i64, in_specification: bool) -> Self {
        if !in_specification {
            return Classification::Unplanned;
        }
        match difference {
            0 => Classification::Match,
            d if d < 0 => Classification::Shortage,
            _ => Classification::Excess,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Classification::Match => "✅",
            Classification::Shortage => "⬇️",
            Classification::Excess => "⬆️",
            Classification::Unplanned => "🔁",
        }
    }

    /// 更新仕様書で赤塗りにする分類（超過と仕様外を区別しない）
    pub fn needs_review(&self) -> bool {
        matches!(self, Classification::Excess | Classification::Unplanned)
    }
}

/// 品番ごとの照合結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRecord {
    pub article: String,
    /// 仕様書上の名称（仕様外なら空）
    pub name: String,
    pub planned: u32,
    pub actual: u32,
    pub difference: i64,
    pub classification: Classification,
}

impl ComparisonRecord {
    pub fn new(
        article: impl Into<String>,
        name: impl Into<String>,
        planned: u32,
        actual: u32,
        in_specification: bool,
    ) -> Self {
        let difference = actual as i64 - planned as i64;
        Self {
            article: article.into(),
            name: name.into(),
            planned,
            actual,
            difference,
            classification: Classification::classify(difference, in_specification),
        }
    }
}
