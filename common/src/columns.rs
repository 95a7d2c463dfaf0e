//! 列ロールのキーワード設定
//!
//! 表のヘッダー文字列から「品番」「数量」などの意味的な列を見つけるための
//! キーワード表。分岐ではなくデータとして持ち、JSONで差し替えられる。

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// 列の意味的ロール
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Article,
    Quantity,
    Name,
    Unit,
    Area,
    Shipped,
    Date,
}

impl ColumnRole {
    pub const ALL: [ColumnRole; 7] = [
        ColumnRole::Article,
        ColumnRole::Quantity,
        ColumnRole::Name,
        ColumnRole::Unit,
        ColumnRole::Area,
        ColumnRole::Shipped,
        ColumnRole::Date,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnRole::Article => "article",
            ColumnRole::Quantity => "quantity",
            ColumnRole::Name => "name",
            ColumnRole::Unit => "unit",
            ColumnRole::Area => "area",
            ColumnRole::Shipped => "shipped",
            ColumnRole::Date => "date",
        }
    }
}

/// 1ロール分のキーワード
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleKeywords {
    pub role: ColumnRole,
    pub keywords: Vec<String>,
}

/// ロール → キーワード一覧
///
/// 並び順が優先順位。1つのヘッダーセルは最初に一致したロールにだけ割り当てる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnKeywords {
    pub roles: Vec<RoleKeywords>,
}

impl Default for ColumnKeywords {
    fn default() -> Self {
        fn entry(role: ColumnRole, words: &[&str]) -> RoleKeywords {
            RoleKeywords {
                role,
                keywords: words.iter().map(|w| w.to_string()).collect(),
            }
        }

        // 「Количество отгружено」は数量より出荷列として扱う
        Self {
            roles: vec![
                entry(ColumnRole::Shipped, &["отгружен", "отправлен", "shipped"]),
                entry(ColumnRole::Date, &["дата", "date"]),
                entry(ColumnRole::Name, &["наименование", "название", "name"]),
                entry(ColumnRole::Article, &["артикул", "код", "article"]),
                entry(ColumnRole::Quantity, &["количество", "кол-во", "qty", "quantity"]),
                entry(ColumnRole::Unit, &["ед.изм", "ед. изм", "единица", "unit"]),
                entry(ColumnRole::Area, &["площадь", "м²", "м2", "кв.м", "area"]),
            ],
        }
    }
}

impl ColumnKeywords {
    /// JSONファイルから読み込み
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// JSON文字列から読み込み
    ///
    /// 指定のないロールはデフォルトのキーワードで補う。
    pub fn from_json(json: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(json)?;
        if config.roles.iter().any(|r| r.keywords.is_empty()) {
            return Err(Error::Config("キーワードが空のロールがあります".into()));
        }

        for default in Self::default().roles {
            if !config.roles.iter().any(|r| r.role == default.role) {
                config.roles.push(default);
            }
        }
        for entry in &mut config.roles {
            entry.keywords = entry.keywords.iter().map(|k| k.to_lowercase()).collect();
        }
        Ok(config)
    }

    pub fn keywords(&self, role: ColumnRole) -> &[String] {
        self.roles
            .iter()
            .find(|r| r.role == role)
            .map(|r| r.keywords.as_slice())
            .unwrap_or(&[])
    }

    /// ヘッダー文字列が指定ロールのキーワードを含むか
    pub fn matches(&self, role: ColumnRole, header: &str) -> bool {
        let lower = header.to_lowercase();
        self.keywords(role).iter().any(|k| lower.contains(k.as_str()))
    }

    /// ヘッダー文字列が最初に一致するロール
    pub fn role_for(&self, header: &str) -> Option<ColumnRole> {
        let lower = header.to_lowercase();
        if lower.trim().is_empty() {
            return None;
        }
        self.roles
            .iter()
            .find(|r| r.keywords.iter().any(|k| lower.contains(k.as_str())))
            .map(|r| r.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_covers_all_roles() {
        let config = ColumnKeywords::default();
        for role in ColumnRole::ALL {
            assert!(!config.keywords(role).is_empty(), "no keywords for {:?}", role);
        }
    }

    #[test]
    fn test_role_for_headers() {
        let config = ColumnKeywords::default();
        assert_eq!(config.role_for("Артикул"), Some(ColumnRole::Article));
        assert_eq!(config.role_for("Кол-во, шт"), Some(ColumnRole::Quantity));
        assert_eq!(config.role_for("Наименование товара"), Some(ColumnRole::Name));
        assert_eq!(config.role_for("Ед. изм."), Some(ColumnRole::Unit));
        assert_eq!(config.role_for("Площадь, м²"), Some(ColumnRole::Area));
        assert_eq!(config.role_for("Отгружено"), Some(ColumnRole::Shipped));
        assert_eq!(config.role_for("Дата отгрузки"), Some(ColumnRole::Date));
        assert_eq!(config.role_for("Примечание"), None);
        assert_eq!(config.role_for(""), None);
    }

    #[test]
    fn test_shipped_wins_over_quantity() {
        let config = ColumnKeywords::default();
        assert_eq!(config.role_for("Количество отгружено"), Some(ColumnRole::Shipped));
    }

    #[test]
    fn test_from_json_fills_missing_roles() {
        let json = r#"{"roles": [{"role": "article", "keywords": ["SKU"]}]}"#;
        let config = ColumnKeywords::from_json(json).unwrap();
        assert_eq!(config.keywords(ColumnRole::Article), &["sku".to_string()]);
        assert!(config.matches(ColumnRole::Article, "Sku code"));
        assert!(config.matches(ColumnRole::Quantity, "Количество"));
    }

    #[test]
    fn test_from_json_rejects_empty_keywords() {
        let json = r#"{"roles": [{"role": "date", "keywords": []}]}"#;
        assert!(matches!(ColumnKeywords::from_json(json), Err(Error::Config(_))));
    }
}
