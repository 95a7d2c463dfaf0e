//! 認識APIレスポンスパーサー
//!
//! モデルの返答テキストからJSONオブジェクトを取り出し、
//! RecognizedMarking に変換する

use crate::error::{Error, Result};
use crate::types::RecognizedMarking;

/// レスポンスからJSONオブジェクト部分を抽出
///
/// 抽出優先順位:
/// 1. ```json ... ``` ブロック
/// 2. 最初の `{` から最後の `}` まで
/// 3. エラー
///
/// # Examples
/// ```
/// use warehouse_recon_common::extract_json_object;
///
/// let response = "Результат: {\"article\": \"A1\"}";
/// let json = extract_json_object(response).unwrap();
/// assert_eq!(json, "{\"article\": \"A1\"}");
/// ```
pub fn extract_json_object(response: &str) -> Result<&str> {
    if let Some(start_marker) = response.find("```json") {
        let start = start_marker + 7; // "```json" の長さ
        if let Some(end_offset) = response[start..].find("```") {
            let end = start + end_offset;
            return Ok(response[start..end].trim());
        }
    }

    if let Some(start) = response.find('{') {
        if let Some(end) = response.rfind('}') {
            if end >= start {
                return Ok(&response[start..=end]);
            }
        }
    }

    Err(Error::Parse("JSONが見つかりません".into()))
}

/// マーキング認識レスポンスをパース
///
/// 配列で返ってきた場合は先頭要素を採用する。
pub fn parse_marking_response(response: &str) -> Result<RecognizedMarking> {
    let trimmed = response.trim();

    if trimmed.starts_with('[') {
        let list: Vec<RecognizedMarking> = serde_json::from_str(trimmed)
            .map_err(|e| Error::Parse(format!("マーキング JSONパースエラー: {}", e)))?;
        return list
            .into_iter()
            .next()
            .ok_or_else(|| Error::Parse("空の配列が返されました".into()));
    }

    let json_str = extract_json_object(trimmed)?;
    serde_json::from_str(json_str.trim())
        .map_err(|e| Error::Parse(format!("マーキング JSONパースエラー: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_with_block() {
        let response = r#"Вот результат:
```json
{"name": "Плита", "article": "A1"}
```
"#;
        let json = extract_json_object(response).unwrap();
        assert!(json.starts_with('{'));
        assert!(json.contains("Плита"));
    }

    #[test]
    fn test_extract_json_error() {
        let result = extract_json_object("маркировка не видна");
        assert!(result.is_err());
        if let Err(Error::Parse(msg)) = result {
            assert!(msg.contains("JSONが見つかりません"));
        } else {
            panic!("Expected Parse error");
        }
    }

    #[test]
    fn test_parse_marking_full() {
        let response = r#"{"name": "Панель стеновая", "article": "ПС-12", "dimensions": "1200x600 мм"}"#;
        let marking = parse_marking_response(response).unwrap();
        assert_eq!(marking.name.as_deref(), Some("Панель стеновая"));
        assert_eq!(marking.article.as_deref(), Some("ПС-12"));
        assert_eq!(marking.dimensions.as_deref(), Some("1200x600 мм"));
        assert_eq!(marking.error, None);
    }

    #[test]
    fn test_parse_marking_with_error_field() {
        let response = r#"{"name": null, "article": null, "dimensions": null, "error": "фото нечеткое"}"#;
        let marking = parse_marking_response(response).unwrap();
        assert_eq!(marking.error.as_deref(), Some("фото нечеткое"));
        assert_eq!(marking.article, None);
    }

    #[test]
    fn test_parse_marking_array_takes_first() {
        let response = r#"[{"article": "A1"}, {"article": "A2"}]"#;
        let marking = parse_marking_response(response).unwrap();
        assert_eq!(marking.article.as_deref(), Some("A1"));
    }

    #[test]
    fn test_parse_marking_empty_array() {
        assert!(parse_marking_response("[]").is_err());
    }

    #[test]
    fn test_parse_marking_malformed() {
        let result = parse_marking_response("{name: Плита");
        assert!(matches!(result, Err(Error::Parse(_))));
    }
}
