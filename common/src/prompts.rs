//! プロンプト生成モジュール
//!
//! マーキング認識用のプロンプト。モデルの回答言語を揃えるため
//! 本文はロシア語で保持する。

/// 認識結果として期待するJSONキー
pub const MARKING_FIELDS: &[&str] = &["name", "article", "dimensions"];

/// マーキング認識プロンプト生成
///
/// 読めない場合は `error` フィールド付きのJSONを返すよう指示する。
pub fn build_marking_prompt() -> String {
    let fields = MARKING_FIELDS
        .iter()
        .map(|f| format!("\"{}\"", f))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"Распознай маркировку на фото.
Верни результат СТРОГО в формате JSON:
{{
    "name": "наименование товара",
    "article": "артикул",
    "dimensions": "размеры"
}}

Если маркировка не читается или фото нечеткое, верни:
{{
    "name": null,
    "article": null,
    "dimensions": null,
    "error": "описание проблемы"
}}

Ключи ответа: {fields}.
Важно: отвечай ТОЛЬКО JSON без дополнительного текста."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_mentions_all_fields() {
        let prompt = build_marking_prompt();
        for field in MARKING_FIELDS {
            assert!(prompt.contains(field), "missing field {}", field);
        }
        assert!(prompt.contains("\"error\""));
        assert!(prompt.contains("ТОЛЬКО JSON"));
    }
}
