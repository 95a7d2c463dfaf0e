//! 寸法文字列から面積（m²）を求める
//!
//! 「500x300 мм」「1.2*0.8」のような自由記述から幅×高さを取り出す。
//! 単位付きパターンを先に試し、最初に一致したものを採用する。

use regex::Regex;

/// 単位なしでこの値を超える数値はmmとみなす
const PLAIN_UNIT_MM_THRESHOLD: f64 = 100.0;

lazy_static::lazy_static! {
    static ref SIZE_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(\d+(?:[.,]\d+)?)\s*[xх*]\s*(\d+(?:[.,]\d+)?)\s*мм").unwrap(),
        Regex::new(r"(\d+(?:[.,]\d+)?)\s*[xх*]\s*(\d+(?:[.,]\d+)?)\s*mm").unwrap(),
        Regex::new(r"(\d+(?:[.,]\d+)?)\s*[xх]\s*(\d+(?:[.,]\d+)?)").unwrap(),
        Regex::new(r"(\d+(?:[.,]\d+)?)\s*\*\s*(\d+(?:[.,]\d+)?)").unwrap(),
    ];
}

/// テキストから面積（m²、小数3桁）を求める。解析できなければ0.0
pub fn parse_area(text: &str) -> f64 {
    let lower = text.to_lowercase();

    for pattern in SIZE_PATTERNS.iter() {
        let Some(cap) = pattern.captures(&lower) else {
            continue;
        };
        let (Some(width), Some(height)) = (parse_number(&cap[1]), parse_number(&cap[2])) else {
            continue;
        };

        let explicit_mm = lower.contains("мм") || lower.contains("mm");
        let (width_m, height_m) =
            if explicit_mm || width > PLAIN_UNIT_MM_THRESHOLD || height > PLAIN_UNIT_MM_THRESHOLD {
                (width / 1000.0, height / 1000.0)
            } else {
                (width, height)
            };

        return round_to(width_m * height_m, 3);
    }

    0.0
}

/// 寸法と名称のうち最初に数値が取れる方から面積を求める
pub fn area_from_sources(sources: &[Option<&str>]) -> f64 {
    sources
        .iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
        .map(|s| parse_area(s))
        .unwrap_or(0.0)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse::<f64>().ok().filter(|v| v.is_finite())
}
