//! 仕様書との照合
//!
//! 仕様書の品番を出現順に並べ、そのあとに仕様書にない品番を
//! マーキングで最初に見つかった順に足す。

use crate::error::{ReconError, Result};
use crate::sheet::columns::{resolve_columns, resolve_header_row};
use crate::sheet::Grid;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use warehouse_recon_common::{
    Classification, ColumnKeywords, ColumnRole, ComparisonRecord, MarkingRecord, SpecificationItem,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub total_positions: usize,
    #[serde(rename = "match")]
    pub matched: usize,
    pub shortage: usize,
    pub excess: usize,
    pub unplanned: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub comparison: Vec<ComparisonRecord>,
    pub summary: ComparisonSummary,
}

/// 仕様書ファイルを読み込んで行を取り出す
pub fn parse_specification(path: &Path, keywords: &ColumnKeywords) -> Result<Vec<SpecificationItem>> {
    if !path.is_file() {
        return Err(ReconError::SpecificationNotFound(path.display().to_string()));
    }
    let grid = Grid::load(path)?;
    parse_specification_grid(&grid, keywords)
}

/// 品番・数量列は必須。品番が空の行や数量が数値でない行は読み飛ばす
pub fn parse_specification_grid(grid: &Grid, keywords: &ColumnKeywords) -> Result<Vec<SpecificationItem>> {
    let header_row = resolve_header_row(grid, keywords, &[ColumnRole::Name, ColumnRole::Article]);
    let columns = resolve_columns(grid, header_row, keywords);

    let (article_col, quantity_col) = match (columns.get(ColumnRole::Article), columns.get(ColumnRole::Quantity)) {
        (Some(a), Some(q)) => (a, q),
        _ => {
            return Err(ReconError::SpecificationParse(
                "品番列または数量列が見つかりません".into(),
            ))
        }
    };
    let name_col = columns.get(ColumnRole::Name);

    let mut items = Vec::new();
    let Some(last_row) = grid.max_row() else {
        return Ok(items);
    };

    for row in (header_row + 1)..=last_row {
        let article = grid.text(row, article_col).trim().to_string();
        if article.is_empty() {
            continue;
        }

        let quantity = match grid.get(row, quantity_col).as_number() {
            Some(q) if q.is_finite() && q >= 0.0 => q.trunc() as u32,
            _ => {
                tracing::warn!(row = row + 1, article = %article, "数量が読めない行をスキップ");
                continue;
            }
        };

        let name = name_col
            .map(|col| grid.text(row, col).trim().to_string())
            .filter(|n| !n.is_empty());

        items.push(SpecificationItem { article, quantity, name });
    }

    tracing::debug!(items = items.len(), header_row, "仕様書を読み込みました");
    Ok(items)
}

/// 計画と実績を照合する
///
/// 実績は読み取れた記録のうち品番があるものだけを数える。
/// 仕様書で品番が重複する場合、位置は最初の行、数量と名称は最後の行を使う。
pub fn compare(specification: &[SpecificationItem], markings: &[MarkingRecord]) -> ComparisonReport {
    let mut actual_order: Vec<&str> = Vec::new();
    let mut actual: HashMap<&str, u32> = HashMap::new();
    for article in markings.iter().filter(|m| m.readable).filter_map(|m| m.article_key()) {
        let count = actual.entry(article).or_insert_with(|| {
            actual_order.push(article);
            0
        });
        *count += 1;
    }

    let mut planned_order: Vec<&str> = Vec::new();
    let mut planned: HashMap<&str, &SpecificationItem> = HashMap::new();
    for item in specification {
        let article = item.article.trim();
        if planned.insert(article, item).is_none() {
            planned_order.push(article);
        }
    }

    let mut comparison = Vec::with_capacity(planned_order.len() + actual_order.len());
    for article in &planned_order {
        let item = planned[article];
        let name = item.name.clone().unwrap_or_default();
        let got = actual.get(article).copied().unwrap_or(0);
        comparison.push(ComparisonRecord::new(*article, name, item.quantity, got, true));
    }
    for article in actual_order.iter().filter(|a| !planned.contains_key(*a)) {
        comparison.push(ComparisonRecord::new(*article, "", 0, actual[article], false));
    }

    let tally = |c: Classification| comparison.iter().filter(|r| r.classification == c).count();
    let summary = ComparisonSummary {
        total_positions: comparison.len(),
        matched: tally(Classification::Match),
        shortage: tally(Classification::Shortage),
        excess: tally(Classification::Excess),
        unplanned: tally(Classification::Unplanned),
    };

    ComparisonReport { comparison, summary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::CellValue;

    fn t(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn n(v: f64) -> CellValue {
        CellValue::Number(v)
    }

    fn item(article: &str, quantity: u32) -> SpecificationItem {
        SpecificationItem {
            article: article.into(),
            quantity,
            name: Some(format!("Изделие {}", article)),
        }
    }

    fn markings(articles: &[&str]) -> Vec<MarkingRecord> {
        articles
            .iter()
            .enumerate()
            .map(|(i, a)| MarkingRecord::new(i, format!("p{}.jpg", i), None, Some(a.to_string()), None))
            .collect()
    }

    fn repeat(article: &str, times: usize) -> Vec<&str> {
        std::iter::repeat(article).take(times).collect()
    }

    #[test]
    fn test_match_excess_unplanned() {
        let spec = vec![item("A1", 10), item("A2", 5)];
        let mut observed = repeat("A1", 10);
        observed.extend(repeat("A2", 7));
        observed.extend(repeat("A3", 2));

        let report = compare(&spec, &markings(&observed));
        let rows: Vec<(&str, Classification, i64)> = report
            .comparison
            .iter()
            .map(|r| (r.article.as_str(), r.classification, r.difference))
            .collect();

        assert_eq!(
            rows,
            vec![
                ("A1", Classification::Match, 0),
                ("A2", Classification::Excess, 2),
                ("A3", Classification::Unplanned, 2),
            ]
        );
        assert_eq!(
            report.summary,
            ComparisonSummary { total_positions: 3, matched: 1, shortage: 0, excess: 1, unplanned: 1 }
        );
        assert_eq!(report.comparison[2].planned, 0);
        assert_eq!(report.comparison[2].name, "");
    }

    #[test]
    fn test_shortage_and_absent() {
        let spec = vec![item("A1", 3), item("B", 1)];
        let report = compare(&spec, &markings(&["A1"]));
        assert_eq!(report.comparison[0].classification, Classification::Shortage);
        assert_eq!(report.comparison[0].difference, -2);
        assert_eq!(report.comparison[1].actual, 0);
        assert_eq!(report.comparison[1].classification, Classification::Shortage);
    }

    #[test]
    fn test_unreadable_records_not_counted() {
        let spec = vec![item("A1", 1)];
        let mut records = markings(&["A1"]);
        // 名称だけの記録（品番なし）
        records.push(MarkingRecord::new(1, "p1.jpg", Some("Плита".into()), None, None));
        let report = compare(&spec, &records);
        assert_eq!(report.comparison.len(), 1);
        assert_eq!(report.comparison[0].actual, 1);
    }

    #[test]
    fn test_duplicate_spec_article_position_first_quantity_last() {
        let spec = vec![item("A1", 1), item("B", 2), item("A1", 4)];
        let report = compare(&spec, &markings(&repeat("A1", 4)));
        assert_eq!(report.comparison.len(), 2);
        assert_eq!(report.comparison[0].article, "A1");
        assert_eq!(report.comparison[0].planned, 4);
        assert_eq!(report.comparison[0].classification, Classification::Match);
    }

    #[test]
    fn test_unplanned_in_first_seen_order() {
        let report = compare(&[], &markings(&["Z", "Y", "Z", "X"]));
        let order: Vec<&str> = report.comparison.iter().map(|r| r.article.as_str()).collect();
        assert_eq!(order, vec!["Z", "Y", "X"]);
        assert_eq!(report.comparison[0].actual, 2);
    }

    #[test]
    fn test_compare_is_deterministic() {
        let spec = vec![item("A1", 2), item("A2", 1)];
        let records = markings(&["C", "A1", "B", "A2", "C"]);
        assert_eq!(compare(&spec, &records), compare(&spec, &records));
    }

    #[test]
    fn test_parse_specification_grid() {
        let grid = Grid::from_rows(
            "Лист1",
            vec![
                vec![t("Спецификация поставки")],
                vec![t("Артикул"), t("Наименование"), t("Количество")],
                vec![n(12345.0), t("Плита 600x400"), n(10.0)],
                vec![t("A2"), t(""), t("5")],
                vec![t(""), t("Итого"), n(15.0)],
                vec![t("A3"), t("Брус"), t("много")],
            ],
        );
        let items = parse_specification_grid(&grid, &ColumnKeywords::default()).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].article, "12345");
        assert_eq!(items[0].quantity, 10);
        assert_eq!(items[0].name.as_deref(), Some("Плита 600x400"));
        assert_eq!(items[1].article, "A2");
        assert_eq!(items[1].quantity, 5);
        assert_eq!(items[1].name, None);
    }

    #[test]
    fn test_parse_specification_requires_columns() {
        let grid = Grid::from_rows("s", vec![vec![t("Артикул"), t("Цена")], vec![t("A1"), n(1.0)]]);
        let result = parse_specification_grid(&grid, &ColumnKeywords::default());
        assert!(matches!(result, Err(ReconError::SpecificationParse(_))));
    }

    #[test]
    fn test_parse_specification_missing_file() {
        let result = parse_specification(Path::new("/nonexistent/spec.xlsx"), &ColumnKeywords::default());
        assert!(matches!(result, Err(ReconError::SpecificationNotFound(_))));
    }
}
