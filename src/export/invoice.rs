//! 納品書テンプレートへの記入

use crate::dimensions::{area_from_sources, round_to};
use crate::sheet::columns::{resolve_columns, resolve_header_row, ColumnMap};
use crate::sheet::Grid;
use warehouse_recon_common::{ColumnKeywords, ColumnRole, ComparisonRecord, MarkingRecord};

pub const INVOICE_PREFIX: &str = "Накладная_заполненная";
pub const UNIT_PIECES: &str = "шт";

/// 実績のある品番を照合順に1行ずつ書く。書いた行数を返す
pub fn fill_invoice(
    grid: &mut Grid,
    comparison: &[ComparisonRecord],
    markings: &[MarkingRecord],
    keywords: &ColumnKeywords,
) -> usize {
    let header_row = resolve_header_row(grid, keywords, &[ColumnRole::Name]);
    let columns = resolve_columns(grid, header_row, keywords);

    let name_col = column_or_warn(&columns, ColumnRole::Name);
    let unit_col = column_or_warn(&columns, ColumnRole::Unit);
    let quantity_col = column_or_warn(&columns, ColumnRole::Quantity);
    let area_col = columns.get(ColumnRole::Area);

    let mut row = header_row + 1;
    let mut written = 0;

    for item in comparison.iter().filter(|c| c.actual > 0) {
        written += 1;
        grid.set(row, 0, written);

        if let Some(col) = name_col {
            grid.set(row, col, display_name(item, markings));
        }
        if let Some(col) = unit_col {
            grid.set(row, col, UNIT_PIECES);
        }
        if let Some(col) = quantity_col {
            grid.set(row, col, item.actual);
        }
        if let Some(col) = area_col {
            let dimensions = markings_for(markings, &item.article).find_map(|m| m.dimensions.as_deref());
            let name = Some(item.name.as_str()).filter(|n| !n.trim().is_empty());
            let per_item = area_from_sources(&[dimensions, name, Some(item.article.as_str())]);
            let total = per_item * item.actual as f64;
            if total > 0.0 {
                grid.set(row, col, round_to(total, 2));
            }
        }

        row += 1;
    }

    tracing::info!(rows = written, header_row, "納品書に記入しました");
    written
}

/// 名称: マーキングの名称 → 仕様書の名称 → 品番
fn display_name(item: &ComparisonRecord, markings: &[MarkingRecord]) -> String {
    markings_for(markings, &item.article)
        .find_map(|m| m.name.clone())
        .or_else(|| Some(item.name.clone()).filter(|n| !n.trim().is_empty()))
        .unwrap_or_else(|| item.article.clone())
}

fn markings_for<'a>(markings: &'a [MarkingRecord], article: &'a str) -> impl Iterator<Item = &'a MarkingRecord> {
    markings.iter().filter(move |m| m.article_key() == Some(article))
}

fn column_or_warn(columns: &ColumnMap, role: ColumnRole) -> Option<u16> {
    match columns.require(role) {
        Ok(col) => Some(col),
        Err(e) => {
            tracing::warn!(error = %e, "納品書の列がないため記入を省略");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::CellValue;

    fn t(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn template() -> Grid {
        Grid::from_rows(
            "ТОРГ-12",
            vec![
                vec![t("Товарная накладная")],
                vec![t("№"), t("Наименование"), t("Ед. изм."), t("Кол-во"), t("Площадь, м²")],
            ],
        )
    }

    fn marking(index: usize, name: Option<&str>, article: &str, dims: Option<&str>) -> MarkingRecord {
        MarkingRecord::new(
            index,
            format!("p{}.jpg", index),
            name.map(String::from),
            Some(article.to_string()),
            dims.map(String::from),
        )
    }

    #[test]
    fn test_fill_invoice_rows() {
        let mut grid = template();
        let comparison = vec![
            ComparisonRecord::new("A1", "Плита из спецификации", 2, 2, true),
            ComparisonRecord::new("A2", "Нет на складе", 3, 0, true),
            ComparisonRecord::new("A3", "", 0, 3, false),
        ];
        let markings = vec![
            marking(0, None, "A1", None),
            marking(1, Some("Плита 500x300 мм"), "A1", None),
            marking(2, None, "A3", Some("1000x500")),
        ];

        let rows = fill_invoice(&mut grid, &comparison, &markings, &ColumnKeywords::default());
        assert_eq!(rows, 2);

        // A1
        assert_eq!(grid.get(2, 0), &CellValue::Number(1.0));
        assert_eq!(grid.text(2, 1), "Плита 500x300 мм");
        assert_eq!(grid.text(2, 2), "шт");
        assert_eq!(grid.get(2, 3), &CellValue::Number(2.0));
        // 寸法なし、仕様書の名称にも数値なし
        assert_eq!(grid.get(2, 4), &CellValue::Empty);

        // A3: 名称がないので品番、面積は寸法から 0.5 * 3
        assert_eq!(grid.get(3, 0), &CellValue::Number(2.0));
        assert_eq!(grid.text(3, 1), "A3");
        assert_eq!(grid.get(3, 4), &CellValue::Number(1.5));

        assert_eq!(grid.max_row(), Some(3));
    }

    #[test]
    fn test_area_from_specification_name() {
        let mut grid = template();
        let comparison = vec![ComparisonRecord::new("B7", "Панель 600x400", 4, 4, true)];
        fill_invoice(&mut grid, &comparison, &[marking(0, None, "B7", None)], &ColumnKeywords::default());

        assert_eq!(grid.text(2, 1), "Панель 600x400");
        assert_eq!(grid.get(2, 4), &CellValue::Number(0.96));
    }

    #[test]
    fn test_missing_columns_are_skipped() {
        let mut grid = Grid::from_rows("s", vec![vec![t("Наименование")]]);
        let comparison = vec![ComparisonRecord::new("A1", "", 0, 1, false)];
        let rows = fill_invoice(&mut grid, &comparison, &[], &ColumnKeywords::default());

        assert_eq!(rows, 1);
        // 番号が名称列（A列）を上書きしたあと名称を書く
        assert_eq!(grid.text(1, 0), "A1");
        assert_eq!(grid.max_col(), Some(0));
    }
}
