//! ヘッダー行と列の特定
//!
//! 表のレイアウトは毎回違うので、先頭数行からキーワードでヘッダー行を探し、
//! そこから列ロールを割り当てる。

use super::Grid;
use crate::error::{ReconError, Result};
use std::collections::HashMap;
use warehouse_recon_common::{ColumnKeywords, ColumnRole};

/// ヘッダー行を探す範囲
pub const HEADER_SCAN_ROWS: u32 = 10;

/// 先頭10行から、マーカーロールのキーワードを含むセルがある最初の行を返す。
/// 見つからなければ0行目
pub fn resolve_header_row(grid: &Grid, keywords: &ColumnKeywords, markers: &[ColumnRole]) -> u32 {
    for row in 0..HEADER_SCAN_ROWS {
        let found = grid.row_cells(row).any(|(_, cell)| {
            let text = cell.as_text();
            markers.iter().any(|role| keywords.matches(*role, &text))
        });
        if found {
            return row;
        }
    }
    0
}

/// ロール → 列番号
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: HashMap<ColumnRole, u16>,
}

impl ColumnMap {
    pub fn get(&self, role: ColumnRole) -> Option<u16> {
        self.columns.get(&role).copied()
    }

    /// 見つからなければ ColumnNotFound
    pub fn require(&self, role: ColumnRole) -> Result<u16> {
        self.get(role)
            .ok_or_else(|| ReconError::ColumnNotFound(role.as_str().to_string()))
    }

    pub fn insert(&mut self, role: ColumnRole, col: u16) {
        self.columns.insert(role, col);
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// ロールの定義順に並べた一覧
    pub fn entries(&self) -> Vec<(ColumnRole, u16)> {
        ColumnRole::ALL
            .iter()
            .filter_map(|role| self.get(*role).map(|col| (*role, col)))
            .collect()
    }
}

/// ヘッダー行の各セルをロールに割り当てる
///
/// 1セルは設定順で最初に一致したロールに割り当て、同じロールに
/// 複数の列が一致した場合は左側の列を使う。
pub fn resolve_columns(grid: &Grid, header_row: u32, keywords: &ColumnKeywords) -> ColumnMap {
    let mut map = ColumnMap::default();
    for (col, cell) in grid.row_cells(header_row) {
        if let Some(role) = keywords.role_for(&cell.as_text()) {
            map.columns.entry(role).or_insert(col);
        }
    }
    tracing::debug!(header_row, resolved = map.len(), "列を特定");
    map
}

/// ロールの列がなければ右端の次に追加してヘッダーを書く
pub fn ensure_column(
    grid: &mut Grid,
    header_row: u32,
    columns: &mut ColumnMap,
    role: ColumnRole,
    label: &str,
) -> u16 {
    if let Some(col) = columns.get(role) {
        return col;
    }

    let col = grid.max_col().map(|c| c + 1).unwrap_or(0);
    grid.set(header_row, col, label);
    columns.insert(role, col);
    tracing::info!(role = role.as_str(), col, label, "列を追加");
    col
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::CellValue;

    fn t(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn spec_grid() -> Grid {
        Grid::from_rows(
            "Спецификация",
            vec![
                vec![t("Спецификация №12")],
                vec![t("к договору поставки")],
                vec![t("№"), t("Артикул"), t("Наименование"), t("Кол-во")],
                vec![t("1"), t("A1"), t("Плита"), CellValue::Number(10.0)],
            ],
        )
    }

    #[test]
    fn test_resolve_header_row_by_name_marker() {
        let grid = spec_grid();
        let keywords = ColumnKeywords::default();
        assert_eq!(resolve_header_row(&grid, &keywords, &[ColumnRole::Name]), 2);
    }

    #[test]
    fn test_resolve_header_row_defaults_to_zero() {
        let grid = Grid::from_rows("s", vec![vec![t("foo")], vec![t("bar")]]);
        let keywords = ColumnKeywords::default();
        assert_eq!(resolve_header_row(&grid, &keywords, &[ColumnRole::Name]), 0);
    }

    #[test]
    fn test_resolve_header_row_ignores_rows_past_scan_limit() {
        let mut grid = Grid::new("s");
        grid.set(HEADER_SCAN_ROWS, 0, "Наименование");
        let keywords = ColumnKeywords::default();
        assert_eq!(resolve_header_row(&grid, &keywords, &[ColumnRole::Name]), 0);
    }

    #[test]
    fn test_resolve_columns() {
        let grid = spec_grid();
        let keywords = ColumnKeywords::default();
        let columns = resolve_columns(&grid, 2, &keywords);

        assert_eq!(columns.get(ColumnRole::Article), Some(1));
        assert_eq!(columns.get(ColumnRole::Name), Some(2));
        assert_eq!(columns.get(ColumnRole::Quantity), Some(3));
        assert_eq!(columns.get(ColumnRole::Area), None);
        assert!(matches!(
            columns.require(ColumnRole::Shipped),
            Err(ReconError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_first_matching_column_wins() {
        let grid = Grid::from_rows(
            "s",
            vec![vec![t("Код товара"), t("Артикул поставщика")]],
        );
        let columns = resolve_columns(&grid, 0, &ColumnKeywords::default());
        assert_eq!(columns.get(ColumnRole::Article), Some(0));
        assert_eq!(columns.len(), 1);
    }

    #[test]
    fn test_shipped_quantity_header_not_taken_as_quantity() {
        let grid = Grid::from_rows(
            "s",
            vec![vec![t("Количество отгружено"), t("Количество")]],
        );
        let columns = resolve_columns(&grid, 0, &ColumnKeywords::default());
        assert_eq!(columns.get(ColumnRole::Shipped), Some(0));
        assert_eq!(columns.get(ColumnRole::Quantity), Some(1));
    }

    #[test]
    fn test_ensure_column_appends_after_last_used() {
        let mut grid = spec_grid();
        let keywords = ColumnKeywords::default();
        let mut columns = resolve_columns(&grid, 2, &keywords);

        let shipped = ensure_column(&mut grid, 2, &mut columns, ColumnRole::Shipped, "Отгруженные");
        assert_eq!(shipped, 4);
        assert_eq!(grid.text(2, 4), "Отгруженные");

        let date = ensure_column(&mut grid, 2, &mut columns, ColumnRole::Date, "Дата отгрузки");
        assert_eq!(date, 5);

        // 既存の列はそのまま返す
        let again = ensure_column(&mut grid, 2, &mut columns, ColumnRole::Shipped, "x");
        assert_eq!(again, 4);
        assert_eq!(grid.text(2, 4), "Отгруженные");
        assert_eq!(grid.text(3, 3), "10");
    }

    #[test]
    fn test_ensure_column_on_empty_grid() {
        let mut grid = Grid::new("s");
        let mut columns = ColumnMap::default();
        let col = ensure_column(&mut grid, 0, &mut columns, ColumnRole::Date, "Дата отгрузки");
        assert_eq!(col, 0);
        assert_eq!(columns.entries(), vec![(ColumnRole::Date, 0)]);
    }
}
