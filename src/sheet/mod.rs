//! 表計算ファイルの読み書き
//!
//! calamineで先頭シートをメモリ上の Grid に読み込み、
//! セル更新・塗りつぶしを行ったうえで rust_xlsxwriter で書き出す。
//! テンプレートのセル書式は引き継がない（値と強調表示のみ）。
//! 日付セルは日付のまま書き戻す。

pub mod columns;

use crate::error::{ReconError, Result};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use rust_xlsxwriter::{Color, Format, FormatPattern, Workbook};
use std::collections::BTreeMap;
use std::path::Path;

/// 要確認セルの塗りつぶし色（赤）
pub const REVIEW_FILL: u32 = 0xFF0000;

const DATE_FORMAT: &str = "dd.mm.yyyy";
const DATETIME_FORMAT: &str = "dd.mm.yyyy hh:mm";

/// セルの値
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Excelのシリアル値（1900年方式）
    DateTime(f64),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// 表示用テキスト（整数の数値は小数点なし）
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::DateTime(serial) => match serial_to_datetime(*serial) {
                Some(dt) if dt.num_seconds_from_midnight() == 0 => dt.format("%d.%m.%Y").to_string(),
                Some(dt) => dt.format("%d.%m.%Y %H:%M").to_string(),
                None => CellValue::Number(*serial).as_text(),
            },
        }
    }

    /// 数値として読む（数字だけの文字列も受け付ける）
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) | CellValue::DateTime(n) => Some(*n),
            CellValue::Text(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
            _ => None,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<u32> for CellValue {
    fn from(value: u32) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<usize> for CellValue {
    fn from(value: usize) -> Self {
        CellValue::Number(value as f64)
    }
}

fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial * 86_400.0).round() as i64;
    epoch.checked_add_signed(TimeDelta::try_seconds(seconds)?)
}

static EMPTY: CellValue = CellValue::Empty;

/// 1シート分のセル（0始まりの行・列）
#[derive(Debug, Clone, Default)]
pub struct Grid {
    name: String,
    cells: BTreeMap<(u32, u16), CellValue>,
    highlights: BTreeMap<(u32, u16), u32>,
}

impl Grid {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// 行の配列から作る
    pub fn from_rows(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let mut grid = Self::new(name);
        for (r, row) in rows.into_iter().enumerate() {
            for (c, value) in row.into_iter().enumerate() {
                grid.set(r as u32, c as u16, value);
            }
        }
        grid
    }

    /// ファイルの先頭シートを読み込む（xlsx/xls/ods）
    pub fn load(path: &Path) -> Result<Self> {
        let mut workbook = open_workbook_auto(path)
            .map_err(|e| ReconError::Spreadsheet(format!("{}: {}", path.display(), e)))?;

        let sheet_names = workbook.sheet_names();
        let sheet_name = sheet_names
            .first()
            .cloned()
            .ok_or_else(|| ReconError::Spreadsheet(format!("シートがありません: {}", path.display())))?;
        if sheet_names.len() > 1 {
            tracing::warn!(
                path = %path.display(),
                sheet = sheet_name.as_str(),
                dropped = ?&sheet_names[1..],
                "先頭シート以外は書き出し時に引き継がれません"
            );
        }

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| ReconError::Spreadsheet(format!("シート '{}' 読み込みエラー: {}", sheet_name, e)))?;

        let mut grid = Self::new(sheet_name);

        // データがA1から始まるとは限らない
        let (start_row, start_col) = range.start().unwrap_or((0, 0));

        for (row_idx, row) in range.rows().enumerate() {
            for (col_idx, cell) in row.iter().enumerate() {
                let value = match cell {
                    Data::Empty => continue,
                    Data::String(s) => CellValue::Text(s.clone()),
                    Data::Float(n) => CellValue::Number(*n),
                    Data::Int(n) => CellValue::Number(*n as f64),
                    Data::Bool(b) => CellValue::Bool(*b),
                    Data::DateTime(dt) => CellValue::DateTime(dt.as_f64()),
                    other => CellValue::Text(other.to_string()),
                };
                let r = start_row + row_idx as u32;
                let c = (start_col as usize + col_idx) as u16;
                grid.set(r, c, value);
            }
        }

        tracing::debug!(path = %path.display(), cells = grid.cells.len(), "シート読み込み完了");
        Ok(grid)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, row: u32, col: u16) -> &CellValue {
        self.cells.get(&(row, col)).unwrap_or(&EMPTY)
    }

    pub fn text(&self, row: u32, col: u16) -> String {
        self.get(row, col).as_text()
    }

    pub fn set(&mut self, row: u32, col: u16, value: impl Into<CellValue>) {
        let value = value.into();
        if value == CellValue::Empty {
            self.cells.remove(&(row, col));
        } else {
            self.cells.insert((row, col), value);
        }
    }

    /// セルを塗りつぶす（RGB）
    pub fn highlight(&mut self, row: u32, col: u16, rgb: u32) {
        self.highlights.insert((row, col), rgb);
    }

    pub fn highlight_at(&self, row: u32, col: u16) -> Option<u32> {
        self.highlights.get(&(row, col)).copied()
    }

    /// 使用中の最大行（空ならNone）
    pub fn max_row(&self) -> Option<u32> {
        self.cells.keys().map(|(r, _)| *r).max()
    }

    /// 使用中の最大列（空ならNone）
    pub fn max_col(&self) -> Option<u16> {
        self.cells.keys().map(|(_, c)| *c).max()
    }

    /// 指定行の値があるセル（列順）
    pub fn row_cells(&self, row: u32) -> impl Iterator<Item = (u16, &CellValue)> {
        self.cells
            .range((row, 0)..=(row, u16::MAX))
            .map(|((_, c), v)| (*c, v))
    }

    /// xlsxとして保存
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        if !self.name.is_empty() {
            worksheet
                .set_name(&self.name)
                .map_err(|e| ReconError::Spreadsheet(format!("シート名設定エラー: {}", e)))?;
        }

        let fill_format = |rgb: u32| {
            Format::new()
                .set_background_color(Color::RGB(rgb))
                .set_pattern(FormatPattern::Solid)
        };
        let date_format = |serial: f64, highlight: Option<u32>| {
            let base = match highlight {
                Some(rgb) => fill_format(rgb),
                None => Format::new(),
            };
            if serial.fract() == 0.0 {
                base.set_num_format(DATE_FORMAT)
            } else {
                base.set_num_format(DATETIME_FORMAT)
            }
        };

        for (&(row, col), value) in &self.cells {
            let written = match (value, self.highlight_at(row, col)) {
                (CellValue::Text(s), Some(rgb)) => worksheet.write_string_with_format(row, col, s, &fill_format(rgb)),
                (CellValue::Text(s), None) => worksheet.write_string(row, col, s),
                (CellValue::Number(n), Some(rgb)) => worksheet.write_number_with_format(row, col, *n, &fill_format(rgb)),
                (CellValue::Number(n), None) => worksheet.write_number(row, col, *n),
                (CellValue::Bool(b), Some(rgb)) => worksheet.write_boolean_with_format(row, col, *b, &fill_format(rgb)),
                (CellValue::Bool(b), None) => worksheet.write_boolean(row, col, *b),
                (CellValue::DateTime(n), highlight) => {
                    worksheet.write_number_with_format(row, col, *n, &date_format(*n, highlight))
                }
                (CellValue::Empty, _) => continue,
            };
            written.map_err(|e| ReconError::Spreadsheet(format!("セル({}, {})書き込みエラー: {}", row, col, e)))?;
        }

        // 値のないセルの塗りつぶし
        for (&(row, col), &rgb) in &self.highlights {
            if !self.cells.contains_key(&(row, col)) {
                worksheet
                    .write_blank(row, col, &fill_format(rgb))
                    .map_err(|e| ReconError::Spreadsheet(format!("セル({}, {})書き込みエラー: {}", row, col, e)))?;
            }
        }

        workbook
            .save(path)
            .map_err(|e| ReconError::Spreadsheet(format!("保存エラー {}: {}", path.display(), e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_cell_value_text() {
        assert_eq!(CellValue::Number(12345.0).as_text(), "12345");
        assert_eq!(CellValue::Number(1.5).as_text(), "1.5");
        assert_eq!(CellValue::Bool(true).as_text(), "TRUE");
        assert_eq!(CellValue::Empty.as_text(), "");
        assert_eq!(CellValue::DateTime(45366.0).as_text(), "15.03.2024");
        assert_eq!(CellValue::DateTime(45366.5).as_text(), "15.03.2024 12:00");
    }

    #[test]
    fn test_cell_value_number() {
        assert_eq!(CellValue::Number(3.0).as_number(), Some(3.0));
        assert_eq!(text(" 7 ").as_number(), Some(7.0));
        assert_eq!(text("2,5").as_number(), Some(2.5));
        assert_eq!(text("много").as_number(), None);
        assert_eq!(CellValue::Empty.as_number(), None);
        assert_eq!(CellValue::DateTime(45366.0).as_number(), Some(45366.0));
    }

    #[test]
    fn test_grid_set_and_bounds() {
        let mut grid = Grid::new("Лист1");
        assert_eq!(grid.max_row(), None);
        assert_eq!(grid.max_col(), None);

        grid.set(2, 4, "x");
        grid.set(5, 1, 3.0);
        assert_eq!(grid.max_row(), Some(5));
        assert_eq!(grid.max_col(), Some(4));

        grid.set(2, 4, CellValue::Empty);
        assert_eq!(grid.max_col(), Some(1));
        assert_eq!(grid.get(2, 4), &CellValue::Empty);
    }

    #[test]
    fn test_row_cells_in_column_order() {
        let grid = Grid::from_rows(
            "s",
            vec![
                vec![text("a"), CellValue::Empty, text("c")],
                vec![text("d")],
            ],
        );
        let row0: Vec<(u16, String)> = grid.row_cells(0).map(|(c, v)| (c, v.as_text())).collect();
        assert_eq!(row0, vec![(0, "a".to_string()), (2, "c".to_string())]);
        assert_eq!(grid.row_cells(1).count(), 1);
        assert_eq!(grid.row_cells(7).count(), 0);
    }

    #[test]
    fn test_save_and_load_roundtrip_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.xlsx");

        let mut grid = Grid::from_rows(
            "Спецификация",
            vec![
                vec![text("Артикул"), text("Количество")],
                vec![text("A1"), CellValue::Number(10.0)],
            ],
        );
        grid.highlight(1, 1, REVIEW_FILL);
        grid.highlight(3, 3, REVIEW_FILL);
        grid.save(&path).unwrap();

        let loaded = Grid::load(&path).unwrap();
        assert_eq!(loaded.name(), "Спецификация");
        assert_eq!(loaded.text(0, 0), "Артикул");
        assert_eq!(loaded.get(1, 1), &CellValue::Number(10.0));
        assert_eq!(loaded.text(1, 0), "A1");
    }

    #[test]
    fn test_date_cells_survive_rewrite() {
        use rust_xlsxwriter::ExcelDateTime;

        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.xlsx");
        let rewritten = dir.path().join("rewritten.xlsx");

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Артикул").unwrap();
        sheet.write_string(0, 1, "Срок поставки").unwrap();
        sheet.write_string(1, 0, "A1").unwrap();
        let date = ExcelDateTime::from_ymd(2024, 3, 15).unwrap();
        sheet
            .write_datetime_with_format(1, 1, &date, &Format::new().set_num_format("dd.mm.yyyy"))
            .unwrap();
        workbook.add_worksheet().set_name("Примечания").unwrap();
        workbook.save(&source).unwrap();

        let mut grid = Grid::load(&source).unwrap();
        assert_eq!(grid.get(1, 1), &CellValue::DateTime(45366.0));
        assert_eq!(grid.text(1, 1), "15.03.2024");

        grid.set(1, 2, 10.0);
        grid.highlight(1, 1, REVIEW_FILL);
        grid.save(&rewritten).unwrap();

        let reloaded = Grid::load(&rewritten).unwrap();
        assert_eq!(reloaded.get(1, 1), &CellValue::DateTime(45366.0));
        assert_eq!(reloaded.text(1, 1), "15.03.2024");
        assert_eq!(reloaded.get(1, 2), &CellValue::Number(10.0));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Grid::load(Path::new("/nonexistent/file.xlsx"));
        assert!(matches!(result, Err(ReconError::Spreadsheet(_))));
    }
}
