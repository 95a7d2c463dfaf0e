//! 仕様書への出荷実績の追記

use crate::sheet::columns::{ensure_column, resolve_columns, resolve_header_row};
use crate::sheet::{Grid, REVIEW_FILL};
use std::collections::HashMap;
use warehouse_recon_common::{ColumnKeywords, ColumnRole, ComparisonRecord};

pub const SPECIFICATION_PREFIX: &str = "Спецификация_обновленная";
pub const SHIPPED_LABEL: &str = "Отгруженные";
pub const DATE_LABEL: &str = "Дата отгрузки";

/// 照合結果のある行に出荷数と出荷日を書く。更新した行数を返す
///
/// 超過・仕様外の出荷数セルは赤で塗る。
pub fn update_specification(
    grid: &mut Grid,
    comparison: &[ComparisonRecord],
    shipment_date: &str,
    keywords: &ColumnKeywords,
) -> usize {
    let header_row = resolve_header_row(grid, keywords, &[ColumnRole::Name, ColumnRole::Article]);
    let mut columns = resolve_columns(grid, header_row, keywords);

    let article_col = match columns.require(ColumnRole::Article) {
        Ok(col) => col,
        Err(e) => {
            tracing::warn!(error = %e, "仕様書に品番列がないため更新を省略");
            return 0;
        }
    };

    let last_row = grid.max_row().unwrap_or(header_row);
    let shipped_col = ensure_column(grid, header_row, &mut columns, ColumnRole::Shipped, SHIPPED_LABEL);
    let date_col = ensure_column(grid, header_row, &mut columns, ColumnRole::Date, DATE_LABEL);

    let by_article: HashMap<&str, &ComparisonRecord> =
        comparison.iter().map(|c| (c.article.as_str(), c)).collect();

    let mut updated = 0;
    for row in (header_row + 1)..=last_row {
        let article = grid.text(row, article_col);
        let Some(item) = by_article.get(article.trim()) else {
            continue;
        };

        grid.set(row, shipped_col, item.actual);
        grid.set(row, date_col, shipment_date);
        if item.classification.needs_review() {
            grid.highlight(row, shipped_col, REVIEW_FILL);
        }
        updated += 1;
    }

    tracing::info!(rows = updated, header_row, "仕様書を更新しました");
    updated
}
