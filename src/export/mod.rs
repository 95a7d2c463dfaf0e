//! 帳票生成
//!
//! 照合結果から「記入済み納品書」と「更新済み仕様書」の2ファイルを作る。

pub mod invoice;
pub mod specification;

use crate::engine::params::FinalParams;
use crate::error::{ReconError, Result};
use crate::sheet::Grid;
use crate::workspace::Workspace;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use warehouse_recon_common::{ColumnKeywords, ComparisonRecord, MarkingRecord};

pub use invoice::{fill_invoice, INVOICE_PREFIX};
pub use specification::{update_specification, SPECIFICATION_PREFIX};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Invoice,
    Specification,
}

/// 生成したファイル
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub kind: DocumentKind,
    pub name: String,
    pub path: PathBuf,
    /// 書き込んだ行数
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub invoice_generated: bool,
    pub specification_updated: bool,
    pub shipment_type: String,
    pub shipment_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub files: Vec<GeneratedFile>,
    pub summary: GenerationSummary,
}

/// 帳票生成に必要な入力一式
pub struct DocumentInputs<'a> {
    pub template: &'a Path,
    pub specification: &'a Path,
    pub comparison: &'a [ComparisonRecord],
    pub markings: &'a [MarkingRecord],
    pub params: &'a FinalParams,
    pub keywords: &'a ColumnKeywords,
}

/// テンプレートを読み込み、記入して保存する
pub fn generate_invoice(
    template: &Path,
    output: &Path,
    comparison: &[ComparisonRecord],
    markings: &[MarkingRecord],
    keywords: &ColumnKeywords,
) -> Result<usize> {
    if !template.is_file() {
        return Err(ReconError::TemplateNotFound(template.display().to_string()));
    }
    let mut grid = Grid::load(template)?;
    let rows = fill_invoice(&mut grid, comparison, markings, keywords);
    grid.save(output)?;
    Ok(rows)
}

/// 仕様書を読み込み、出荷実績を書いて保存する
pub fn generate_specification(
    specification: &Path,
    output: &Path,
    comparison: &[ComparisonRecord],
    shipment_date: &str,
    keywords: &ColumnKeywords,
) -> Result<usize> {
    if !specification.is_file() {
        return Err(ReconError::SpecificationNotFound(specification.display().to_string()));
    }
    let mut grid = Grid::load(specification)?;
    let rows = update_specification(&mut grid, comparison, shipment_date, keywords);
    grid.save(output)?;
    Ok(rows)
}

/// 2つの帳票を workspace の output/ に書き出す
pub fn generate_documents(inputs: &DocumentInputs<'_>, workspace: &Workspace) -> Result<GenerationReport> {
    std::fs::create_dir_all(workspace.output_dir())?;

    let invoice_path = workspace.output_path(INVOICE_PREFIX);
    let invoice_rows = generate_invoice(
        inputs.template,
        &invoice_path,
        inputs.comparison,
        inputs.markings,
        inputs.keywords,
    )?;

    let spec_path = workspace.output_path(SPECIFICATION_PREFIX);
    let spec_rows = generate_specification(
        inputs.specification,
        &spec_path,
        inputs.comparison,
        &inputs.params.shipment_date,
        inputs.keywords,
    )?;

    let files = vec![
        GeneratedFile {
            kind: DocumentKind::Invoice,
            name: format!("{}.xlsx", INVOICE_PREFIX),
            path: invoice_path,
            rows: invoice_rows,
        },
        GeneratedFile {
            kind: DocumentKind::Specification,
            name: format!("{}.xlsx", SPECIFICATION_PREFIX),
            path: spec_path,
            rows: spec_rows,
        },
    ];

    Ok(GenerationReport {
        files,
        summary: GenerationSummary {
            invoice_generated: true,
            specification_updated: true,
            shipment_type: inputs.params.shipment_label.clone(),
            shipment_date: inputs.params.shipment_date.clone(),
        },
    })
}
