use crate::engine::Stage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("APIキーが設定されていません。`warehouse-recon config --set-api-key YOUR_KEY` で設定するか GEMINI_API_KEY を指定してください")]
    MissingApiKey,

    #[error("必要なファイルがありません: {0}")]
    MissingArtifact(String),

    #[error("前段の結果がありません: {stage} の実行には {missing} が必要です")]
    PrerequisiteMissing { stage: Stage, missing: Stage },

    #[error("日付の形式が不正です（ДД.ММ.ГГГГ）: {0}")]
    InvalidDateFormat(String),

    #[error("出荷種別が不正です（full/partial）: {0}")]
    InvalidShipmentType(String),

    #[error("列が見つかりません: {0}")]
    ColumnNotFound(String),

    #[error("納品書テンプレートが見つかりません: {0}")]
    TemplateNotFound(String),

    #[error("仕様書ファイルが見つかりません: {0}")]
    SpecificationNotFound(String),

    #[error("仕様書の解析に失敗: {0}")]
    SpecificationParse(String),

    #[error("Excel処理エラー: {0}")]
    Spreadsheet(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("バックグラウンド処理エラー: {0}")]
    Task(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] warehouse_recon_common::Error),
}

pub type Result<T> = std::result::Result<T, ReconError>;
