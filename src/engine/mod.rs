//! 照合ワークフローエンジン
//!
//! ファイル確認 → 写真品質 → マーキング抽出 → 二重カウント → 仕様書照合
//! → 出荷情報 → 帳票生成 の順にステージを進める。
//! セッションはステージ実行中ずっとロックし、ステージ同士は重ならない。

pub mod compare;
pub mod count;
pub mod extraction;
pub mod files;
pub mod params;
pub mod session;

pub use compare::{ComparisonReport, ComparisonSummary};
pub use count::CountVerification;
pub use extraction::{MarkingReport, MarkingSummary};
pub use files::FileCheckReport;
pub use params::{FinalParams, ShipmentType};
pub use session::{Artifacts, Session, Stage, StageOutcome, StageResults, WorkflowStep};

use crate::config::Config;
use crate::error::{ReconError, Result};
use crate::export::{generate_documents, DocumentInputs, GenerationReport};
use crate::quality::{assess_photos, PhotoQualityReport};
use crate::recognizer::MarkingRecognizer;
use crate::workspace::Workspace;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use warehouse_recon_common::ColumnKeywords;

/// エンジンの実行設定
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// 認識の同時実行数
    pub concurrency: usize,
    /// 写真1枚あたりの認識タイムアウト
    pub timeout: Duration,
    pub keywords: ColumnKeywords,
}

impl Default for EngineOptions {
    fn default() -> Self {
        let config = Config::default();
        Self {
            concurrency: config.concurrency,
            timeout: Duration::from_secs(config.timeout_seconds),
            keywords: ColumnKeywords::default(),
        }
    }
}

impl EngineOptions {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            concurrency: config.concurrency,
            timeout: Duration::from_secs(config.timeout_seconds),
            keywords: config.column_keywords()?,
        })
    }
}

/// 取り込むファイル
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub specification: Option<PathBuf>,
    pub template: Option<PathBuf>,
    pub photos: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub specification: bool,
    pub template: bool,
    pub photos: usize,
    pub skipped_empty: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FilesUploaded {
    pub specification: bool,
    pub template: bool,
    pub photos: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub step: WorkflowStep,
    pub files_uploaded: FilesUploaded,
    pub results_available: Vec<Stage>,
}

pub struct ReconciliationEngine {
    workspace: Workspace,
    recognizer: Arc<dyn MarkingRecognizer>,
    options: EngineOptions,
    session: Mutex<Session>,
}

impl ReconciliationEngine {
    pub fn new(workspace: Workspace, recognizer: Arc<dyn MarkingRecognizer>, options: EngineOptions) -> Self {
        Self {
            workspace,
            recognizer,
            options,
            session: Mutex::new(Session::default()),
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// 現在のセッションの複製
    pub async fn snapshot(&self) -> Session {
        self.session.lock().await.clone()
    }

    /// 入力ファイルを取り込み、ステップ1からやり直す
    pub async fn upload(&self, request: UploadRequest) -> Result<UploadReport> {
        let mut session = self.session.lock().await;

        let stored = self.workspace.store_upload(
            request.specification.as_deref(),
            request.template.as_deref(),
            &request.photos,
        )?;

        let report = UploadReport {
            specification: stored.specification.is_some(),
            template: stored.template.is_some(),
            photos: stored.photos.len(),
            skipped_empty: stored.skipped.len(),
        };

        *session = session.with_artifacts(Artifacts {
            specification: stored.specification,
            template: stored.template,
            photos: stored.photos,
        });
        Ok(report)
    }

    /// 不足があればステップを進めずに一覧を返す
    pub async fn check_files(&self) -> Result<FileCheckReport> {
        let mut session = self.session.lock().await;
        session.require(Stage::FileCheck)?;

        let report = files::check_artifacts(&session.artifacts);
        if report.success {
            *session = session.advance(StageOutcome::FileCheck(report.clone()));
            tracing::info!(photos = report.files_count.photos, "ファイル確認完了");
        } else {
            tracing::info!(missing = ?report.missing, "ファイルが不足しています");
        }
        Ok(report)
    }

    pub async fn check_photo_quality(&self) -> Result<PhotoQualityReport> {
        let mut session = self.session.lock().await;
        session.require(Stage::PhotoQuality)?;

        let photos = session.artifacts.photos.clone();
        let report = tokio::task::spawn_blocking(move || assess_photos(&photos))
            .await
            .map_err(|e| ReconError::Task(e.to_string()))?;

        *session = session.advance(StageOutcome::PhotoQuality(report.clone()));
        tracing::info!(
            readable = report.summary.readable,
            unreadable = report.summary.unreadable,
            "写真品質チェック完了"
        );
        Ok(report)
    }

    pub async fn extract_markings(&self) -> Result<MarkingReport> {
        let mut session = self.session.lock().await;
        session.require(Stage::MarkingExtraction)?;

        let quality = session
            .results
            .photo_quality
            .clone()
            .ok_or(ReconError::PrerequisiteMissing {
                stage: Stage::MarkingExtraction,
                missing: Stage::PhotoQuality,
            })?;

        let report = extraction::extract_all(
            self.recognizer.as_ref(),
            &session.artifacts.photos,
            &quality,
            self.options.concurrency,
            self.options.timeout,
        )
        .await;

        *session = session.advance(StageOutcome::Markings(report.clone()));
        tracing::info!(
            extracted = report.summary.extracted,
            partial = report.summary.partial,
            failed = report.summary.failed,
            "マーキング抽出完了"
        );
        Ok(report)
    }

    pub async fn count_verification(&self) -> Result<CountVerification> {
        let mut session = self.session.lock().await;
        session.require(Stage::CountVerification)?;

        let markings = markings_of(&session, Stage::CountVerification)?;
        let result = count::count_markings(&markings.markings);

        *session = session.advance(StageOutcome::Count(result.clone()));
        tracing::info!(
            total = result.first_count.total_photos,
            unique_articles = result.second_count.unique_articles,
            "二重カウント完了"
        );
        Ok(result)
    }

    pub async fn compare_specification(&self) -> Result<ComparisonReport> {
        let mut session = self.session.lock().await;
        session.require(Stage::SpecificationComparison)?;

        let spec_path = session
            .artifacts
            .specification
            .clone()
            .ok_or_else(|| ReconError::MissingArtifact("Спецификация (Excel)".into()))?;
        let specification = compare::parse_specification(&spec_path, &self.options.keywords)?;
        let markings = markings_of(&session, Stage::SpecificationComparison)?;
        let report = compare::compare(&specification, &markings.markings);

        *session = session.advance(StageOutcome::Comparison(report.clone()));
        tracing::info!(
            positions = report.summary.total_positions,
            shortage = report.summary.shortage,
            excess = report.summary.excess,
            unplanned = report.summary.unplanned,
            "仕様書照合完了"
        );
        Ok(report)
    }

    pub async fn capture_final_params(&self, shipment_type: ShipmentType, shipment_date: &str) -> Result<FinalParams> {
        let mut session = self.session.lock().await;
        session.require(Stage::FinalParams)?;

        let params = FinalParams::new(shipment_type, shipment_date)?;
        *session = session.advance(StageOutcome::FinalParams(params.clone()));
        tracing::info!(shipment = params.shipment_label.as_str(), date = params.shipment_date.as_str(), "出荷情報を記録");
        Ok(params)
    }

    pub async fn generate_files(&self) -> Result<GenerationReport> {
        let mut session = self.session.lock().await;
        session.require(Stage::FileGeneration)?;

        let missing = |stage| ReconError::PrerequisiteMissing {
            stage: Stage::FileGeneration,
            missing: stage,
        };
        let comparison = session.results.comparison.as_ref().ok_or_else(|| missing(Stage::SpecificationComparison))?;
        let params = session.results.final_params.as_ref().ok_or_else(|| missing(Stage::FinalParams))?;
        let markings = session.results.markings.as_ref().ok_or_else(|| missing(Stage::MarkingExtraction))?;

        let template = session
            .artifacts
            .template
            .as_deref()
            .ok_or_else(|| ReconError::TemplateNotFound("未アップロード".into()))?;
        let specification = session
            .artifacts
            .specification
            .as_deref()
            .ok_or_else(|| ReconError::SpecificationNotFound("未アップロード".into()))?;

        let inputs = DocumentInputs {
            template,
            specification,
            comparison: &comparison.comparison,
            markings: &markings.markings,
            params,
            keywords: &self.options.keywords,
        };
        let report = generate_documents(&inputs, &self.workspace)?;

        *session = session.advance(StageOutcome::Generated(report.clone()));
        for file in &report.files {
            tracing::info!(path = %file.path.display(), rows = file.rows, "帳票を出力");
        }
        Ok(report)
    }

    pub async fn status(&self) -> StatusReport {
        let session = self.session.lock().await;
        StatusReport {
            step: session.step,
            files_uploaded: FilesUploaded {
                specification: session.artifacts.specification.is_some(),
                template: session.artifacts.template.is_some(),
                photos: session.artifacts.photos.len(),
            },
            results_available: session.results.available(),
        }
    }

    /// 作業ファイルとキャッシュを消してステップ1に戻す
    pub async fn reset(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        self.workspace.clear()?;
        self.recognizer.reset().await;
        *session = session.cleared();
        tracing::info!("セッションをリセットしました");
        Ok(())
    }
}

fn markings_of(session: &Session, stage: Stage) -> Result<&MarkingReport> {
    session.results.markings.as_ref().ok_or(ReconError::PrerequisiteMissing {
        stage,
        missing: Stage::MarkingExtraction,
    })
}
