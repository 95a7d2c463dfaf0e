//! セッション状態
//!
//! ステップ番号・取り込み済みファイル・各ステージの結果を1つの値として持つ。
//! ステージはスナップショットから計算し、成功したときだけ新しい Session を確定する。

use super::compare::ComparisonReport;
use super::count::CountVerification;
use super::extraction::MarkingReport;
use super::files::FileCheckReport;
use super::params::FinalParams;
use crate::error::{ReconError, Result};
use crate::export::GenerationReport;
use crate::quality::PhotoQualityReport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use warehouse_recon_common::PhotoRecord;

/// ワークフローのステップ（1〜8）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    FilesPending = 1,
    FilesComplete = 2,
    PhotosQualityChecked = 3,
    MarkingsExtracted = 4,
    DoubleCounted = 5,
    SpecificationCompared = 6,
    FinalParamsCaptured = 7,
    FilesGenerated = 8,
}

impl WorkflowStep {
    pub fn number(&self) -> u8 {
        *self as u8
    }

    pub fn label(&self) -> &'static str {
        match self {
            WorkflowStep::FilesPending => "ファイル待ち",
            WorkflowStep::FilesComplete => "ファイル確認済み",
            WorkflowStep::PhotosQualityChecked => "写真品質確認済み",
            WorkflowStep::MarkingsExtracted => "マーキング抽出済み",
            WorkflowStep::DoubleCounted => "二重カウント済み",
            WorkflowStep::SpecificationCompared => "仕様書照合済み",
            WorkflowStep::FinalParamsCaptured => "出荷情報入力済み",
            WorkflowStep::FilesGenerated => "帳票生成済み",
        }
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}", self.number(), self.label())
    }
}

/// 実行可能なステージ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    FileCheck,
    PhotoQuality,
    MarkingExtraction,
    CountVerification,
    SpecificationComparison,
    FinalParams,
    FileGeneration,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::FileCheck,
        Stage::PhotoQuality,
        Stage::MarkingExtraction,
        Stage::CountVerification,
        Stage::SpecificationComparison,
        Stage::FinalParams,
        Stage::FileGeneration,
    ];

    /// ワークフロー上の順番（0始まり）
    pub fn position(&self) -> usize {
        Stage::ALL.iter().position(|s| s == self).unwrap_or(0)
    }

    /// 成功時に到達するステップ
    pub fn target_step(&self) -> WorkflowStep {
        match self {
            Stage::FileCheck => WorkflowStep::FilesComplete,
            Stage::PhotoQuality => WorkflowStep::PhotosQualityChecked,
            Stage::MarkingExtraction => WorkflowStep::MarkingsExtracted,
            Stage::CountVerification => WorkflowStep::DoubleCounted,
            Stage::SpecificationComparison => WorkflowStep::SpecificationCompared,
            Stage::FinalParams => WorkflowStep::FinalParamsCaptured,
            Stage::FileGeneration => WorkflowStep::FilesGenerated,
        }
    }

    /// 実行前に結果が揃っている必要があるステージ
    pub fn prerequisites(&self) -> &'static [Stage] {
        match self {
            Stage::FileCheck => &[],
            Stage::PhotoQuality => &[Stage::FileCheck],
            Stage::MarkingExtraction => &[Stage::PhotoQuality],
            Stage::CountVerification => &[Stage::MarkingExtraction],
            Stage::SpecificationComparison => &[Stage::MarkingExtraction, Stage::CountVerification],
            Stage::FinalParams => &[Stage::SpecificationComparison],
            Stage::FileGeneration => &[
                Stage::SpecificationComparison,
                Stage::FinalParams,
                Stage::MarkingExtraction,
            ],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::FileCheck => "file_check",
            Stage::PhotoQuality => "photo_quality",
            Stage::MarkingExtraction => "markings",
            Stage::CountVerification => "count_verification",
            Stage::SpecificationComparison => "comparison",
            Stage::FinalParams => "final_params",
            Stage::FileGeneration => "generated_files",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Stage::FileCheck => "ファイル確認",
            Stage::PhotoQuality => "写真品質チェック",
            Stage::MarkingExtraction => "マーキング抽出",
            Stage::CountVerification => "二重カウント",
            Stage::SpecificationComparison => "仕様書照合",
            Stage::FinalParams => "出荷情報",
            Stage::FileGeneration => "帳票生成",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 取り込み済みファイル
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifacts {
    pub specification: Option<PathBuf>,
    pub template: Option<PathBuf>,
    pub photos: Vec<PhotoRecord>,
}

impl Artifacts {
    pub fn is_empty(&self) -> bool {
        self.specification.is_none() && self.template.is_none() && self.photos.is_empty()
    }
}

/// ステージ1回分の結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "result", rename_all = "snake_case")]
pub enum StageOutcome {
    FileCheck(FileCheckReport),
    PhotoQuality(PhotoQualityReport),
    Markings(MarkingReport),
    Count(CountVerification),
    Comparison(ComparisonReport),
    FinalParams(FinalParams),
    Generated(GenerationReport),
}

impl StageOutcome {
    pub fn stage(&self) -> Stage {
        match self {
            StageOutcome::FileCheck(_) => Stage::FileCheck,
            StageOutcome::PhotoQuality(_) => Stage::PhotoQuality,
            StageOutcome::Markings(_) => Stage::MarkingExtraction,
            StageOutcome::Count(_) => Stage::CountVerification,
            StageOutcome::Comparison(_) => Stage::SpecificationComparison,
            StageOutcome::FinalParams(_) => Stage::FinalParams,
            StageOutcome::Generated(_) => Stage::FileGeneration,
        }
    }
}

/// ステージ結果の格納先（ステージごとに1つ）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageResults {
    pub file_check: Option<FileCheckReport>,
    pub photo_quality: Option<PhotoQualityReport>,
    pub markings: Option<MarkingReport>,
    pub count_verification: Option<CountVerification>,
    pub comparison: Option<ComparisonReport>,
    pub final_params: Option<FinalParams>,
    pub generated: Option<GenerationReport>,
}

impl StageResults {
    pub fn has(&self, stage: Stage) -> bool {
        match stage {
            Stage::FileCheck => self.file_check.is_some(),
            Stage::PhotoQuality => self.photo_quality.is_some(),
            Stage::MarkingExtraction => self.markings.is_some(),
            Stage::CountVerification => self.count_verification.is_some(),
            Stage::SpecificationComparison => self.comparison.is_some(),
            Stage::FinalParams => self.final_params.is_some(),
            Stage::FileGeneration => self.generated.is_some(),
        }
    }

    /// 結果のあるステージ（ワークフロー順）
    pub fn available(&self) -> Vec<Stage> {
        Stage::ALL.iter().copied().filter(|s| self.has(*s)).collect()
    }

    /// 指定ステージより後ろの結果を捨てる
    pub fn clear_after(&mut self, stage: Stage) {
        for later in Stage::ALL.iter().filter(|s| s.position() > stage.position()) {
            match later {
                Stage::FileCheck => self.file_check = None,
                Stage::PhotoQuality => self.photo_quality = None,
                Stage::MarkingExtraction => self.markings = None,
                Stage::CountVerification => self.count_verification = None,
                Stage::SpecificationComparison => self.comparison = None,
                Stage::FinalParams => self.final_params = None,
                Stage::FileGeneration => self.generated = None,
            }
        }
    }

    pub fn store(&mut self, outcome: StageOutcome) {
        match outcome {
            StageOutcome::FileCheck(r) => self.file_check = Some(r),
            StageOutcome::PhotoQuality(r) => self.photo_quality = Some(r),
            StageOutcome::Markings(r) => self.markings = Some(r),
            StageOutcome::Count(r) => self.count_verification = Some(r),
            StageOutcome::Comparison(r) => self.comparison = Some(r),
            StageOutcome::FinalParams(r) => self.final_params = Some(r),
            StageOutcome::Generated(r) => self.generated = Some(r),
        }
    }
}

/// 作業セッション
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// 確定のたびに増える
    pub version: u64,
    pub step: WorkflowStep,
    pub artifacts: Artifacts,
    pub results: StageResults,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            version: 0,
            step: WorkflowStep::FilesPending,
            artifacts: Artifacts::default(),
            results: StageResults::default(),
        }
    }
}

impl Session {
    /// 前段の結果が揃っているか
    pub fn require(&self, stage: Stage) -> Result<()> {
        match stage.prerequisites().iter().find(|p| !self.results.has(**p)) {
            Some(missing) => Err(ReconError::PrerequisiteMissing {
                stage,
                missing: *missing,
            }),
            None => Ok(()),
        }
    }

    /// 結果を加えた新しいセッション
    ///
    /// 前のステージをやり直した場合、後続の結果は捨ててステップもそこまで戻す。
    pub fn advance(&self, outcome: StageOutcome) -> Session {
        let stage = outcome.stage();
        let mut next = self.clone();
        next.results.clear_after(stage);
        next.step = stage.target_step();
        next.results.store(outcome);
        next.version += 1;
        next
    }

    /// ファイルを差し替えたセッション（ステップ1・結果なし）
    pub fn with_artifacts(&self, artifacts: Artifacts) -> Session {
        Session {
            version: self.version + 1,
            step: WorkflowStep::FilesPending,
            artifacts,
            results: StageResults::default(),
        }
    }

    /// 初期状態に戻したセッション
    pub fn cleared(&self) -> Session {
        self.with_artifacts(Artifacts::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::params::ShipmentType;

    fn params() -> StageOutcome {
        StageOutcome::FinalParams(FinalParams::new(ShipmentType::Full, "01.02.2024").unwrap())
    }

    #[test]
    fn test_step_numbers() {
        assert_eq!(WorkflowStep::FilesPending.number(), 1);
        assert_eq!(WorkflowStep::FilesGenerated.number(), 8);
        assert!(WorkflowStep::MarkingsExtracted < WorkflowStep::DoubleCounted);
        assert_eq!(WorkflowStep::SpecificationCompared.to_string(), "6. 仕様書照合済み");
    }

    #[test]
    fn test_target_steps_follow_workflow_order() {
        let steps: Vec<u8> = Stage::ALL.iter().map(|s| s.target_step().number()).collect();
        assert_eq!(steps, vec![2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_prerequisites_point_backwards() {
        for stage in Stage::ALL {
            for p in stage.prerequisites() {
                assert!(p.target_step() < stage.target_step(), "{:?} -> {:?}", stage, p);
            }
        }
    }

    #[test]
    fn test_require_reports_first_missing() {
        let session = Session::default();
        assert!(session.require(Stage::FileCheck).is_ok());

        match session.require(Stage::SpecificationComparison) {
            Err(ReconError::PrerequisiteMissing { stage, missing }) => {
                assert_eq!(stage, Stage::SpecificationComparison);
                assert_eq!(missing, Stage::MarkingExtraction);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_advance_is_versioned() {
        let session = Session::default();
        let next = session.advance(params());
        assert_eq!(next.step, WorkflowStep::FinalParamsCaptured);
        assert_eq!(next.version, 1);
        assert!(next.results.has(Stage::FinalParams));
        // 元の値は変わらない
        assert_eq!(session.step, WorkflowStep::FilesPending);

        // 同じステージのやり直しはステップを変えない
        let rerun = next.advance(params());
        assert_eq!(rerun.step, WorkflowStep::FinalParamsCaptured);
        assert_eq!(rerun.version, 2);
    }

    #[test]
    fn test_rerun_earlier_stage_drops_later_results() {
        let file_check = || {
            StageOutcome::FileCheck(FileCheckReport {
                success: true,
                files_count: Default::default(),
                missing: vec![],
            })
        };
        let session = Session::default().advance(file_check()).advance(params());
        assert_eq!(session.results.available(), vec![Stage::FileCheck, Stage::FinalParams]);

        let again = session.advance(file_check());
        assert_eq!(again.step, WorkflowStep::FilesComplete);
        assert_eq!(again.results.available(), vec![Stage::FileCheck]);
    }

    #[test]
    fn test_with_artifacts_clears_results() {
        let session = Session::default().advance(params());
        let replaced = session.with_artifacts(Artifacts {
            specification: Some(PathBuf::from("s.xlsx")),
            ..Default::default()
        });
        assert_eq!(replaced.step, WorkflowStep::FilesPending);
        assert!(replaced.results.available().is_empty());
        assert_eq!(replaced.version, 2);

        let cleared = replaced.cleared();
        assert!(cleared.artifacts.is_empty());
    }

    #[test]
    fn test_outcome_serializes_with_stage_tag() {
        let json = serde_json::to_value(params()).unwrap();
        assert_eq!(json["stage"], "final_params");
        assert_eq!(json["result"]["shipment_date"], "01.02.2024");
    }
}
