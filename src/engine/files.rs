use super::session::Artifacts;
use serde::{Deserialize, Serialize};

/// 取り込み済みファイルの件数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCounts {
    pub specification: usize,
    pub template: usize,
    pub photos: usize,
}

/// ファイル確認の結果。不足があっても失敗ではなく一覧で返す
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCheckReport {
    pub success: bool,
    pub files_count: FileCounts,
    pub missing: Vec<String>,
}

pub fn check_artifacts(artifacts: &Artifacts) -> FileCheckReport {
    let mut missing = Vec::new();
    if artifacts.specification.is_none() {
        missing.push("Спецификация (Excel)".to_string());
    }
    if artifacts.template.is_none() {
        missing.push("Шаблон накладной (Excel)".to_string());
    }
    if artifacts.photos.is_empty() {
        missing.push("Фотографии маркировок".to_string());
    }

    FileCheckReport {
        success: missing.is_empty(),
        files_count: FileCounts {
            specification: artifacts.specification.iter().count(),
            template: artifacts.template.iter().count(),
            photos: artifacts.photos.len(),
        },
        missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use warehouse_recon_common::PhotoRecord;

    #[test]
    fn test_everything_missing() {
        let report = check_artifacts(&Artifacts::default());
        assert!(!report.success);
        assert_eq!(report.missing.len(), 3);
        assert_eq!(report.files_count, FileCounts::default());
    }

    #[test]
    fn test_complete() {
        let artifacts = Artifacts {
            specification: Some(PathBuf::from("s.xlsx")),
            template: Some(PathBuf::from("t.xlsx")),
            photos: vec![PhotoRecord {
                index: 0,
                file_path: PathBuf::from("p.jpg"),
                file_name: "p.jpg".into(),
            }],
        };
        let report = check_artifacts(&artifacts);
        assert!(report.success);
        assert!(report.missing.is_empty());
        assert_eq!(report.files_count.photos, 1);
    }

    #[test]
    fn test_only_photos_missing() {
        let artifacts = Artifacts {
            specification: Some(PathBuf::from("s.xlsx")),
            template: Some(PathBuf::from("t.xlsx")),
            photos: vec![],
        };
        let report = check_artifacts(&artifacts);
        assert_eq!(report.missing, vec!["Фотографии маркировок".to_string()]);
    }
}
