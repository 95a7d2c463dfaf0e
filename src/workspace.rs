//! 作業ディレクトリ
//!
//! 入力は `uploads/`、生成物は `output/` に置く。
//! 認識キャッシュはルート直下。

use crate::error::{ReconError, Result};
use crate::recognizer::cache::CACHE_FILE_NAME;
use chrono::Local;
use std::path::{Path, PathBuf};
use warehouse_recon_common::PhotoRecord;

const UPLOADS_DIR: &str = "uploads";
const OUTPUT_DIR: &str = "output";

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

/// アップロード後の配置
#[derive(Debug, Clone, Default)]
pub struct StoredUpload {
    pub specification: Option<PathBuf>,
    pub template: Option<PathBuf>,
    pub photos: Vec<PhotoRecord>,
    /// 空ファイルのため取り込まなかった写真
    pub skipped: Vec<PathBuf>,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join(UPLOADS_DIR)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    /// uploads/ と output/ を作成
    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(self.uploads_dir())?;
        std::fs::create_dir_all(self.output_dir())?;
        Ok(())
    }

    /// 入力ファイルをタイムスタンプ付きの名前でコピーする
    ///
    /// 新しい名前で全てコピーできてから既存のアップロードを削除する。
    /// 途中で失敗した場合は作りかけのコピーだけを消し、既存分は残す。
    pub fn store_upload(
        &self,
        specification: Option<&Path>,
        template: Option<&Path>,
        photos: &[PathBuf],
    ) -> Result<StoredUpload> {
        // 既存のアップロードを消す前に入力を確認
        if let Some(src) = specification.filter(|p| !p.is_file()) {
            return Err(ReconError::SpecificationNotFound(src.display().to_string()));
        }
        if let Some(src) = template.filter(|p| !p.is_file()) {
            return Err(ReconError::TemplateNotFound(src.display().to_string()));
        }
        let mut photo_sizes = Vec::with_capacity(photos.len());
        for src in photos {
            let metadata = std::fs::metadata(src)
                .map_err(|_| ReconError::MissingArtifact(src.display().to_string()))?;
            photo_sizes.push(metadata.len());
        }

        self.ensure()?;
        let uploads = self.uploads_dir();
        let previous = list_files(&uploads)?;
        let ts = unused_stamp(timestamp(), &previous);

        let mut created: Vec<PathBuf> = Vec::new();
        match copy_inputs(&uploads, &ts, specification, template, photos, &photo_sizes, &mut created) {
            Ok(stored) => {
                for old in previous.iter().filter(|p| !created.contains(p)) {
                    std::fs::remove_file(old)?;
                }
                tracing::info!(
                    specification = stored.specification.is_some(),
                    template = stored.template.is_some(),
                    photos = stored.photos.len(),
                    "ファイルを取り込みました"
                );
                Ok(stored)
            }
            Err(e) => {
                for path in &created {
                    if let Err(err) = std::fs::remove_file(path) {
                        tracing::warn!(path = %path.display(), error = %err, "作りかけのコピーを削除できません");
                    }
                }
                Err(e)
            }
        }
    }

    /// 出力ファイルのパス（タイムスタンプ付き）
    pub fn output_path(&self, prefix: &str) -> PathBuf {
        self.output_dir().join(format!("{}_{}.xlsx", prefix, timestamp()))
    }

    /// uploads/ と output/ の中身と認識キャッシュを消す
    pub fn clear(&self) -> Result<()> {
        clear_dir(&self.uploads_dir())?;
        clear_dir(&self.output_dir())?;

        let cache = self.root.join(CACHE_FILE_NAME);
        if cache.exists() {
            std::fs::remove_file(cache)?;
        }
        Ok(())
    }
}

/// コピーしたパスは `created` に積む
fn copy_inputs(
    uploads: &Path,
    ts: &str,
    specification: Option<&Path>,
    template: Option<&Path>,
    photos: &[PathBuf],
    photo_sizes: &[u64],
    created: &mut Vec<PathBuf>,
) -> Result<StoredUpload> {
    let mut stored = StoredUpload::default();

    if let Some(src) = specification {
        let dest = uploads.join(format!("specification_{}.{}", ts, sheet_extension(src)));
        std::fs::copy(src, &dest)?;
        created.push(dest.clone());
        stored.specification = Some(dest);
    }

    if let Some(src) = template {
        let dest = uploads.join(format!("template_{}.{}", ts, sheet_extension(src)));
        std::fs::copy(src, &dest)?;
        created.push(dest.clone());
        stored.template = Some(dest);
    }

    for (i, (src, size)) in photos.iter().zip(photo_sizes.iter().copied()).enumerate() {
        if size == 0 {
            tracing::warn!(path = %src.display(), "空の写真ファイルをスキップ");
            stored.skipped.push(src.clone());
            continue;
        }

        let ext = src
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_else(|| ".jpg".to_string());
        let dest = uploads.join(format!("photo_{}_{}{}", i, ts, ext));
        std::fs::copy(src, &dest)?;
        created.push(dest.clone());

        let file_name = src
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        stored.photos.push(PhotoRecord {
            index: stored.photos.len(),
            file_path: dest,
            file_name,
        });
    }

    Ok(stored)
}

/// 表計算ファイルの拡張子（小文字）。読み込み側は拡張子で形式を判定する
fn sheet_extension(src: &Path) -> String {
    src.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "xlsx".to_string())
}

fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// 既存ファイルと衝突しないタイムスタンプ
fn unused_stamp(base: String, existing: &[PathBuf]) -> String {
    let taken = |stamp: &str| {
        let suffix = format!("_{}", stamp);
        existing.iter().any(|p| {
            p.file_stem()
                .map(|s| s.to_string_lossy().ends_with(&suffix))
                .unwrap_or(false)
        })
    };
    if !taken(&base) {
        return base;
    }
    (1..)
        .map(|n| format!("{}_{}", base, n))
        .find(|stamp| !taken(stamp))
        .unwrap_or(base)
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

/// ディレクトリ内のファイルを削除（ディレクトリ自体は残す）
fn clear_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}
