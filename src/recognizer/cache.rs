//! 認識結果キャッシュモジュール
//!
//! 画像のSHA-256ハッシュをキーにして認識結果をキャッシュし、
//! 同じ写真を認識サービスに二度送らない。

use super::{ExtractionError, MarkingRecognizer};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use warehouse_recon_common::RecognizedMarking;

pub const CACHE_FILE_NAME: &str = ".marking-cache.json";

/// キャッシュファイルの構造
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheFile {
    /// バージョン（互換性チェック用）
    version: u32,
    /// ファイルハッシュ → 認識結果のマップ
    entries: HashMap<String, CacheEntry>,
}

/// キャッシュエントリ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub file_name: String,
    pub file_size: u64,
    pub marking: RecognizedMarking,
}

impl CacheFile {
    const CURRENT_VERSION: u32 = 1;

    /// キャッシュファイルを読み込み（壊れていれば空）
    pub fn load(folder: &Path) -> Self {
        let cache_path = folder.join(CACHE_FILE_NAME);
        if !cache_path.exists() {
            return Self::default();
        }

        let file = match File::open(&cache_path) {
            Ok(f) => f,
            Err(_) => return Self::default(),
        };

        match serde_json::from_reader::<_, CacheFile>(BufReader::new(file)) {
            Ok(cache) if cache.version == Self::CURRENT_VERSION => cache,
            Ok(_) => {
                tracing::warn!("キャッシュバージョン不一致、再生成します");
                Self::default()
            }
            Err(e) => {
                tracing::warn!(error = %e, "キャッシュ読み込み失敗、再生成します");
                Self::default()
            }
        }
    }

    /// キャッシュファイルを保存（一時ファイルに書いてから置き換える）
    pub fn save(&self, folder: &Path) -> Result<()> {
        std::fs::create_dir_all(folder)?;
        let tmp_path = folder.join(format!("{}.tmp", CACHE_FILE_NAME));
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            serde_json::to_writer_pretty(&mut writer, self)?;
            writer.flush()?;
        }
        std::fs::rename(&tmp_path, folder.join(CACHE_FILE_NAME))?;
        Ok(())
    }

    pub fn get(&self, hash: &str) -> Option<&RecognizedMarking> {
        self.entries.get(hash).map(|e| &e.marking)
    }

    pub fn insert(&mut self, hash: String, file_name: String, file_size: u64, marking: RecognizedMarking) {
        self.entries.insert(
            hash,
            CacheEntry {
                file_name,
                file_size,
                marking,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CacheFile {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            entries: HashMap::new(),
        }
    }
}

/// 画像ファイルのハッシュを計算（SHA-256、16進）
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// キャッシュ付き認識器
///
/// `error` のない応答だけを保存する。失敗は次回また問い合わせる。
/// ファイルへの書き出しはロックの外で spawn_blocking に任せる。
pub struct CachedRecognizer<R> {
    inner: R,
    folder: PathBuf,
    cache: Mutex<CacheFile>,
    /// キャッシュ内容の版。更新ごとに cache のロック内で進める
    revision: AtomicU64,
    /// 書き出しを一つずつにする
    writer: Mutex<()>,
}

impl<R: MarkingRecognizer> CachedRecognizer<R> {
    pub fn new(inner: R, folder: impl Into<PathBuf>) -> Self {
        let folder = folder.into();
        let cache = CacheFile::load(&folder);
        tracing::debug!(entries = cache.len(), "認識キャッシュ読み込み");
        Self {
            inner,
            folder,
            cache: Mutex::new(cache),
            revision: AtomicU64::new(0),
            writer: Mutex::new(()),
        }
    }

    pub async fn cached_count(&self) -> usize {
        self.cache.lock().await.len()
    }

    /// スナップショットを書き出す。より新しい版があればそちらに任せる
    async fn persist(&self, snapshot: CacheFile, revision: u64) {
        let _writer = self.writer.lock().await;
        if self.revision.load(Ordering::SeqCst) != revision {
            return;
        }

        let folder = self.folder.clone();
        match tokio::task::spawn_blocking(move || snapshot.save(&folder)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "キャッシュ保存失敗"),
            Err(e) => tracing::warn!(error = %e, "キャッシュ保存タスクが異常終了"),
        }
    }
}

#[async_trait]
impl<R: MarkingRecognizer> MarkingRecognizer for CachedRecognizer<R> {
    async fn recognize(&self, image_path: &Path) -> std::result::Result<RecognizedMarking, ExtractionError> {
        // ハッシュ計算に失敗してもキャッシュなしで続行
        let hash = match compute_file_hash(image_path) {
            Ok(hash) => Some(hash),
            Err(e) => {
                tracing::debug!(path = %image_path.display(), error = %e, "ハッシュ計算失敗");
                None
            }
        };

        if let Some(hash) = &hash {
            if let Some(hit) = self.cache.lock().await.get(hash) {
                tracing::debug!(path = %image_path.display(), "キャッシュヒット");
                return Ok(hit.clone());
            }
        }

        let marking = self.inner.recognize(image_path).await?;

        if let Some(hash) = hash {
            if marking.error.is_none() {
                let file_name = image_path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                let file_size = std::fs::metadata(image_path).map(|m| m.len()).unwrap_or(0);

                let (snapshot, revision) = {
                    let mut cache = self.cache.lock().await;
                    cache.insert(hash, file_name, file_size, marking.clone());
                    let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
                    (cache.clone(), revision)
                };
                self.persist(snapshot, revision).await;
            }
        }

        Ok(marking)
    }

    async fn reset(&self) {
        let mut cache = self.cache.lock().await;
        *cache = CacheFile::default();
        self.revision.fetch_add(1, Ordering::SeqCst);
        drop(cache);
        self.inner.reset().await;
    }
}
