use anyhow::{bail, Context, Result};
use clap::Parser;
use dialoguer::{Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use warehouse_recon::engine::params::parse_shipment_date;
use warehouse_recon::engine::{EngineOptions, ReconciliationEngine, ShipmentType, UploadRequest};
use warehouse_recon::recognizer::cache::CacheFile;
use warehouse_recon::recognizer::{CachedRecognizer, GeminiRecognizer, MarkingRecognizer};
use warehouse_recon::sheet::columns::{resolve_columns, resolve_header_row};
use warehouse_recon::sheet::Grid;
use warehouse_recon::workspace::Workspace;
use warehouse_recon::{cli, config, dimensions, quality, scanner};
use warehouse_recon_common::{ColumnRole, PhotoRecord};
use cli::{Cli, Commands};
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = Config::load().context("設定ファイルの読み込みに失敗")?;

    match cli.command {
        Commands::Run {
            spec,
            template,
            photos,
            shipment_type,
            date,
            workspace,
            timeout,
            concurrency,
            no_cache,
        } => {
            println!("📦 warehouse-recon - 出荷照合\n");

            let workspace = Workspace::new(workspace.unwrap_or_else(|| config.workspace_dir.clone()));
            workspace.ensure().context("作業ディレクトリを作成できません")?;

            let mut options = EngineOptions::from_config(&config)?;
            if let Some(seconds) = timeout {
                options.timeout = Duration::from_secs(seconds);
            }
            if let Some(n) = concurrency {
                options.concurrency = n;
            }

            let gemini = GeminiRecognizer::from_config(&config)?;
            let recognizer: Arc<dyn MarkingRecognizer> = if no_cache {
                Arc::new(gemini)
            } else {
                Arc::new(CachedRecognizer::new(gemini, workspace.root()))
            };
            let engine = ReconciliationEngine::new(workspace, recognizer, options);

            // 0. 取り込み
            let photo_paths = scanner::scan_photos(&photos)?;
            let uploaded = engine
                .upload(UploadRequest {
                    specification: Some(spec),
                    template: Some(template),
                    photos: photo_paths,
                })
                .await
                .context("ファイルの取り込みに失敗")?;
            println!(
                "✔ 取り込み: 写真{}枚{}\n",
                uploaded.photos,
                if uploaded.skipped_empty > 0 {
                    format!("（空ファイル{}件を除外）", uploaded.skipped_empty)
                } else {
                    String::new()
                }
            );

            // 1. ファイル確認
            println!("[1/7] ファイル確認中...");
            let files = engine.check_files().await?;
            if !files.success {
                for missing in &files.missing {
                    println!("  ❌ {}", missing);
                }
                bail!("必要なファイルが揃っていません");
            }
            println!("✔ ファイル確認完了\n");

            // 2. 写真品質
            println!("[2/7] 写真品質チェック中...");
            let quality = engine.check_photo_quality().await?;
            for photo in &quality.photos {
                println!(
                    "  {} {} {}",
                    photo.assessment.status().symbol(),
                    photo.file_name,
                    issue_labels(&photo.assessment.issues)
                );
            }
            println!(
                "✔ 読み取り可能 {}/{}枚\n",
                quality.summary.readable, quality.summary.total
            );

            // 3. マーキング抽出
            println!("[3/7] マーキング抽出中...");
            let spinner = make_spinner("認識APIに問い合わせ中");
            let markings = engine.extract_markings().await;
            spinner.finish_and_clear();
            let markings = markings?;
            for record in &markings.markings {
                println!(
                    "  {} {} {} {}",
                    record.status_tier.symbol(),
                    record.file_name,
                    record.article.as_deref().unwrap_or("-"),
                    record.comment
                );
            }
            println!(
                "✔ 抽出 {} / 部分 {} / 失敗 {}\n",
                markings.summary.extracted, markings.summary.partial, markings.summary.failed
            );

            // 4. 二重カウント
            println!("[4/7] 二重カウント中...");
            let count = engine.count_verification().await?;
            for item in &count.second_count.by_article {
                println!("  {}: {}", item.article, item.count);
            }
            if count.is_consistent() {
                println!("✔ カウント一致（{}枚）\n", count.first_count.total_photos);
            } else {
                println!("⚠ カウント不一致（結果はそのまま続行）\n");
            }

            // 5. 仕様書照合
            println!("[5/7] 仕様書照合中...");
            let comparison = engine.compare_specification().await?;
            for item in &comparison.comparison {
                println!(
                    "  {} {} {} 計画 {} / 実績 {} ({:+})",
                    item.classification.symbol(),
                    item.article,
                    item.name,
                    item.planned,
                    item.actual,
                    item.difference
                );
            }
            let summary = &comparison.summary;
            println!(
                "✔ {}品番: 一致 {} / 不足 {} / 超過 {} / 仕様外 {}\n",
                summary.total_positions, summary.matched, summary.shortage, summary.excess, summary.unplanned
            );

            // 6. 出荷情報
            println!("[6/7] 出荷情報...");
            let shipment_type = match shipment_type {
                Some(t) => t,
                None => ask_shipment_type()?,
            };
            let date = match date {
                Some(d) => d,
                None => ask_shipment_date()?,
            };
            let params = engine.capture_final_params(shipment_type, &date).await?;
            println!("✔ {} {}\n", params.shipment_label, params.shipment_date);

            // 7. 帳票生成
            println!("[7/7] 帳票を生成中...");
            let generated = engine.generate_files().await.context("帳票の生成に失敗")?;
            for file in &generated.files {
                println!("  ✔ {} ({}行)", file.path.display(), file.rows);
            }

            println!("\n✅ 照合完了");
        }

        Commands::Quality { folder } => {
            println!("🔍 warehouse-recon - 写真品質チェック\n");

            let photos: Vec<PhotoRecord> = scanner::scan_photos(&folder)?
                .into_iter()
                .enumerate()
                .map(|(index, path)| PhotoRecord {
                    index,
                    file_name: file_name_of(&path),
                    file_path: path,
                })
                .collect();

            let report = quality::assess_photos(&photos);
            for photo in &report.photos {
                println!(
                    "{} {}  {}  輝度 {:.1}  {}",
                    photo.assessment.status().symbol(),
                    photo.file_name,
                    photo.assessment.resolution_label(),
                    photo.assessment.brightness,
                    issue_labels(&photo.assessment.issues)
                );
            }
            println!(
                "\n合計 {}枚: 読み取り可能 {} / 不可 {}",
                report.summary.total, report.summary.readable, report.summary.unreadable
            );
        }

        Commands::Area { text } => {
            let area = dimensions::parse_area(&text);
            if area > 0.0 {
                println!("{:.3} m²", area);
            } else {
                println!("寸法を読み取れませんでした: {}", text);
            }
        }

        Commands::Columns { file } => {
            let keywords = config.column_keywords()?;
            let grid = Grid::load(&file).with_context(|| format!("読み込み失敗: {}", file.display()))?;
            let header_row = resolve_header_row(&grid, &keywords, &[ColumnRole::Name, ColumnRole::Article]);
            let columns = resolve_columns(&grid, header_row, &keywords);

            println!("シート: {}", grid.name());
            println!("ヘッダー行: {}", header_row + 1);
            if columns.is_empty() {
                println!("  対応する列がありません");
            }
            for (role, col) in columns.entries() {
                println!("  {:<10} 列{} \"{}\"", role.as_str(), col + 1, grid.text(header_row, col));
            }
        }

        Commands::Status { workspace } => {
            let workspace = Workspace::new(workspace.unwrap_or_else(|| config.workspace_dir.clone()));
            println!("作業ディレクトリ: {}", workspace.root().display());
            println!("  取り込み済み: {}件", list_files(&workspace.uploads_dir()).len());
            let outputs = list_files(&workspace.output_dir());
            println!("  生成済み: {}件", outputs.len());
            for path in outputs {
                println!("    {}", path.display());
            }
            println!("  認識キャッシュ: {}件", CacheFile::load(workspace.root()).len());
        }

        Commands::Reset { workspace } => {
            let workspace = Workspace::new(workspace.unwrap_or_else(|| config.workspace_dir.clone()));
            workspace.clear().context("作業ディレクトリの削除に失敗")?;
            println!("✔ 作業ディレクトリを初期化しました: {}", workspace.root().display());
        }

        Commands::Config { set_api_key, show } => {
            let mut config = config;

            if let Some(key) = set_api_key {
                config.set_api_key(key)?;
                println!("✔ APIキーを設定しました");
            }

            if show {
                println!("設定:");
                println!("  モデル: {}", config.model);
                println!("  最大画像サイズ: {}px", config.max_image_size);
                println!("  タイムアウト: {}秒", config.timeout_seconds);
                println!("  同時実行数: {}", config.concurrency);
                println!("  作業ディレクトリ: {}", config.workspace_dir.display());
                match &config.columns {
                    Some(path) => println!("  列キーワード: {}", path.display()),
                    None => println!("  列キーワード: 組み込み"),
                }
                println!("  APIキー: {}", if config.get_api_key().is_ok() { "設定済み" } else { "未設定" });
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "warn,warehouse_recon=debug"
    } else {
        "warn,warehouse_recon=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn make_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn ask_shipment_type() -> Result<ShipmentType> {
    let choices = [ShipmentType::Full, ShipmentType::Partial];
    let labels: Vec<&str> = choices.iter().map(|t| t.label()).collect();
    let selected = Select::new()
        .with_prompt("出荷種別")
        .items(&labels[..])
        .default(0)
        .interact()?;
    Ok(choices[selected])
}

fn ask_shipment_date() -> Result<String> {
    let date: String = Input::new()
        .with_prompt("出荷日 (ДД.ММ.ГГГГ)")
        .validate_with(|input: &String| -> std::result::Result<(), String> {
            parse_shipment_date(input).map(|_| ()).map_err(|e| e.to_string())
        })
        .interact_text()?;
    Ok(date)
}

fn issue_labels(issues: &[warehouse_recon_common::IssueKind]) -> String {
    issues.iter().map(|i| i.label()).collect::<Vec<_>>().join(", ")
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn list_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect()
        })
        .unwrap_or_default();
    files.sort();
    files
}
