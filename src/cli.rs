use clap::{Parser, Subcommand};
use crate::engine::ShipmentType;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "warehouse-recon")]
#[command(about = "マーキング写真と仕様書による出荷照合ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// ファイル確認から帳票生成まで一括実行
    Run {
        /// 仕様書（Excel）
        #[arg(long)]
        spec: PathBuf,

        /// 納品書テンプレート（Excel）
        #[arg(long)]
        template: PathBuf,

        /// マーキング写真フォルダ
        #[arg(long)]
        photos: PathBuf,

        /// 出荷種別 (full/partial)。省略時は対話入力
        #[arg(long)]
        shipment_type: Option<ShipmentType>,

        /// 出荷日 (ДД.ММ.ГГГГ)。省略時は対話入力
        #[arg(short, long)]
        date: Option<String>,

        /// 作業ディレクトリ（省略時は設定値）
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// 写真1枚あたりの認識タイムアウト（秒）
        #[arg(long)]
        timeout: Option<u64>,

        /// 認識の同時実行数
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// 認識キャッシュを使わない
        #[arg(long)]
        no_cache: bool,
    },

    /// 写真フォルダの品質チェック
    Quality {
        /// 写真フォルダのパス
        #[arg(required = true)]
        folder: PathBuf,
    },

    /// 寸法テキストから面積を計算
    Area {
        /// 例: "1200x600", "Плита 2000*1000 мм"
        #[arg(required = true)]
        text: String,
    },

    /// シートのヘッダー行と列の対応を表示
    Columns {
        /// Excelファイル
        #[arg(required = true)]
        file: PathBuf,
    },

    /// 作業ディレクトリの状態を表示
    Status {
        /// 作業ディレクトリ（省略時は設定値）
        #[arg(short, long)]
        workspace: Option<PathBuf>,
    },

    /// 作業ディレクトリとキャッシュを削除
    Reset {
        /// 作業ディレクトリ（省略時は設定値）
        #[arg(short, long)]
        workspace: Option<PathBuf>,
    },

    /// 設定を表示/編集
    Config {
        /// APIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}
