use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "allergen-scan")]
#[command(about = "レシピ材料テキストのアレルゲン判定ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 材料テキストを解析
    Analyze {
        /// 材料テキスト（省略時は --file）
        text: Option<String>,

        /// 材料テキストのファイル
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// 知識ベースJSON（省略時は設定または組み込み）
        #[arg(long)]
        kb: Option<PathBuf>,

        /// 結果JSONの出力先
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 標準出力にJSONで出す
        #[arg(long)]
        json: bool,
    },

    /// レシピJSONをまとめて解析
    Batch {
        /// 入力JSONファイル（レシピの配列）
        #[arg(required = true)]
        input: PathBuf,

        /// 出力JSONファイル（デフォルト: 入力と同じフォルダの allergen-results.json）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 並列数（0 = CPU数）
        #[arg(short, long)]
        jobs: Option<usize>,

        /// キャッシュを使用（同じ材料テキストの再解析をスキップ）
        #[arg(long)]
        use_cache: bool,

        /// 知識ベースJSON
        #[arg(long)]
        kb: Option<PathBuf>,
    },

    /// 知識ベースの参照・編集
    Kb {
        #[command(subcommand)]
        action: KbAction,
    },

    /// 設定を表示/編集
    Config {
        /// 知識ベースJSONのパスを設定
        #[arg(long)]
        set_kb: Option<PathBuf>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },

    /// キャッシュ管理
    Cache {
        /// キャッシュを削除
        #[arg(long)]
        clear: bool,

        /// 対象フォルダ（省略時はカレント）
        #[arg(short, long)]
        folder: Option<PathBuf>,

        /// キャッシュ情報を表示
        #[arg(long)]
        info: bool,
    },
}

#[derive(Subcommand)]
pub enum KbAction {
    /// カテゴリ一覧
    List {
        #[arg(long)]
        kb: Option<PathBuf>,
    },

    /// カテゴリの詳細
    Show {
        /// カテゴリID（例: milk）
        #[arg(required = true)]
        id: String,

        #[arg(long)]
        kb: Option<PathBuf>,
    },

    /// 現在の知識ベースをJSONに書き出す
    Export {
        #[arg(required = true)]
        path: PathBuf,

        #[arg(long)]
        kb: Option<PathBuf>,
    },

    /// 知識ベースJSONを検証
    Validate {
        #[arg(required = true)]
        path: PathBuf,
    },

    /// 知識ベースJSONのカテゴリを更新（なければ追加）
    Update {
        /// 更新する知識ベースJSON
        #[arg(required = true)]
        path: PathBuf,

        /// カテゴリID
        #[arg(short, long)]
        category: String,

        /// 表示名（新規カテゴリでは必須）
        #[arg(long)]
        name: Option<String>,

        /// 正規名を追加
        #[arg(long = "add-term")]
        add_terms: Vec<String>,

        /// 同義語を追加
        #[arg(long = "add-synonym")]
        add_synonyms: Vec<String>,

        /// 隠れ原料を追加
        #[arg(long = "add-hidden")]
        add_hidden: Vec<String>,

        /// 学名を追加
        #[arg(long = "add-scientific")]
        add_scientific: Vec<String>,

        /// 除外表現を追加
        #[arg(long = "add-exclusion")]
        add_exclusions: Vec<String>,

        /// 重症度重み (0.0-1.0)
        #[arg(long)]
        severity: Option<f64>,

        /// 検出閾値 (0.0-1.0)
        #[arg(long)]
        threshold: Option<f64>,

        /// 知識ベースのバージョンを設定
        #[arg(long)]
        version: Option<String>,
    },
}

/// 解析結果の表示形式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
