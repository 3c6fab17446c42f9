use thiserror::Error;

#[derive(Error, Debug)]
pub enum AllergenScanError {
    /// 知識ベースの読み込み・検証エラー（エンジン側）
    #[error(transparent)]
    Knowledge(#[from] allergen_scan_common::Error),

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("バッチ入力が不正: {0}")]
    InvalidBatchInput(String),

    #[error("材料テキストが指定されていません。引数か --file で指定してください")]
    MissingInput,

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AllergenScanError>;
