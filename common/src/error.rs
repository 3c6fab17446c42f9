//! エラー型定義
//!
//! エンジンが返すエラーは知識ベースの読み込み・検証に関するものだけ。
//! 解析1回ごとの入力不備はエラーにせず、結果オブジェクトに吸収する。

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// 知識ベースが存在しない・壊れている・整合性を満たさない
    #[error("Config error: {0}")]
    Config(String),
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
