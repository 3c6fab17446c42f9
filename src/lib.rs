//! allergen-scan
//!
//! 判定エンジン（allergen-scan-common）を駆動するCLI側のライブラリ。
//! 単発解析・バッチ解析・知識ベースのキュレーションを提供する。

pub mod batch;
pub mod cli;
pub mod config;
pub mod curation;
pub mod error;
pub mod report;
