use crate::cli::OutputFormat;
use crate::error::{AllergenScanError, Result};
use allergen_scan_common::{KnowledgeBaseStore, KnowledgeSnapshot};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 知識ベースのパスを上書きする環境変数
pub const KB_ENV_VAR: &str = "ALLERGEN_SCAN_KB";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 知識ベースJSON（未設定なら組み込み）
    pub knowledge_base_path: Option<PathBuf>,
    /// バッチの並列数（0 = CPU数）
    pub default_jobs: usize,
    pub output_format: OutputFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            knowledge_base_path: None,
            default_jobs: 0,
            output_format: OutputFormat::Text,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| AllergenScanError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("allergen-scan").join("config.json"))
    }

    /// 使用する知識ベースのパス
    ///
    /// 優先順位: 引数 > 環境変数 > 設定ファイル。どれもなければ組み込み。
    pub fn knowledge_base_path(&self, explicit: Option<&Path>) -> Option<PathBuf> {
        resolve_knowledge_base_path(
            explicit,
            std::env::var(KB_ENV_VAR).ok(),
            self.knowledge_base_path.as_deref(),
        )
    }

    /// 知識ベースを読み込んでストアを作る
    ///
    /// 読み込めない場合は空の知識ベースで続行せずエラーにする。
    pub fn open_store(&self, explicit: Option<&Path>) -> Result<KnowledgeBaseStore> {
        let snapshot = match self.knowledge_base_path(explicit) {
            Some(path) => {
                if !path.exists() {
                    return Err(AllergenScanError::FileNotFound(path.display().to_string()));
                }
                KnowledgeSnapshot::from_file(&path)?
            }
            None => KnowledgeSnapshot::builtin()?,
        };
        Ok(KnowledgeBaseStore::new(snapshot))
    }

    pub fn set_knowledge_base_path(&mut self, path: PathBuf) -> Result<()> {
        self.knowledge_base_path = Some(path);
        self.save()
    }

    /// 並列数（0はCPU数に読み替え）
    pub fn jobs(&self, requested: Option<usize>) -> usize {
        match requested.unwrap_or(self.default_jobs) {
            0 => rayon::current_num_threads(),
            n => n,
        }
    }
}

/// 引数・環境変数の値・設定ファイルの値から知識ベースのパスを決める
fn resolve_knowledge_base_path(
    explicit: Option<&Path>,
    env_value: Option<String>,
    configured: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    // 空文字の環境変数は未設定扱い
    if let Some(path) = env_value.filter(|v| !v.trim().is_empty()) {
        return Some(PathBuf::from(path));
    }
    configured.map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // 環境変数を触るテストは直列に実行する
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_missing_config_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert!(config.knowledge_base_path.is_none());
        assert_eq!(config.default_jobs, 0);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            knowledge_base_path: Some(PathBuf::from("/tmp/kb.json")),
            default_jobs: 4,
            output_format: OutputFormat::Json,
        };
        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.knowledge_base_path, config.knowledge_base_path);
        assert_eq!(loaded.default_jobs, 4);
        assert_eq!(loaded.output_format, OutputFormat::Json);
    }

    #[test]
    fn test_explicit_path_wins() {
        let config = Config {
            knowledge_base_path: Some(PathBuf::from("/from/config.json")),
            ..Default::default()
        };
        let explicit = PathBuf::from("/from/arg.json");
        assert_eq!(config.knowledge_base_path(Some(&explicit)), Some(explicit));
    }

    #[test]
    fn test_path_precedence() {
        let arg = Path::new("/from/arg.json");
        let configured = Path::new("/from/config.json");
        let env = || Some("/from/env.json".to_string());

        assert_eq!(
            resolve_knowledge_base_path(Some(arg), env(), Some(configured)),
            Some(arg.to_path_buf())
        );
        assert_eq!(
            resolve_knowledge_base_path(None, env(), Some(configured)),
            Some(PathBuf::from("/from/env.json"))
        );
        assert_eq!(
            resolve_knowledge_base_path(None, Some("  ".into()), Some(configured)),
            Some(configured.to_path_buf())
        );
        assert_eq!(resolve_knowledge_base_path(None, None, None), None);
    }

    #[test]
    fn test_env_var_overrides_config_file() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let kb_path = dir.path().join("env-kb.json");
        let mut kb = allergen_scan_common::KnowledgeBase::builtin().unwrap();
        kb.version = "from-env".into();
        kb.save(&kb_path).unwrap();

        let config = Config {
            knowledge_base_path: Some(dir.path().join("missing.json")),
            ..Default::default()
        };

        std::env::set_var(KB_ENV_VAR, &kb_path);
        let resolved = config.knowledge_base_path(None);
        let store = config.open_store(None);
        std::env::remove_var(KB_ENV_VAR);

        assert_eq!(resolved, Some(kb_path));
        assert_eq!(store.unwrap().snapshot().version(), "from-env");
        assert_eq!(config.knowledge_base_path(None), config.knowledge_base_path);
    }

    #[test]
    fn test_jobs_zero_means_all_cpus() {
        let config = Config::default();
        assert!(config.jobs(None) >= 1);
        assert_eq!(config.jobs(Some(3)), 3);
    }

    #[test]
    fn test_open_store_missing_file() {
        let config = Config::default();
        let err = config
            .open_store(Some(Path::new("/nonexistent/kb-98765.json")))
            .unwrap_err();
        assert!(matches!(err, AllergenScanError::FileNotFound(_)));
    }
}
