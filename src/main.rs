use allergen_scan::{batch, cli, config, curation, report};
use allergen_scan::error::AllergenScanError;
use allergen_scan_common::{CategoryPatch, KnowledgeBase};
use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands, KbAction, OutputFormat};
use config::Config;
use std::path::{Path, PathBuf};

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = Config::load()?;

    match cli.command {
        Commands::Analyze { text, file, kb, output, json } => {
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("材料ファイルを読めません: {}", path.display()))?,
                (None, None) => return Err(AllergenScanError::MissingInput.into()),
            };

            let store = config.open_store(kb.as_deref())?;
            let snapshot = store.snapshot();
            let result = snapshot.analyze(&text);

            let as_json = json || config.output_format == OutputFormat::Json;
            if as_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", report::render_text(&result, snapshot.knowledge_base()));
            }

            if let Some(output) = output {
                std::fs::write(&output, serde_json::to_string_pretty(&result)?)?;
                if !as_json {
                    println!("\n✔ 結果を保存: {}", output.display());
                }
            }
        }

        Commands::Batch { input, output, jobs, use_cache, kb } => {
            println!("🧪 allergen-scan - バッチ解析\n");

            // 1. 入力読み込み
            println!("[1/3] レシピを読み込み中...");
            let recipes = batch::load_recipes(&input)?;
            println!("✔ {}件のレシピ\n", recipes.len());

            let store = config.open_store(kb.as_deref())?;
            let snapshot = store.snapshot();
            let jobs = config.jobs(jobs);

            // 2. 解析
            println!(
                "[2/3] 解析中... (知識ベース {}, {}並列){}",
                snapshot.version(),
                jobs,
                if use_cache { " (キャッシュ有効)" } else { "" }
            );
            let records = if use_cache {
                let folder = input.parent().unwrap_or(Path::new("."));
                let (records, stats) =
                    batch::analyze_recipes_with_cache(&recipes, &snapshot, folder, jobs, true)?;
                println!("  キャッシュ: {}件ヒット / {}件解析", stats.hits, stats.misses);
                records
            } else {
                batch::analyze_recipes(&recipes, &snapshot, jobs, true)?
            };
            let flagged = records.iter().filter(|r| !r.analysis.detected_allergens.is_empty()).count();
            println!("✔ 解析完了（アレルゲン検出 {}件）\n", flagged);

            // 3. 結果保存
            println!("[3/3] 結果を保存中...");
            let output = output.unwrap_or_else(|| {
                input
                    .parent()
                    .unwrap_or(Path::new("."))
                    .join("allergen-results.json")
            });
            std::fs::write(&output, serde_json::to_string_pretty(&records)?)?;
            println!("✔ 結果を保存: {}", output.display());

            println!("\n✅ バッチ解析完了");
        }

        Commands::Kb { action } => run_kb(action, &config)?,

        Commands::Config { set_kb, show } => {
            let mut config = config;

            if let Some(path) = set_kb {
                KnowledgeBase::from_file(&path)
                    .with_context(|| format!("知識ベースとして読めません: {}", path.display()))?;
                config.set_knowledge_base_path(path)?;
                println!("✔ 知識ベースを設定しました");
            }

            if show {
                println!("設定:");
                println!("  設定ファイル: {}", Config::config_path()?.display());
                println!(
                    "  知識ベース: {}",
                    config
                        .knowledge_base_path(None)
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "組み込み".into())
                );
                println!("  並列数: {}", config.jobs(None));
                println!("  出力形式: {}", config.output_format);
            }
        }

        Commands::Cache { clear, folder, info } => {
            let target = folder.unwrap_or_else(|| PathBuf::from("."));
            let cache_path = batch::CacheFile::cache_path(&target);

            if info || !clear {
                // デフォルトまたは--info: 情報表示
                if cache_path.exists() {
                    let cache = batch::CacheFile::load(&target);
                    println!("キャッシュ情報:");
                    println!("  パス: {}", cache_path.display());
                    println!("  件数: {}", cache.len());
                    if let Ok(meta) = std::fs::metadata(&cache_path) {
                        println!("  サイズ: {} bytes", meta.len());
                    }
                } else {
                    println!("キャッシュファイルが存在しません: {}", cache_path.display());
                }
            }

            if clear {
                match batch::CacheFile::clear(&target) {
                    Ok(true) => println!("✔ キャッシュを削除しました: {}", cache_path.display()),
                    Ok(false) => println!("キャッシュファイルが存在しません"),
                    Err(e) => println!("キャッシュ削除エラー: {}", e),
                }
            }
        }
    }

    Ok(())
}

fn run_kb(action: KbAction, config: &Config) -> anyhow::Result<()> {
    match action {
        KbAction::List { kb } => {
            let store = config.open_store(kb.as_deref())?;
            let snapshot = store.snapshot();
            let base = snapshot.knowledge_base();
            println!("知識ベース {} ({}カテゴリ)", base.version, base.categories.len());
            for category in base.list_categories() {
                println!(
                    "  {:<12} {:<12} 重症度 {:.2}  閾値 {:.2}  用語 {}",
                    category.id,
                    category.name,
                    category.severity_weight,
                    base.detection_threshold(&category.id),
                    category.term_count()
                );
            }
        }

        KbAction::Show { id, kb } => {
            let store = config.open_store(kb.as_deref())?;
            let snapshot = store.snapshot();
            let category = snapshot
                .knowledge_base()
                .category(&id)
                .ok_or_else(|| AllergenScanError::Config(format!("unknown category '{}'", id)))?;
            println!("{}", serde_json::to_string_pretty(category)?);
        }

        KbAction::Export { path, kb } => {
            let store = config.open_store(kb.as_deref())?;
            store.snapshot().knowledge_base().save(&path)?;
            println!("✔ 知識ベースを書き出しました: {}", path.display());
        }

        KbAction::Validate { path } => {
            let base = KnowledgeBase::from_file(&path)?;
            // 索引の構築まで通れば解析に使える
            let snapshot = allergen_scan_common::KnowledgeSnapshot::new(base)?;
            println!(
                "✔ 有効な知識ベース: {} ({}カテゴリ, 用語 {})",
                snapshot.version(),
                snapshot.knowledge_base().categories.len(),
                snapshot.index().len()
            );
        }

        KbAction::Update {
            path,
            category,
            name,
            add_terms,
            add_synonyms,
            add_hidden,
            add_scientific,
            add_exclusions,
            severity,
            threshold,
            version,
        } => {
            let update = curation::CategoryUpdate {
                category_id: category,
                patch: CategoryPatch {
                    name,
                    description: None,
                    severity_weight: severity,
                    detection_threshold: threshold,
                    add_canonical_terms: add_terms,
                    add_synonyms,
                    add_hidden_sources: add_hidden,
                    add_scientific_names: add_scientific,
                    add_exclusions,
                },
                version,
            };
            let (base, outcome) = curation::update_file(&path, &update)?;
            let verb = match outcome {
                curation::UpdateOutcome::Created => "追加",
                curation::UpdateOutcome::Updated => "更新",
            };
            println!(
                "✔ カテゴリ '{}' を{}しました（知識ベース {}）",
                update.category_id.trim().to_lowercase(),
                verb,
                base.version
            );
        }
    }

    Ok(())
}
