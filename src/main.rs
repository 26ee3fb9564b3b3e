use anyhow::Context;
use catalog_recon::{catalog, cli, config, pipeline, reconciler, resolver, scanner, transaction};
use catalog_recon_common::DecisionStatus;
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use dialoguer::Confirm;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = execute(cli);
    if let Err(e) = &result {
        tracing::error!(error = %e, "aborted");
    }
    result
}

fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load().context("loading config")?;

    match cli.command {
        Commands::Run {
            catalog,
            images,
            dry_run,
            threshold,
            keyword_threshold,
            recursive,
            asset_root,
            backup_dir,
            report_dir,
            remove_duplicates,
            keywords,
        } => {
            println!("🛒 catalog-recon - reconcile\n");

            // CLI flags win over the config file
            let mut config = config;
            if let Some(t) = threshold {
                config.token_subset_threshold = t;
            }
            if let Some(t) = keyword_threshold {
                config.keyword_threshold = t;
            }
            config.recursive |= recursive;
            config.validate()?;

            let mut options = pipeline::RunOptions::new(&catalog, images);
            options.dry_run = dry_run;
            options.scan = scanner::ScanOptions { recursive: config.recursive };
            options.match_options = config.match_options();
            options.keywords = config.keyword_table(keywords.as_deref())?;
            options.asset_root = asset_root.or_else(|| config.asset_root.clone());
            options.ref_prefix = config.ref_prefix.clone();
            options.placeholder_pattern = config.placeholder_pattern.clone();
            options.auto_generated_tags = config.auto_generated_tags.clone();
            options.remove_duplicates = remove_duplicates;
            options.commit = transaction::CommitOptions {
                backup_dir: backup_dir.or_else(|| config.backup_dir.clone()),
                report_dir: report_dir.or_else(|| config.report_dir.clone()),
            };

            let outcome = pipeline::run(&options)?;

            for decision in outcome
                .report
                .decisions
                .iter()
                .filter(|d| d.status == DecisionStatus::Matched)
            {
                println!(
                    "✔ {} {} -> {} [{} {:.2}]",
                    decision.catalog_entry_id,
                    decision.entry_name,
                    decision.image_ref.as_deref().unwrap_or("-"),
                    decision.tier,
                    decision.score
                );
            }
            println!();
            outcome.report.print_summary();
            println!("\n✔ Report: {}", outcome.report_path.display());

            if dry_run {
                println!("\n✅ Dry run finished, catalog not modified");
            } else if outcome.backup_path.is_some() {
                println!("\n✅ Catalog updated");
            } else {
                println!("\n✅ Nothing to change");
            }
        }

        Commands::Scan { images, recursive, json } => {
            let options = scanner::ScanOptions {
                recursive: recursive || config.recursive,
            };
            let index = scanner::build_index(&images, options);

            if json {
                let out = serde_json::json!({
                    "images": index.all_candidates().collect::<Vec<_>>(),
                    "keyCollisions": index.collisions(),
                    "directoryErrors": index.directory_errors(),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("🔍 catalog-recon - scan\n");
                for image in index.all_candidates() {
                    println!("  [{}] {}", image.category, image.absolute_path.display());
                }
                for collision in index.collisions() {
                    println!(
                        "  ⚠ key \"{}\": kept {}, ignored {}",
                        collision.key,
                        collision.kept.display(),
                        collision.discarded.display()
                    );
                }
                for error in index.directory_errors() {
                    println!("  ✖ {}: {}", error.directory.display(), error.message);
                }
                println!("\n✔ {} images", index.len());
            }
        }

        Commands::Duplicates { catalog, asset_root, json } => {
            let document = catalog::CatalogDocument::load(&catalog)?;
            let root = asset_root
                .or_else(|| config.asset_root.clone())
                .unwrap_or_else(|| catalog_dir(&catalog));
            let resolver = resolver::FsResolver::new(&root)
                .with_placeholder(config.placeholder_pattern.as_deref())?;
            let groups =
                reconciler::detect_duplicates(&document.entries, &resolver, &config.auto_generated_tags);

            if json {
                println!("{}", serde_json::to_string_pretty(&groups)?);
            } else {
                println!("👥 catalog-recon - duplicates\n");
                for group in &groups {
                    println!(
                        "  {:?} \"{}\": keep {}, duplicates {}",
                        group.reason,
                        group.key,
                        group.canonical_id,
                        group.duplicate_ids.join(", ")
                    );
                }
                println!("\n✔ {} group(s)", groups.len());
            }
        }

        Commands::Restore { backup, catalog, yes } => {
            if !yes {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Replace {} with {}?", catalog.display(), backup.display()))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("Cancelled");
                    return Ok(());
                }
            }

            let options = transaction::CommitOptions {
                backup_dir: config.backup_dir.clone(),
                report_dir: config.report_dir.clone(),
            };
            let safety = transaction::restore(&backup, &catalog, &options)?;
            if let Some(path) = safety {
                println!("✔ Previous catalog saved to {}", path.display());
            }
            println!("✅ Restored {}", catalog.display());
        }

        Commands::Config { show, init } => {
            if init {
                let path = config.save()?;
                println!("✔ Config written to {}", path.display());
            }

            if show || !init {
                println!("Config ({}):", Config::config_path()?.display());
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

fn catalog_dir(catalog: &Path) -> std::path::PathBuf {
    match catalog.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    }
}
