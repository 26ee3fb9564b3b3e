use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "catalog-recon")]
#[command(about = "Re-attach product images in a JSON catalog and flag duplicates", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Repair broken image references and write the catalog back
    Run {
        /// Catalog JSON file
        #[arg(required = true)]
        catalog: PathBuf,

        /// Image directories to match against (repeatable)
        #[arg(short, long = "images", required = true, num_args = 1..)]
        images: Vec<PathBuf>,

        /// Decide and report, but leave the catalog untouched
        #[arg(long)]
        dry_run: bool,

        /// Token-subset threshold (0.0-1.0)
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Keyword-category threshold (0.0-1.0)
        #[arg(long)]
        keyword_threshold: Option<f64>,

        /// Scan image directories recursively
        #[arg(short = 'r', long)]
        recursive: bool,

        /// Directory image references are relative to (default: catalog directory)
        #[arg(long)]
        asset_root: Option<PathBuf>,

        /// Backup directory (default: <catalog dir>/backups)
        #[arg(long)]
        backup_dir: Option<PathBuf>,

        /// Report directory (default: <catalog dir>/reports)
        #[arg(long)]
        report_dir: Option<PathBuf>,

        /// Drop entries flagged as duplicates
        #[arg(long)]
        remove_duplicates: bool,

        /// Keyword table JSON ({"keyword": ["Category", ...]})
        #[arg(long)]
        keywords: Option<PathBuf>,
    },

    /// Scan image directories and list what would be matched against
    Scan {
        /// Image directories (repeatable)
        #[arg(short, long = "images", required = true, num_args = 1..)]
        images: Vec<PathBuf>,

        /// Scan recursively
        #[arg(short = 'r', long)]
        recursive: bool,

        /// Print JSON instead of a listing
        #[arg(long)]
        json: bool,
    },

    /// List duplicate products without changing anything
    Duplicates {
        /// Catalog JSON file
        #[arg(required = true)]
        catalog: PathBuf,

        /// Directory image references are relative to (default: catalog directory)
        #[arg(long)]
        asset_root: Option<PathBuf>,

        /// Print JSON instead of a listing
        #[arg(long)]
        json: bool,
    },

    /// Put a backup back in place of the catalog
    Restore {
        /// Backup file
        #[arg(required = true)]
        backup: PathBuf,

        /// Catalog JSON file to replace
        #[arg(required = true)]
        catalog: PathBuf,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show or create the config file
    Config {
        /// Show the effective configuration
        #[arg(long)]
        show: bool,

        /// Write the current configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_multiple_image_dirs() {
        let cli = Cli::parse_from([
            "catalog-recon", "run", "products.json",
            "--images", "a", "b",
            "--dry-run", "--threshold", "0.8", "-v",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Run { catalog, images, dry_run, threshold, remove_duplicates, .. } => {
                assert_eq!(catalog, PathBuf::from("products.json"));
                assert_eq!(images, vec![PathBuf::from("a"), PathBuf::from("b")]);
                assert!(dry_run);
                assert_eq!(threshold, Some(0.8));
                assert!(!remove_duplicates);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_requires_images() {
        assert!(Cli::try_parse_from(["catalog-recon", "run", "products.json"]).is_err());
    }

    #[test]
    fn test_parse_restore() {
        let cli = Cli::parse_from(["catalog-recon", "restore", "old.json", "products.json", "--yes"]);
        assert!(matches!(cli.command, Commands::Restore { yes: true, .. }));
    }
}
