//! # escape-ngg
//!
//! Converts NextGen Gallery shortcodes in WordPress posts into native
//! `[gallery]` shortcodes, importing every gallery image as an attachment
//! of the post.
//!
//! ## Usage
//!
//! ```bash
//! escape-ngg --config ./config/escape-ngg.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `escape-ngg run` | Migrate every post that still embeds `[nggallery]` |
//! | `escape-ngg status` | Count what is left and check database/REST access |
//!
//! ## Examples
//!
//! ```bash
//! # See what would change
//! escape-ngg run --dry-run
//!
//! # Migrate posts from 2011 only, with per-image detail
//! WP_APP_PASSWORD=... escape-ngg run --start_date 2011-01-01 --end_date 2011-12-31 --verbose
//!
//! # Migrate two specific posts
//! escape-ngg run --post__in 42,57
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use escape_ngg::options::RunOptions;
use escape_ngg::{config, logging, migrate, status};

/// escape-ngg: migrate NextGen Gallery shortcodes to native WordPress galleries.
#[derive(Parser)]
#[command(
    name = "escape-ngg",
    about = "Migrate NextGen Gallery shortcodes to native WordPress [gallery] shortcodes",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/escape-ngg.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert NGG galleries to core WP galleries.
    ///
    /// Posts and pages of any status whose content contains `[nggallery`
    /// are processed in batches of 50. Safe to re-run: posts that could not
    /// be migrated are picked up again.
    Run {
        /// Show more information about the process on stdout.
        #[arg(long)]
        verbose: bool,

        /// Resolve galleries and report what would change without importing
        /// or writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Stop after examining this many posts.
        #[arg(long)]
        limit: Option<u64>,

        /// Only posts newer than this date (YYYY-MM-DD).
        #[arg(long = "start_date", alias = "start-date")]
        start_date: Option<String>,

        /// Only posts older than this date (YYYY-MM-DD).
        #[arg(long = "end_date", alias = "end-date")]
        end_date: Option<String>,

        /// Only these posts, as a comma-separated list of IDs.
        #[arg(long = "post__in", alias = "post-in")]
        post_in: Option<String>,

        /// Accepted for compatibility; validated only.
        #[arg(long = "post_type", alias = "post-type")]
        post_type: Option<String>,

        /// Accepted for compatibility; validated only.
        #[arg(long)]
        author: Option<String>,

        /// Accepted for compatibility; validated only.
        #[arg(long)]
        category: Option<String>,

        /// Accepted for compatibility; validated only.
        #[arg(long = "post_status", alias = "post-status")]
        post_status: Option<String>,
    },

    /// Show remaining legacy galleries and check database and REST access.
    Status,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            verbose,
            dry_run,
            limit,
            start_date,
            end_date,
            post_in,
            post_type,
            author,
            category,
            post_status,
        } => {
            let opts = RunOptions {
                start_date,
                end_date,
                post_in,
                post_type,
                author,
                category,
                post_status,
                verbose,
                dry_run,
                limit,
            };

            // Options are checked before anything touches the site.
            if let Err(problems) = opts.validate() {
                for problem in problems {
                    eprintln!("Error: {}", problem);
                }
                std::process::exit(1);
            }

            logging::init_tracing(if verbose {
                "escape_ngg=debug"
            } else {
                "escape_ngg=warn"
            })?;
            let cfg = config::load_config(&cli.config)?;
            migrate::run_migration(&cfg, &opts).await?;
        }
        Commands::Status => {
            logging::init_tracing("escape_ngg=warn")?;
            let cfg = config::load_config(&cli.config)?;
            status::run_status(&cfg).await?;
        }
    }

    Ok(())
}
