mod crawler;
mod db;
mod describe;
mod discover;
mod error;
mod fetch;
mod filter;
mod model;
mod settings;

use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::crawler::{CrawlObserver, Crawler};
use crate::db::SoftwareStore;
use crate::error::CrawlError;
use crate::fetch::HttpFetcher;
use crate::model::Software;
use crate::settings::{FailurePolicy, Settings};

#[derive(Parser)]
#[command(name = "sara", about = "Collects iGEM team software pages into a local library")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl one year's team wikis and store their software pages
    Crawl {
        year: i64,
        /// Replace records already stored for this year
        #[arg(long)]
        overwrite: bool,
        /// Keep going when a single team page fails
        #[arg(long)]
        skip_failed: bool,
    },
    /// List stored software, sorted by year then team
    List {
        #[arg(short, long)]
        year: Option<i64>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add or replace one entry by hand
    Put {
        #[arg(long)]
        team: String,
        #[arg(long)]
        year: i64,
        #[arg(long)]
        description: String,
    },
    /// Drop every stored record
    Reset {
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load().context("Failed to load settings")?;
    info!(db = ?settings.db_path, index = %settings.index_url, "Settings loaded");

    let store = SoftwareStore::open(&settings.db_path)
        .with_context(|| format!("Failed to open {:?}", settings.db_path))?;

    match cli.command {
        Commands::Crawl {
            year,
            overwrite,
            skip_failed,
        } => {
            if store.exists(year)? && !overwrite {
                println!(
                    "Software from {} is already in the library. Re-run with --overwrite to replace it.",
                    year
                );
                return Ok(());
            }
            let policy = if skip_failed {
                FailurePolicy::Skip
            } else {
                settings.failure_policy
            };
            let fetcher = HttpFetcher::new(settings.timeout(), settings.user_agent.as_deref())?;
            let crawler = Crawler::new(fetcher, store.clone(), &settings.index_url, policy);

            println!("Searching the web for software from {}...", year);
            let mut bar = CrawlBar::new();
            let handle = crawler.start_crawl(year)?;
            info!(year = handle.year, "Crawl started");
            handle.observe(&mut bar).await?;
            info!(state = ?crawler.state(), "Crawl finished");

            let rows = store.by_year(year)?;
            print_rows(&rows);
            println!("Finished: {} team(s) with software in {}.", rows.len(), year);
        }
        Commands::List { year, json } => {
            let rows = match year {
                Some(y) => store.by_year(y)?,
                None => store.all()?,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if rows.is_empty() {
                println!("No software found.");
            } else {
                print_rows(&rows);
                println!("\n{} entries", rows.len());
            }
        }
        Commands::Put {
            team,
            year,
            description,
        } => {
            if team.trim().is_empty() {
                bail!("--team must not be empty");
            }
            store.upsert(&Software::new(team.trim(), description, year))?;
            println!("Saved {} ({}).", team.trim(), year);
        }
        Commands::Reset { yes } => {
            if !yes {
                bail!("Refusing to drop the library without --yes");
            }
            store.reset()?;
            println!("Library cleared.");
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }
    Ok(())
}

/// Terminal progress: candidate count ticks up, each kept team is printed above it.
struct CrawlBar {
    pb: ProgressBar,
    found: usize,
}

impl CrawlBar {
    fn new() -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {pos} team pages checked, {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message("0 with software");
        CrawlBar { pb, found: 0 }
    }
}

impl CrawlObserver for CrawlBar {
    fn on_progress(&mut self, increment: u32) {
        self.pb.inc(u64::from(increment));
    }

    fn on_record(&mut self, software: &Software) {
        self.found += 1;
        self.pb.set_message(format!("{} with software", self.found));
        self.pb.println(format!("  + {}", software.team));
    }

    fn on_done(&mut self) {
        self.pb.finish_and_clear();
    }

    fn on_error(&mut self, error: &CrawlError) {
        self.pb.abandon_with_message(format!("stopped: {}", error));
    }
}

fn print_rows(rows: &[Software]) {
    for sw in rows {
        println!("{} | {}", sw.year, sw.team);
        println!("    {}", sw.description);
    }
}
