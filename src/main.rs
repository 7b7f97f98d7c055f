// Snapshot CLI
//
// Captures a JavaScript-rendered page (and a few same-site subpages) into a
// directory that renders offline.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use kodegen_tools_snapshot::utils::{
    DEFAULT_MAX_PAGES, DEFAULT_SCROLL_PASSES, DEFAULT_STABLE_STREAK, DEFAULT_WAIT_IDLE_MS,
    slugify, timestamped_dir_name,
};
use kodegen_tools_snapshot::{
    CaptureJob, CaptureMode, InteractionPolicy, LogProgress, ScrollStrategy, capture_with_progress,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Page to capture
    url: String,

    /// Output directory (default: snapshot_<timestamp>)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Output directory name, slugified; ignored when --out is given
    #[arg(long)]
    name: Option<String>,

    /// static, interactive or singlefile
    #[arg(short, long, default_value_t = CaptureMode::Static)]
    mode: CaptureMode,

    /// Idle wait after each scroll pass and click, in milliseconds
    #[arg(long, default_value_t = DEFAULT_WAIT_IDLE_MS)]
    wait_ms: u64,

    /// Scroll passes per page (upper bound with --adaptive-scroll)
    #[arg(long, default_value_t = DEFAULT_SCROLL_PASSES)]
    scroll_passes: u32,

    /// Stop scrolling once the page height stops changing
    #[arg(long)]
    adaptive_scroll: bool,

    /// Unchanged passes that end adaptive scrolling
    #[arg(long, default_value_t = DEFAULT_STABLE_STREAK)]
    stable_streak: u32,

    /// Delay before every click and scroll, in milliseconds
    #[arg(long, default_value_t = 0)]
    slow_mo_ms: u64,

    /// Maximum pages captured, start page included
    #[arg(long, default_value_t = DEFAULT_MAX_PAGES)]
    max_pages: usize,

    #[arg(long)]
    no_follow_subpages: bool,

    /// Follow links outside the start URL's registered domain
    #[arg(long)]
    allow_cross_domain: bool,

    /// YAML (or JSON) file overriding the interaction policy
    #[arg(long)]
    interactions: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    headful: bool,

    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn output_dir(&self) -> PathBuf {
        match (&self.out, &self.name) {
            (Some(out), _) => out.clone(),
            (None, Some(name)) => PathBuf::from(slugify(name)),
            (None, None) => PathBuf::from(timestamped_dir_name()),
        }
    }

    fn scroll(&self) -> ScrollStrategy {
        if self.adaptive_scroll {
            ScrollStrategy::Adaptive {
                max_passes: self.scroll_passes,
                stable_streak: self.stable_streak,
            }
        } else {
            ScrollStrategy::Fixed {
                passes: self.scroll_passes,
            }
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let policy = InteractionPolicy::load(args.interactions.as_deref()).await;
    let job = CaptureJob::builder()
        .output_dir(args.output_dir())
        .start_url(args.url.clone())
        .mode(args.mode)
        .wait_idle_ms(args.wait_ms)
        .scroll(args.scroll())
        .slow_mo_ms(args.slow_mo_ms)
        .max_pages(args.max_pages)
        .follow_subpages(!args.no_follow_subpages)
        .same_domain_only(!args.allow_cross_domain)
        .policy(policy)
        .headless(!args.headful)
        .build()
        .context("Invalid capture options")?;

    let report = capture_with_progress(job, Arc::new(LogProgress))
        .await
        .context("Capture failed")?;

    println!("Output: {}", report.out_dir.display());
    for page in &report.pages {
        println!("  [{}] {} -> {}", page.page_number, page.url, page.path.display());
    }
    println!(
        "Assets: {}  API responses: {}  Interactions: {} ({} failed)",
        report.assets_written,
        report.api_responses_cached,
        report.actions.len(),
        report.failed_actions()
    );
    if let Some(screenshot) = &report.screenshot {
        println!("Screenshot: {}", screenshot.display());
    }
    if let Some(single) = &report.single_file {
        println!("Single file: {}", single.display());
    }
    Ok(())
}
