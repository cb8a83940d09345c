use clap::{ArgAction, Parser};
use dialoguer::{Confirm, Input};
use humansize::{DECIMAL, format_size};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use wcofun_cli::{
    DEFAULT_USER_AGENT, DownloadOptions, ProgressEvent, ReconciliationDecision,
    ReconciliationRequest, SeasonOneRule, SeasonSet, build_discovery, build_downloader,
    discover_series, download_seasons, validate_range,
};

/// Download all episodes of a cartoon, season by season.
///
/// Episodes already on disk are skipped, so an interrupted download can be
/// resumed by running the same command again.
#[derive(Parser, Debug)]
#[command(name = "wcofun-cli", version, about)]
struct Cli {
    /// URL of the cartoon to download
    cartoon_url: String,

    /// Directory the series directory is created in
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// First season to download (prompted for if omitted)
    #[arg(long)]
    start_season: Option<u32>,

    /// Last season to download (prompted for if omitted)
    #[arg(long)]
    end_season: Option<u32>,

    /// Retry missing episodes without asking
    #[arg(long, conflicts_with = "no_retry")]
    retry_missing: bool,

    /// Never retry missing episodes
    #[arg(long)]
    no_retry: bool,

    /// Assign every title to exactly the season its marker names, which also
    /// handles seasons 10 and above
    #[arg(long)]
    strict_seasons: bool,

    /// User agent for all requests
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Timeout in seconds for a single request
    #[arg(long, default_value_t = 600)]
    timeout_secs: u64,

    /// Always read the series page instead of using a cached episode list
    #[arg(long)]
    no_cache: bool,

    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn options(&self) -> DownloadOptions {
        DownloadOptions {
            output_dir: self.output_dir.clone(),
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            season_one_rule: if self.strict_seasons {
                SeasonOneRule::Strict
            } else {
                SeasonOneRule::SingleDigit
            },
            use_cache: !self.no_cache,
        }
    }
}

/// Logs go to stderr; RUST_LOG overrides the verbosity flags
fn setup_logging(verbose: u8) {
    let directive = match verbose {
        0 => "wcofun_cli=warn",
        1 => "wcofun_cli=info",
        _ => "wcofun_cli=debug",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Handles progress events and prints formatted output to stdout
fn handle_progress_event(event: ProgressEvent) {
    match event {
        ProgressEvent::FetchingEpisodes { url } => {
            println!(">> fetching episode links and detecting seasons from {}...", url);
        }
        ProgressEvent::EpisodesFetched {
            title_name,
            episode_count,
            seasons,
        } => {
            println!(">> found {} episode(s) of '{}'", episode_count, title_name);
            println!(">> available seasons: {}\n", seasons);
        }
        ProgressEvent::SeasonSkipped { season } => {
            println!(">> season {} not available. skipping...", season);
        }
        ProgressEvent::SeasonStarted {
            season,
            episode_count,
            directory,
        } => {
            println!("\n=== Season {} ===", season);
            println!(
                ">> there are {} episodes in season {} ({})",
                episode_count,
                season,
                directory.display()
            );
        }
        ProgressEvent::EpisodeSkipped { episode } => {
            println!(">> {} already downloaded", episode);
        }
        ProgressEvent::DownloadStarted { episode, url, .. } => {
            println!(">> preparing to download {} from {}", episode, url);
        }
        ProgressEvent::DownloadFinished {
            episode,
            position,
            total,
            elapsed,
            bytes,
        } => {
            println!(
                ">> {} downloaded successfully. {}/{} ({}, {:.2} seconds)",
                episode,
                position,
                total,
                format_size(bytes, DECIMAL),
                elapsed.as_secs_f64()
            );
        }
        ProgressEvent::DownloadFailed { episode, error } => {
            println!(">> error: {} failed to download ({}). moving on...", episode, error);
        }
        ProgressEvent::GapsFound { season, missing } => {
            let labels: Vec<String> = missing.iter().map(ToString::to_string).collect();
            println!(
                ">> found {} missing episode(s) in season {}: {}",
                missing.len(),
                season,
                labels.join(", ")
            );
        }
        ProgressEvent::RetryDeclined { .. } => {
            println!(">> skipping missing episodes...");
        }
        ProgressEvent::SeasonComplete {
            season,
            still_missing,
        } => {
            if still_missing.is_empty() {
                println!(">> all episodes of season {} downloaded successfully.", season);
            } else {
                println!(
                    ">> season {} finished with {} missing episode(s).",
                    season,
                    still_missing.len()
                );
            }
        }
        ProgressEvent::Complete { seasons, missing } => {
            println!("\n>> processed {} season(s).", seasons);
            if !missing.is_empty() {
                let labels: Vec<String> = missing.iter().map(ToString::to_string).collect();
                println!(">> missing episodes: {}", labels.join(", "));
            }
        }
    }
}

/// Asks for a season number unless it was given on the command line
fn season_or_prompt(given: Option<u32>, prompt: &str) -> Result<u32, dialoguer::Error> {
    match given {
        Some(season) => Ok(season),
        None => Input::<u32>::new().with_prompt(prompt).interact_text(),
    }
}

/// Decides whether the missing episodes of a season are retried
fn decide_retry(cli: &Cli, request: &ReconciliationRequest) -> ReconciliationDecision {
    if cli.retry_missing {
        return ReconciliationDecision::retry();
    }
    if cli.no_retry {
        return ReconciliationDecision::skip();
    }

    let prompt = format!(
        "Do you want to try downloading these missing episodes again? ({})",
        request.labels().join(", ")
    );

    match Confirm::new().with_prompt(prompt).default(true).interact() {
        Ok(true) => ReconciliationDecision::retry(),
        Ok(false) => ReconciliationDecision::skip(),
        Err(e) => {
            tracing::warn!(error = %e, "Could not ask for retry confirmation, skipping");
            ReconciliationDecision::skip()
        }
    }
}

fn prompt_range(cli: &Cli, seasons: &SeasonSet) -> Result<(u32, u32), dialoguer::Error> {
    let start = season_or_prompt(
        cli.start_season,
        "Please input the starting season you want to download",
    )?;
    let end = season_or_prompt(
        cli.end_season,
        "Please input the ending season you want to download",
    )?;

    tracing::debug!(start, end, available = %seasons, "Requested season range");
    Ok((start, end))
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    println!("\n===========");
    println!("wcofun-cli");
    println!("===========\n");

    let options = cli.options();

    let discovery = match build_discovery(&options) {
        Ok(discovery) => discovery,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let series = match discover_series(discovery.as_ref(), &cli.cartoon_url, handle_progress_event)
    {
        Ok(series) => series,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let (start, end) = match prompt_range(&cli, &series.seasons) {
        Ok(range) => range,
        Err(e) => {
            eprintln!("Error: could not read season range: {}", e);
            process::exit(1);
        }
    };

    let range = match validate_range(&series.seasons, start, end) {
        Ok(range) => range,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    for adjustment in &range.adjustments {
        println!(">> warning: {}", adjustment);
    }

    let downloader = match build_downloader(&options) {
        Ok(downloader) => downloader,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let result = download_seasons(
        &series,
        &range,
        &options,
        &downloader,
        |request| decide_retry(&cli, request),
        handle_progress_event,
    );

    match result {
        Ok(report) => {
            if report.is_complete() {
                println!(">> All episodes from all seasons downloaded successfully.");
            } else {
                println!(
                    ">> Finished with {} missing episode(s): {}",
                    report.missing.len(),
                    report.missing_labels().join(", ")
                );
                println!(">> Run the same command again to resume.");
            }
        }
        Err(e) => {
            eprintln!("\nError during download: {}", e);
            process::exit(1);
        }
    }
}
