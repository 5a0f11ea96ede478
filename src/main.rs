//! fontgrab CLI
//!
//! Discovers the fonts a page declares through CORS relays.
//! Progress goes to stderr, results to stdout.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fontgrab::analyze::{run_analyze, AnalyzeArgs};
use fontgrab::download::{run_download, DownloadArgs};
use fontgrab::inspect::{run_google, run_parse_css, GoogleArgs, ParseCssArgs};

#[derive(Parser)]
#[command(name = "fontgrab")]
#[command(author = "RoyalBit Inc.")]
#[command(version)]
#[command(about = "Discover, inspect and download the web fonts a page uses")]
#[command(long_about = "Fetches a page and its stylesheets through CORS relays, collects @font-face rules and Google Fonts links, and groups them by family.\n\nCommands:\n  analyze     List font families on a page\n  download    Save one font variant\n  parse-css   Parse a local CSS file\n  google      Decode a Google Fonts link")]
struct Cli {
    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the font families and weights a page declares
    Analyze(AnalyzeArgs),
    /// Download one font variant from a page
    Download(DownloadArgs),
    /// Parse @font-face rules from a local CSS file
    ParseCss(ParseCssArgs),
    /// Decode a Google Fonts stylesheet link
    Google(GoogleArgs),
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fontgrab={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Analyze(args) => run_analyze(args).await,
        Commands::Download(args) => run_download(args).await,
        Commands::ParseCss(args) => run_parse_css(args).await,
        Commands::Google(args) => run_google(args).await,
    }
}
