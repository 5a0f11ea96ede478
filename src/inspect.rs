//! parse-css / google commands: Run a single parser offline
//!
//! Handy for checking what a stylesheet or Google Fonts link yields
//! without fetching a page.

use crate::css::parse_font_faces;
use crate::google::parse_google_fonts_url;
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use url::Url;

#[derive(Args)]
pub struct ParseCssArgs {
    /// CSS file to parse
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// URL relative font URLs resolve against (default: the file's own path)
    #[arg(long)]
    pub base_url: Option<String>,
}

#[derive(Args)]
pub struct GoogleArgs {
    /// Google Fonts stylesheet link
    pub link: String,
}

/// Run the parse-css command
pub async fn run_parse_css(args: ParseCssArgs) -> Result<()> {
    let css = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read file: {}", args.file.display()))?;

    let base = match &args.base_url {
        Some(base) => Url::parse(base).with_context(|| format!("Invalid base URL: {}", base))?,
        None => {
            let path = std::fs::canonicalize(&args.file)
                .with_context(|| format!("Failed to resolve {}", args.file.display()))?;
            Url::from_file_path(&path)
                .map_err(|_| anyhow::anyhow!("Cannot build URL for {}", path.display()))?
        }
    };

    let descriptors = parse_font_faces(&css, &base);
    println!("{}", serde_json::to_string_pretty(&descriptors)?);
    eprintln!("Found {} font-face source(s)", descriptors.len());

    Ok(())
}

/// Run the google command
pub async fn run_google(args: GoogleArgs) -> Result<()> {
    let descriptors = parse_google_fonts_url(&args.link);
    println!("{}", serde_json::to_string_pretty(&descriptors)?);
    eprintln!("Found {} variant(s)", descriptors.len());
    Ok(())
}
