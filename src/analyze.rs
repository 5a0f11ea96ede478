//! analyze command: List the fonts a page uses
//!
//! JSON by default, YAML or a plain text table on request.

use crate::proxy::{ProxyFetcher, RelayArgs};
use crate::scanner::{normalize_page_url, ScanConfig, Scanner};
use crate::schema::{FontFamilyGroup, FontReport};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Args;

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Page URL (scheme optional, https assumed)
    pub url: String,

    /// Output format: json (default), yaml or text
    #[arg(long, short, default_value = "json")]
    pub format: String,

    /// Stylesheets fetched in parallel
    #[arg(long, short, default_value = "4", value_parser = clap::value_parser!(u8).range(1..=16))]
    pub parallel: u8,

    /// Do not follow @import rules in stylesheets
    #[arg(long)]
    pub no_imports: bool,

    #[command(flatten)]
    pub relay: RelayArgs,
}

/// Run the analyze command
pub async fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let fetcher = ProxyFetcher::new(&args.relay.to_config()).context("Failed to build HTTP client")?;
    let scanner = Scanner::new(
        fetcher,
        ScanConfig {
            parallel: args.parallel as usize,
            follow_imports: !args.no_imports,
        },
    );

    let url = match normalize_page_url(&args.url) {
        Ok(url) => url,
        Err(e) => {
            let message = e.user_message();
            return Err(anyhow::Error::new(e).context(message));
        }
    };

    eprintln!("Analyzing {}...", truncate(url.as_str(), 60));

    let result = tokio::select! {
        result = scanner.analyze_url(&url) => result,
        _ = tokio::signal::ctrl_c() => bail!("Interrupted"),
    };

    let families = match result {
        Ok(families) => families,
        Err(e) if e.is_empty_result() => {
            eprintln!("{}", e.user_message());
            Vec::new()
        }
        Err(e) => {
            let message = e.user_message();
            return Err(anyhow::Error::new(e).context(message));
        }
    };

    let report = FontReport {
        url: url.to_string(),
        analyzed_at: Utc::now().to_rfc3339(),
        families,
    };

    println!("{}", render(&report, &args.format)?);

    let variants: usize = report.families.iter().map(|f| f.weights.len()).sum();
    eprintln!(
        "Done: {} famil{}, {} variant{}",
        report.families.len(),
        if report.families.len() == 1 { "y" } else { "ies" },
        variants,
        if variants == 1 { "" } else { "s" }
    );

    Ok(())
}

/// Render a report in the requested output format
pub fn render(report: &FontReport, format: &str) -> Result<String> {
    Ok(match format {
        "yaml" | "yml" => serde_yaml::to_string(report)?,
        "text" | "txt" => render_text(&report.families),
        _ => serde_json::to_string_pretty(report)?,
    })
}

fn render_text(families: &[FontFamilyGroup]) -> String {
    if families.is_empty() {
        return "—".to_string();
    }

    let mut out = String::new();
    for group in families {
        out.push_str(&group.family);
        out.push('\n');
        for v in &group.weights {
            let line = format!(
                "  {:<4} {:<8} {:<18} {}",
                v.weight,
                v.style,
                v.format.as_deref().unwrap_or("-"),
                v.url
                    .as_deref()
                    .map(|u| if u.starts_with("data:") { truncate(u, 40) } else { u.to_string() })
                    .unwrap_or_else(|| "(no download)".to_string())
            );
            out.push_str(line.trim_end());
            out.push('\n');
        }
    }
    out.trim_end().to_string()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 3).collect();
        format!("{}...", head)
    }
}
