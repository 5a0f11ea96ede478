//! download command: Save a discovered font variant to disk
//!
//! Bytes are saved exactly as served. When the requested format label differs
//! from the actual container, the file is knowingly mislabeled and the result
//! carries `best_effort: true`; no transcoding happens.

use crate::error::{DownloadError, FetchError};
use crate::proxy::{try_in_order, ProxyFetcher, RelayArgs};
use crate::scanner::{ScanConfig, Scanner};
use crate::schema::{FontFamilyGroup, FontStyle, FontVariant};
use anyhow::{bail, Context, Result};
use base64::Engine;
use clap::Args;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Args)]
pub struct DownloadArgs {
    /// Page to analyze
    pub url: String,

    /// Font family to download
    #[arg(long)]
    pub family: String,

    /// Weight to download
    #[arg(long, default_value = "400")]
    pub weight: String,

    /// Style to download
    #[arg(long, value_enum, default_value = "normal")]
    pub style: FontStyle,

    /// File extension to save under (bytes are never converted)
    #[arg(long = "as", value_enum, default_value = "woff2")]
    pub target: FormatLabel,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    pub out: PathBuf,

    #[command(flatten)]
    pub relay: RelayArgs,
}

/// File format label used for saved fonts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FormatLabel {
    Woff2,
    Woff,
    Ttf,
    Otf,
    Eot,
}

impl FormatLabel {
    pub fn extension(self) -> &'static str {
        match self {
            FormatLabel::Woff2 => "woff2",
            FormatLabel::Woff => "woff",
            FormatLabel::Ttf => "ttf",
            FormatLabel::Otf => "otf",
            FormatLabel::Eot => "eot",
        }
    }

    /// Map a CSS `format()` name (or extension) to a label
    pub fn from_css_format(format: &str) -> Option<Self> {
        let format = format.trim().to_ascii_lowercase();
        // "woff2-variations", "truetype-variations", ...
        let base = format.split('-').next().unwrap_or("");
        match (format.as_str(), base) {
            ("embedded-opentype", _) | (_, "eot") => Some(FormatLabel::Eot),
            (_, "woff2") => Some(FormatLabel::Woff2),
            (_, "woff") => Some(FormatLabel::Woff),
            (_, "truetype" | "ttf") => Some(FormatLabel::Ttf),
            (_, "opentype" | "otf") => Some(FormatLabel::Otf),
            _ => None,
        }
    }

    /// Identify the container from its leading magic bytes
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match bytes.get(..4)? {
            b"wOF2" => Some(FormatLabel::Woff2),
            b"wOFF" => Some(FormatLabel::Woff),
            b"OTTO" => Some(FormatLabel::Otf),
            &[0x00, 0x01, 0x00, 0x00] | b"true" => Some(FormatLabel::Ttf),
            // EOT carries its magic 0x504C at offset 34
            _ if bytes.get(34..36) == Some(&[0x4C, 0x50][..]) => Some(FormatLabel::Eot),
            _ => None,
        }
    }
}

impl fmt::Display for FormatLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.extension())
    }
}

/// What to download and where
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub family: String,
    pub variant: FontVariant,
    pub target: FormatLabel,
    pub out_dir: PathBuf,
}

/// Outcome of a saved download
#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    pub path: PathBuf,
    pub bytes: usize,
    pub label: FormatLabel,
    /// Detected container, if recognizable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<FormatLabel>,
    /// True when the saved extension may not match the bytes
    pub best_effort: bool,
    /// "direct" or "relay"
    pub via: String,
}

#[derive(Debug, Clone, Copy)]
enum Route {
    Inline,
    Direct,
    Relay,
}

/// Downloads font binaries, direct first, relays second
pub struct Downloader {
    fetcher: ProxyFetcher,
}

impl Downloader {
    pub fn new(fetcher: ProxyFetcher) -> Self {
        Self { fetcher }
    }

    pub async fn download(&self, request: &DownloadRequest) -> Result<DownloadResult, DownloadError> {
        let url = request
            .variant
            .url
            .as_deref()
            .ok_or_else(|| DownloadError::NoBinaryUrl {
                family: request.family.clone(),
                weight: request.variant.weight.clone(),
            })?;

        let (route, body) = if url.starts_with("data:") {
            let body = decode_data_url(url).ok_or_else(|| DownloadError::InvalidDataUrl {
                family: request.family.clone(),
                weight: request.variant.weight.clone(),
            })?;
            (Route::Inline, body)
        } else {
            let (route, response) =
                try_in_order([Route::Direct, Route::Relay], |route| async move {
                    let response = match route {
                        Route::Direct | Route::Inline => self.fetcher.fetch_direct(url).await,
                        Route::Relay => self.fetcher.fetch(url).await,
                    };
                    response.map(|r| (route, r))
                })
                .await
                .map_err(|mut errors| {
                    errors.pop().unwrap_or_else(|| FetchError::NetworkFailure {
                        url: url.to_string(),
                        attempts: 0,
                    })
                })?;
            (route, response.body)
        };

        let actual = FormatLabel::sniff(&body).or_else(|| {
            request
                .variant
                .format
                .as_deref()
                .and_then(FormatLabel::from_css_format)
        });
        let best_effort = actual != Some(request.target);

        let path = request
            .out_dir
            .join(file_name(&request.family, &request.variant.weight, request.target));
        write_file(&request.out_dir, &path, &body).await?;

        info!(path = %path.display(), bytes = body.len(), best_effort, "font saved");

        Ok(DownloadResult {
            path,
            bytes: body.len(),
            label: request.target,
            actual,
            best_effort,
            via: match route {
                Route::Inline => "inline",
                Route::Direct => "direct",
                Route::Relay => "relay",
            }
            .to_string(),
        })
    }
}

async fn write_file(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), DownloadError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| DownloadError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| DownloadError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Payload of a `data:` URL, base64 or percent-encoded
fn decode_data_url(url: &str) -> Option<Vec<u8>> {
    let (meta, data) = url.strip_prefix("data:")?.split_once(',')?;
    if meta.trim_end().to_ascii_lowercase().ends_with(";base64") {
        let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let compact = urlencoding::decode(&compact).ok()?;
        base64::engine::general_purpose::STANDARD.decode(compact.as_bytes()).ok()
    } else {
        Some(urlencoding::decode_binary(data.as_bytes()).into_owned())
    }
}

/// Replace everything but ASCII letters and digits with `_`
pub fn sanitize_family(family: &str) -> String {
    family
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// `{sanitizedFamily}-{weight}.{label}`
pub fn file_name(family: &str, weight: &str, label: FormatLabel) -> String {
    format!("{}-{}.{}", sanitize_family(family), weight, label.extension())
}

/// Find a variant in analysis results; family match ignores ASCII case
pub fn find_variant<'a>(
    groups: &'a [FontFamilyGroup],
    family: &str,
    weight: &str,
    style: FontStyle,
) -> Option<(&'a FontFamilyGroup, &'a FontVariant)> {
    let group = groups
        .iter()
        .find(|g| g.family.eq_ignore_ascii_case(family.trim()))?;
    let variant = group
        .weights
        .iter()
        .find(|v| v.weight == weight && v.style == style)?;
    Some((group, variant))
}

/// Run the download command
pub async fn run_download(args: DownloadArgs) -> Result<()> {
    let fetcher = ProxyFetcher::new(&args.relay.to_config()).context("Failed to build HTTP client")?;
    let scanner = Scanner::new(fetcher.clone(), ScanConfig::default());

    eprintln!("Analyzing {}...", args.url);
    let groups = tokio::select! {
        result = scanner.analyze(&args.url) => result,
        _ = tokio::signal::ctrl_c() => bail!("Interrupted"),
    };
    let groups = match groups {
        Ok(groups) => groups,
        Err(e) => {
            let message = e.user_message();
            return Err(anyhow::Error::new(e).context(message));
        }
    };

    let Some((group, variant)) = find_variant(&groups, &args.family, &args.weight, args.style) else {
        let available: Vec<String> = groups
            .iter()
            .flat_map(|g| {
                g.weights
                    .iter()
                    .map(move |v| format!("{} {} {}", g.family, v.weight, v.style))
            })
            .collect();
        bail!(
            "No variant {} {} {} on this page. Available: {}",
            args.family,
            args.weight,
            args.style,
            available.join(", ")
        );
    };

    let request = DownloadRequest {
        family: group.family.clone(),
        variant: variant.clone(),
        target: args.target,
        out_dir: args.out,
    };

    let result = Downloader::new(fetcher).download(&request).await?;

    if result.best_effort {
        match result.actual {
            Some(actual) => eprintln!(
                "Note: saved as .{} but the data is {}; no conversion was performed.",
                result.label, actual
            ),
            None => eprintln!(
                "Note: saved as .{} but the data format is unknown; no conversion was performed.",
                result.label
            ),
        }
    }

    println!("{}", serde_json::to_string(&result)?);
    eprintln!("Saved {}", result.path.display());

    Ok(())
}
