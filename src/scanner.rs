//! Page scanner: page URL -> font families
//!
//! Fetches the page through the relay fetcher, collects font sources in
//! document order (stylesheet links, inline `<style>`, Google Fonts links),
//! parses each, then deduplicates and groups the descriptors by family.

use crate::css::{parse_font_faces, parse_imports};
use crate::error::AnalyzeError;
use crate::google::{is_google_fonts_url, parse_google_fonts_url};
use crate::proxy::ProxyFetcher;
use crate::schema::{FontDescriptor, FontFamilyGroup, FontKey};
use futures::stream::{self, StreamExt};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use url::Url;

/// Substrings of anti-automation interstitial pages
pub const BOT_PROTECTION_MARKERS: &[&str] = &[
    "cf-browser-verification",
    "cf_chl_opt",
    "Attention Required! | Cloudflare",
    "<title>Just a moment...</title>",
    "_Incapsula_Resource",
    "Incapsula incident ID",
    "captcha-delivery.com",
];

static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://").expect("valid scheme regex"));

/// Configuration for page scanning
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Stylesheets fetched concurrently
    pub parallel: usize,
    /// Follow `@import` rules one level deep
    pub follow_imports: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            parallel: 4,
            follow_imports: true,
        }
    }
}

/// A place fonts can be declared, in page discovery order
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FontSource {
    /// Text of a `<style>` element
    Inline(String),
    /// Google Fonts stylesheet link, decoded from its query
    Google(String),
    /// External stylesheet to fetch
    Stylesheet(Url),
}

/// Faces declared by one source plus the stylesheets it imports
#[derive(Debug, Default)]
struct ParsedSheet {
    faces: Vec<FontDescriptor>,
    imports: Vec<Url>,
}

/// Discovers the fonts a page uses
pub struct Scanner {
    fetcher: ProxyFetcher,
    config: ScanConfig,
}

impl Scanner {
    pub fn new(fetcher: ProxyFetcher, config: ScanConfig) -> Self {
        Self { fetcher, config }
    }

    /// Analyze a page and return its font families
    pub async fn analyze(&self, page_url: &str) -> Result<Vec<FontFamilyGroup>, AnalyzeError> {
        let url = normalize_page_url(page_url)?;
        self.analyze_url(&url).await
    }

    /// Analyze an already normalized page URL
    pub async fn analyze_url(&self, url: &Url) -> Result<Vec<FontFamilyGroup>, AnalyzeError> {
        info!(url = %url, "analyzing page");

        let response = self.fetcher.fetch(url.as_str()).await?;
        debug!(via = %response.requested, "page fetched");
        let html = response.text();

        if let Some(marker) = detect_bot_protection(&html) {
            return Err(AnalyzeError::BotProtectionDetected {
                url: url.to_string(),
                marker: marker.to_string(),
            });
        }

        let sources = discover_sources(&html, url);
        debug!(count = sources.len(), "font sources discovered");

        let descriptors = self.collect_descriptors(&sources, url).await;
        let descriptors = dedupe(descriptors);

        if descriptors.is_empty() {
            return Err(AnalyzeError::NoFontsFound {
                url: url.to_string(),
            });
        }

        let groups = group_by_family(&descriptors);
        info!(
            families = groups.len(),
            variants = descriptors.len(),
            "analysis complete"
        );
        Ok(groups)
    }

    /// Parse every source and merge descriptors in discovery order.
    ///
    /// Fetches overlap up to `parallel`, but results are consumed in source
    /// order so the first-wins rule never depends on network timing.
    async fn collect_descriptors(&self, sources: &[FontSource], page_url: &Url) -> Vec<FontDescriptor> {
        let parallel = self.config.parallel.max(1);

        let sheets: Vec<ParsedSheet> = stream::iter(sources.iter().map(|s| self.load(s, page_url)))
            .buffered(parallel)
            .collect()
            .await;

        // Imported stylesheets not already linked by the page, fetched once each
        let linked: HashSet<&str> = sources
            .iter()
            .filter_map(|s| match s {
                FontSource::Stylesheet(url) => Some(url.as_str()),
                _ => None,
            })
            .collect();
        let mut pending: Vec<&Url> = Vec::new();
        for import in sheets.iter().flat_map(|s| s.imports.iter()) {
            if is_google_fonts_url(import.as_str())
                || linked.contains(import.as_str())
                || pending.contains(&import)
            {
                continue;
            }
            pending.push(import);
        }

        let imported: HashMap<&str, Vec<FontDescriptor>> =
            stream::iter(pending.into_iter().map(|url| async move {
                (url.as_str(), self.fetch_stylesheet(url).await.faces)
            }))
            .buffered(parallel)
            .collect()
            .await;

        let mut descriptors = Vec::new();
        for sheet in &sheets {
            // @import rules precede the importing sheet's own rules
            for import in &sheet.imports {
                if is_google_fonts_url(import.as_str()) {
                    descriptors.extend(parse_google_fonts_url(import.as_str()));
                } else if let Some(faces) = imported.get(import.as_str()) {
                    descriptors.extend(faces.iter().cloned());
                }
            }
            descriptors.extend(sheet.faces.iter().cloned());
        }
        descriptors
    }

    async fn load(&self, source: &FontSource, page_url: &Url) -> ParsedSheet {
        match source {
            FontSource::Inline(css) => self.parse_sheet(css, page_url),
            FontSource::Google(link) => ParsedSheet {
                faces: parse_google_fonts_url(link),
                imports: Vec::new(),
            },
            FontSource::Stylesheet(url) => self.fetch_stylesheet(url).await,
        }
    }

    async fn fetch_stylesheet(&self, url: &Url) -> ParsedSheet {
        match self.fetcher.fetch(url.as_str()).await {
            Ok(response) => {
                let sheet = self.parse_sheet(&response.text(), url);
                debug!(
                    url = %url,
                    via = %response.requested,
                    faces = sheet.faces.len(),
                    "stylesheet parsed"
                );
                sheet
            }
            Err(e) => {
                warn!(url = %url, error = %e, "skipping stylesheet");
                ParsedSheet::default()
            }
        }
    }

    fn parse_sheet(&self, css: &str, base_url: &Url) -> ParsedSheet {
        ParsedSheet {
            faces: parse_font_faces(css, base_url),
            imports: if self.config.follow_imports {
                parse_imports(css, base_url)
            } else {
                Vec::new()
            },
        }
    }
}

/// Trim, default the scheme to https and parse
pub fn normalize_page_url(input: &str) -> Result<Url, AnalyzeError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AnalyzeError::InvalidUrl(input.to_string()));
    }

    let candidate = if SCHEME_RE.is_match(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed.trim_start_matches("//"))
    };

    let url = Url::parse(&candidate).map_err(|_| AnalyzeError::InvalidUrl(input.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(AnalyzeError::InvalidUrl(input.to_string())),
    }
}

/// First bot-protection marker found in the page body
pub fn detect_bot_protection(html: &str) -> Option<&'static str> {
    BOT_PROTECTION_MARKERS
        .iter()
        .find(|marker| html.contains(*marker))
        .copied()
}

/// Font sources of a page in document order
pub fn discover_sources(html: &str, page_url: &Url) -> Vec<FontSource> {
    let doc = Html::parse_document(html);
    let Ok(selector) = Selector::parse("link, style") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut sources = Vec::new();

    for el in doc.select(&selector) {
        if el.value().name() == "style" {
            let css: String = el.text().collect();
            if !css.trim().is_empty() {
                sources.push(FontSource::Inline(css));
            }
            continue;
        }

        let Some(href) = el.value().attr("href").map(str::trim).filter(|h| !h.is_empty()) else {
            continue;
        };
        let Ok(resolved) = page_url.join(href) else {
            debug!(href, "unresolvable link href");
            continue;
        };

        let rel: Vec<String> = el
            .value()
            .attr("rel")
            .unwrap_or("")
            .split_ascii_whitespace()
            .map(|t| t.to_ascii_lowercase())
            .collect();
        let is_stylesheet = rel.iter().any(|t| t == "stylesheet");
        let is_style_preload = rel.iter().any(|t| t == "preload")
            && el
                .value()
                .attr("as")
                .is_some_and(|a| a.trim().eq_ignore_ascii_case("style"));

        let source = if is_google_fonts_url(resolved.as_str()) {
            FontSource::Google(resolved.to_string())
        } else if is_stylesheet || is_style_preload {
            FontSource::Stylesheet(resolved)
        } else {
            continue;
        };

        if seen.insert(source.clone()) {
            sources.push(source);
        }
    }

    sources
}

/// Drop descriptors whose family+weight+style was already seen
pub fn dedupe(descriptors: impl IntoIterator<Item = FontDescriptor>) -> Vec<FontDescriptor> {
    let mut seen: HashSet<FontKey> = HashSet::new();
    descriptors
        .into_iter()
        .filter(|d| seen.insert(d.key()))
        .collect()
}

/// Group descriptors by family, keeping first-seen order of families and weights
pub fn group_by_family(descriptors: &[FontDescriptor]) -> Vec<FontFamilyGroup> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<FontFamilyGroup> = Vec::new();

    for d in descriptors {
        let i = *index.entry(d.family.as_str()).or_insert_with(|| {
            groups.push(FontFamilyGroup {
                family: d.family.clone(),
                weights: Vec::new(),
            });
            groups.len() - 1
        });
        groups[i].weights.push(d.variant());
    }

    groups
}
