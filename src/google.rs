//! Google Fonts stylesheet links decoded without fetching them
//!
//! Understands both query grammars:
//! - CSS API: `family=Roboto:400,700i|Open+Sans`
//! - CSS2 API: `family=Roboto:ital,wght@0,400;1,700&family=Open+Sans`

use crate::schema::{normalize_weight, FontDescriptor, FontStyle, GOOGLE_FONTS_SOURCE};
use url::Url;

/// Decode the `family` parameters of a Google Fonts link into descriptors
pub fn parse_google_fonts_url(link: &str) -> Vec<FontDescriptor> {
    let Ok(url) = Url::parse(link.trim()) else {
        return Vec::new();
    };

    url.query_pairs()
        .filter(|(key, _)| key == "family")
        .flat_map(|(_, value)| {
            value
                .split('|')
                .flat_map(parse_family_segment)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// True when a URL points at the Google Fonts stylesheet API
pub fn is_google_fonts_url(url: &str) -> bool {
    url.contains("fonts.googleapis.com")
}

fn parse_family_segment(segment: &str) -> Vec<FontDescriptor> {
    let (name, spec) = match segment.split_once(':') {
        Some((name, spec)) => (name, Some(spec)),
        None => (segment, None),
    };

    // query_pairs already decodes '+', but links are sometimes double-encoded
    let family = name.replace('+', " ").trim().to_string();
    if family.is_empty() {
        return Vec::new();
    }

    let variants = match spec.map(str::trim).filter(|s| !s.is_empty()) {
        Some(spec) if spec.contains('@') => css2_variants(spec),
        Some(spec) => css1_variants(spec),
        None => Vec::new(),
    };

    let variants = if variants.is_empty() {
        vec![("400".to_string(), FontStyle::Normal)]
    } else {
        variants
    };

    variants
        .into_iter()
        .map(|(weight, style)| FontDescriptor {
            family: family.clone(),
            weight,
            style,
            source: GOOGLE_FONTS_SOURCE.to_string(),
            url: None,
            format: None,
        })
        .collect()
}

/// `400,700i,300italic`; a token without digits is weight 400
fn css1_variants(spec: &str) -> Vec<(String, FontStyle)> {
    spec.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            let lower = token.to_ascii_lowercase();
            let style = if lower.ends_with('i') || lower.contains("italic") {
                FontStyle::Italic
            } else {
                FontStyle::Normal
            };

            let digits: String = lower.chars().filter(char::is_ascii_digit).collect();
            let weight = if digits.is_empty() {
                "400".to_string()
            } else {
                normalize_weight(&digits)
            };

            (weight, style)
        })
        .collect()
}

/// `ital,wght@0,400;1,700` (axis tuples)
fn css2_variants(spec: &str) -> Vec<(String, FontStyle)> {
    let Some((axes, tuples)) = spec.split_once('@') else {
        return Vec::new();
    };
    let axes: Vec<&str> = axes.split(',').map(str::trim).collect();

    tuples
        .split(';')
        .filter(|tuple| !tuple.trim().is_empty())
        .map(|tuple| {
            let mut weight = "400".to_string();
            let mut style = FontStyle::Normal;

            for (axis, value) in axes.iter().zip(tuple.split(',')) {
                let value = value.trim();
                match *axis {
                    "ital" if value == "1" => style = FontStyle::Italic,
                    "wght" => {
                        let low = value.split("..").next().unwrap_or(value);
                        let digits: String = low.chars().filter(char::is_ascii_digit).collect();
                        if !digits.is_empty() {
                            weight = normalize_weight(&digits);
                        }
                    }
                    _ => {}
                }
            }

            (weight, style)
        })
        .collect()
}
