//! Font discovery data model
//!
//! Shared by the parsers, the scanner and the CLI output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source label used for descriptors decoded from Google Fonts links
pub const GOOGLE_FONTS_SOURCE: &str = "Google Fonts";

/// Family name used when a declaration is present but blank
pub const UNKNOWN_FAMILY: &str = "Unknown";

/// A single discovered font variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontDescriptor {
    pub family: String,
    /// Numeric weight, "100" through "900"
    pub weight: String,
    pub style: FontStyle,
    /// Hostname the font is served from, or "Google Fonts"
    pub source: String,
    /// Absolute URL of the font binary (None for Google Fonts entries)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl FontDescriptor {
    pub fn key(&self) -> FontKey {
        FontKey {
            family: self.family.clone(),
            weight: self.weight.clone(),
            style: self.style,
        }
    }

    pub fn variant(&self) -> FontVariant {
        FontVariant {
            weight: self.weight.clone(),
            style: self.style,
            url: self.url.clone(),
            format: self.format.clone(),
        }
    }
}

/// Font style keyword
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
    Oblique,
}

impl FontStyle {
    /// Parse a `font-style` value; anything unrecognized is `Normal`
    pub fn from_css(value: &str) -> Self {
        let value = value.trim().to_ascii_lowercase();
        match value.split_whitespace().next() {
            Some("italic") => FontStyle::Italic,
            Some("oblique") => FontStyle::Oblique,
            _ => FontStyle::Normal,
        }
    }
}

impl fmt::Display for FontStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            FontStyle::Normal => "normal",
            FontStyle::Italic => "italic",
            FontStyle::Oblique => "oblique",
        })
    }
}

/// Identity of a descriptor: family + weight + style
///
/// Displays as `family-weight-style`, which is also the key a preview
/// layer uses to remember which faces it already loaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FontKey {
    pub family: String,
    pub weight: String,
    pub style: FontStyle,
}

impl fmt::Display for FontKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.family, self.weight, self.style)
    }
}

/// One weight/style entry of a family group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontVariant {
    pub weight: String,
    pub style: FontStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// All discovered variants sharing a family name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontFamilyGroup {
    pub family: String,
    pub weights: Vec<FontVariant>,
}

/// Analysis report written by the `analyze` command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontReport {
    pub url: String,
    /// RFC 3339 timestamp
    pub analyzed_at: String,
    pub families: Vec<FontFamilyGroup>,
}

/// Normalize a CSS `font-weight` value to a numeric string
///
/// Keywords map to their usual numbers, ranges use their first value and
/// numbers are clamped to 100-900. Unparseable input yields "400".
pub fn normalize_weight(value: &str) -> String {
    let value = value.trim().to_ascii_lowercase();
    let first = value.split_whitespace().next().unwrap_or("");

    let weight = match first {
        "normal" => 400,
        "bold" | "bolder" => 700,
        "lighter" => 300,
        other => match other.parse::<f32>() {
            Ok(n) if n.is_finite() => (n.round() as i32).clamp(100, 900),
            _ => 400,
        },
    };

    weight.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_weight_keywords() {
        assert_eq!(normalize_weight("normal"), "400");
        assert_eq!(normalize_weight("bold"), "700");
        assert_eq!(normalize_weight("bolder"), "700");
        assert_eq!(normalize_weight("lighter"), "300");
        assert_eq!(normalize_weight(" BOLD "), "700");
    }

    #[test]
    fn test_normalize_weight_numeric() {
        assert_eq!(normalize_weight("300"), "300");
        assert_eq!(normalize_weight("100 900"), "100");
        assert_eq!(normalize_weight("50"), "100");
        assert_eq!(normalize_weight("1000"), "900");
        assert_eq!(normalize_weight("450.4"), "450");
        assert_eq!(normalize_weight(""), "400");
        assert_eq!(normalize_weight("heavy"), "400");
    }

    #[test]
    fn test_font_style_from_css() {
        assert_eq!(FontStyle::from_css("italic"), FontStyle::Italic);
        assert_eq!(FontStyle::from_css("oblique 10deg"), FontStyle::Oblique);
        assert_eq!(FontStyle::from_css("Normal"), FontStyle::Normal);
        assert_eq!(FontStyle::from_css("slanted"), FontStyle::Normal);
    }

    #[test]
    fn test_font_key_display() {
        let d = FontDescriptor {
            family: "Acme Sans".to_string(),
            weight: "700".to_string(),
            style: FontStyle::Italic,
            source: "ex.com".to_string(),
            url: None,
            format: None,
        };
        assert_eq!(d.key().to_string(), "Acme Sans-700-italic");
    }

    #[test]
    fn test_serialize_variant_skips_missing_url() {
        let v = FontVariant {
            weight: "400".to_string(),
            style: FontStyle::Normal,
            url: None,
            format: None,
        };
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"weight":"400","style":"normal"}"#);
    }

    #[test]
    fn test_report_yaml() {
        let report = FontReport {
            url: "https://ex.com/".to_string(),
            analyzed_at: "2026-01-01T00:00:00Z".to_string(),
            families: vec![FontFamilyGroup {
                family: "Acme".to_string(),
                weights: vec![FontVariant {
                    weight: "400".to_string(),
                    style: FontStyle::Italic,
                    url: Some("https://ex.com/a.woff2".to_string()),
                    format: Some("woff2".to_string()),
                }],
            }],
        };
        let yaml = serde_yaml::to_string(&report).unwrap();
        assert!(yaml.contains("family: Acme"));
        assert!(yaml.contains("style: italic"));
    }
}
