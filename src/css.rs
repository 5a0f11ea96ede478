//! `@font-face` discovery in raw CSS
//!
//! A small scanner finds `@font-face` blocks while tracking brace depth,
//! comments and strings, so nested blocks and `data:` URIs never cut a block
//! short. Each block body is split into top-level declarations and fed
//! through a table of per-descriptor extraction rules.
//!
//! Parsing is total: malformed input yields fewer descriptors, never an error.

use crate::schema::{normalize_weight, FontDescriptor, FontStyle, UNKNOWN_FAMILY};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^)]*?))\s*\)"#).expect("valid url() regex")
});

static FORMAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)format\(\s*(?:"([^"]*)"|'([^']*)'|([^)]*?))\s*\)"#)
        .expect("valid format() regex")
});

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)@import\s+(?:url\(\s*(?:"([^"]*)"|'([^']*)'|([^)]*?))\s*\)|"([^"]*)"|'([^']*)')"#,
    )
    .expect("valid @import regex")
});

/// Descriptor fields collected from one block
#[derive(Debug, Default)]
struct FaceFields {
    family: Option<String>,
    weight: Option<String>,
    style: FontStyle,
    src: Option<String>,
}

type FieldRule = fn(&mut FaceFields, &str);

/// Descriptor name -> extraction rule. Later declarations override earlier ones.
const FIELD_RULES: &[(&str, FieldRule)] = &[
    ("font-family", extract_family),
    ("font-weight", extract_weight),
    ("font-style", extract_style),
    ("src", extract_src),
];

fn extract_family(fields: &mut FaceFields, value: &str) {
    let name = unquote(value).trim();
    fields.family = Some(if name.is_empty() {
        UNKNOWN_FAMILY.to_string()
    } else {
        name.to_string()
    });
}

fn extract_weight(fields: &mut FaceFields, value: &str) {
    fields.weight = Some(normalize_weight(value));
}

fn extract_style(fields: &mut FaceFields, value: &str) {
    fields.style = FontStyle::from_css(value);
}

fn extract_src(fields: &mut FaceFields, value: &str) {
    fields.src = Some(value.to_string());
}

/// Parse every `@font-face` block in `css`, resolving URLs against `base_url`
pub fn parse_font_faces(css: &str, base_url: &Url) -> Vec<FontDescriptor> {
    let mut descriptors = Vec::new();

    for body in font_face_blocks(css) {
        let mut fields = FaceFields::default();
        for (name, value) in declarations(body) {
            if let Some((_, rule)) = FIELD_RULES.iter().find(|(n, _)| *n == name) {
                rule(&mut fields, value);
            }
        }

        // A face without any font-family declaration cannot be referenced
        let Some(family) = fields.family else {
            continue;
        };
        let Some(src) = fields.src.as_deref() else {
            continue;
        };
        let weight = fields.weight.unwrap_or_else(|| "400".to_string());

        for (url, format) in src_entries(src, base_url) {
            descriptors.push(FontDescriptor {
                family: family.clone(),
                weight: weight.clone(),
                style: fields.style,
                source: source_host(&url, base_url),
                url: Some(url.to_string()),
                format: Some(format),
            });
        }
    }

    descriptors
}

/// Resolved targets of `@import` rules, in order
pub fn parse_imports(css: &str, base_url: &Url) -> Vec<Url> {
    let stripped = strip_comments(css);
    IMPORT_RE
        .captures_iter(&stripped)
        .filter_map(|cap| {
            let raw = (1..=5).find_map(|i| cap.get(i)).map(|m| m.as_str().trim())?;
            if raw.is_empty() {
                return None;
            }
            base_url.join(raw).ok()
        })
        .collect()
}

/// Map a file extension (or a `data:` media type) to a CSS font format name
pub fn infer_format(url: &Url) -> String {
    let ext = if url.scheme() == "data" {
        // data:font/woff2;base64,... or data:application/x-font-ttf,...
        url.path()
            .split([';', ','])
            .next()
            .and_then(|media| media.rsplit_once('/'))
            .map(|(_, subtype)| {
                let subtype = subtype.trim().to_ascii_lowercase();
                let bare = subtype.strip_prefix("x-").unwrap_or(&subtype);
                let bare = bare.strip_prefix("font-").unwrap_or(bare);
                match bare {
                    "truetype" | "sfnt" => "ttf",
                    "opentype" => "otf",
                    "vnd.ms-fontobject" => "eot",
                    other => other,
                }
                .to_string()
            })
            .unwrap_or_default()
    } else {
        url.path_segments()
            .and_then(|mut segments| segments.next_back())
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default()
    };

    match ext.as_str() {
        "woff2" => "woff2",
        "woff" => "woff",
        "ttf" => "truetype",
        "otf" => "opentype",
        "eot" => "embedded-opentype",
        _ => "unknown",
    }
    .to_string()
}

/// Resolve the `src` list into (url, format) pairs.
///
/// Entries with a declared `format()` come first; bare `url()` entries follow
/// unless their URL is already covered by an earlier entry.
fn src_entries(src: &str, base_url: &Url) -> Vec<(Url, String)> {
    let mut declared = Vec::new();
    let mut bare = Vec::new();

    for entry in split_top_level(src, b',') {
        let Some(raw) = URL_RE.captures(entry).and_then(|cap| first_group(&cap)) else {
            continue;
        };
        let Some(url) = resolve(raw, base_url) else {
            continue;
        };
        let format = FORMAT_RE
            .captures(entry)
            .and_then(|cap| first_group(&cap))
            .map(|f| f.trim().to_ascii_lowercase())
            .filter(|f| !f.is_empty());

        match format {
            Some(format) => declared.push((url, format)),
            None => bare.push(url),
        }
    }

    let mut entries = declared;
    for url in bare {
        let covered = entries
            .iter()
            .any(|(seen, _)| seen.as_str().contains(url.as_str()));
        if !covered {
            let format = infer_format(&url);
            entries.push((url, format));
        }
    }

    entries
}

fn first_group<'t>(cap: &regex::Captures<'t>) -> Option<&'t str> {
    (1..cap.len()).find_map(|i| cap.get(i)).map(|m| m.as_str())
}

fn resolve(raw: &str, base_url: &Url) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    base_url.join(raw).ok()
}

fn source_host(url: &Url, base_url: &Url) -> String {
    url.host_str()
        .or_else(|| base_url.host_str())
        .unwrap_or("local")
        .to_string()
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// If a comment or quoted string starts at `i`, return the index just past it
fn skip_opaque(bytes: &[u8], i: usize) -> Option<usize> {
    match bytes[i] {
        b'/' if bytes.get(i + 1) == Some(&b'*') => {
            let mut j = i + 2;
            while j + 1 < bytes.len() {
                if bytes[j] == b'*' && bytes[j + 1] == b'/' {
                    return Some(j + 2);
                }
                j += 1;
            }
            Some(bytes.len())
        }
        quote @ (b'"' | b'\'') => {
            let mut j = i + 1;
            while j < bytes.len() {
                match bytes[j] {
                    b'\\' => j += 2,
                    b if b == quote => return Some(j + 1),
                    b'\n' => return Some(j),
                    _ => j += 1,
                }
            }
            Some(bytes.len())
        }
        _ => None,
    }
}

/// Index of the brace closing the one at `open`, or `bytes.len()` if unterminated
fn matching_brace(bytes: &[u8], open: usize) -> usize {
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        if let Some(next) = skip_opaque(bytes, i) {
            i = next;
            continue;
        }
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

fn skip_trivia(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
        } else if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'*') {
            i = skip_opaque(bytes, i).unwrap_or(bytes.len());
        } else {
            break;
        }
    }
    i
}

/// Bodies (between the braces) of every `@font-face` block
fn font_face_blocks(css: &str) -> Vec<&str> {
    const AT_RULE: &[u8] = b"@font-face";

    let bytes = css.as_bytes();
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if let Some(next) = skip_opaque(bytes, i) {
            i = next;
            continue;
        }

        if bytes[i] == b'@'
            && bytes.len() - i >= AT_RULE.len()
            && bytes[i..i + AT_RULE.len()].eq_ignore_ascii_case(AT_RULE)
        {
            let open = skip_trivia(bytes, i + AT_RULE.len());
            if open < bytes.len() && bytes[open] == b'{' {
                let close = matching_brace(bytes, open);
                blocks.push(&css[open + 1..close]);
                i = (close + 1).min(bytes.len());
                continue;
            }
        }

        i += 1;
    }

    blocks
}

/// Top-level `name: value` declarations of a block body; nested blocks are dropped
fn declarations(body: &str) -> Vec<(String, &str)> {
    let bytes = body.as_bytes();
    let mut segments = Vec::new();
    let mut start = 0;
    let mut paren = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        if let Some(next) = skip_opaque(bytes, i) {
            i = next;
            continue;
        }
        match bytes[i] {
            b'(' => paren += 1,
            b')' => paren = paren.saturating_sub(1),
            b';' if paren == 0 => {
                segments.push(&body[start..i]);
                start = i + 1;
            }
            b'{' if paren == 0 => {
                // nested rule: discard its prelude and block
                i = (matching_brace(bytes, i) + 1).min(bytes.len());
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    segments.push(&body[start..]);

    segments
        .into_iter()
        .filter_map(|segment| {
            let (name, value) = segment.split_once(':')?;
            let name = name.trim().to_ascii_lowercase();
            if name.is_empty() {
                return None;
            }
            Some((name, value.trim()))
        })
        .collect()
}

/// Split on `sep` outside parentheses, strings and comments
fn split_top_level(s: &str, sep: u8) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut paren = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        if let Some(next) = skip_opaque(bytes, i) {
            i = next;
            continue;
        }
        match bytes[i] {
            b'(' => paren += 1,
            b')' => paren = paren.saturating_sub(1),
            b if b == sep && paren == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&s[start..]);
    parts
}

fn strip_comments(css: &str) -> String {
    let bytes = css.as_bytes();
    let mut out = String::with_capacity(css.len());
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match skip_opaque(bytes, i) {
            Some(next) if bytes[i] == b'/' => {
                out.push_str(&css[start..i]);
                i = next;
                start = i;
            }
            Some(next) => i = next,
            None => i += 1,
        }
    }
    out.push_str(&css[start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://ex.com/css/a.css").unwrap()
    }

    #[test]
    fn test_single_face_with_format() {
        let css = r#"@font-face { font-family: "Acme"; src: url(../fonts/x.woff2) format("woff2"); }"#;
        let faces = parse_font_faces(css, &base());
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].family, "Acme");
        assert_eq!(faces[0].weight, "400");
        assert_eq!(faces[0].style, FontStyle::Normal);
        assert_eq!(faces[0].url.as_deref(), Some("https://ex.com/fonts/x.woff2"));
        assert_eq!(faces[0].format.as_deref(), Some("woff2"));
        assert_eq!(faces[0].source, "ex.com");
    }

    #[test]
    fn test_multiple_src_entries() {
        let css = r#"
            @font-face {
                font-family: 'Inter';
                font-weight: bold;
                font-style: italic;
                src: local('Inter Bold'),
                     url("/f/inter.woff2") format('woff2'),
                     url(/f/inter.woff) format("woff"),
                     url(/f/inter.ttf);
            }
        "#;
        let faces = parse_font_faces(css, &base());
        assert_eq!(faces.len(), 3);
        assert!(faces.iter().all(|f| f.weight == "700"));
        assert!(faces.iter().all(|f| f.style == FontStyle::Italic));
        assert_eq!(faces[0].format.as_deref(), Some("woff2"));
        assert_eq!(faces[1].format.as_deref(), Some("woff"));
        assert_eq!(faces[2].url.as_deref(), Some("https://ex.com/f/inter.ttf"));
        assert_eq!(faces[2].format.as_deref(), Some("truetype"));
    }

    #[test]
    fn test_declared_format_beats_inferred() {
        let css = r#"@font-face { font-family: A; src: url(a.woff), url(a.woff) format("opentype"); }"#;
        let faces = parse_font_faces(css, &base());
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].format.as_deref(), Some("opentype"));
    }

    #[test]
    fn test_weight_keywords() {
        let css = r#"
            @font-face { font-family: A; font-weight: bold; src: url(a.woff2) format("woff2"); }
            @font-face { font-family: A; font-weight: lighter; src: url(b.woff2) format("woff2"); }
        "#;
        let faces = parse_font_faces(css, &base());
        assert_eq!(faces[0].weight, "700");
        assert_eq!(faces[1].weight, "300");
    }

    #[test]
    fn test_missing_family_skips_block_only() {
        let css = r#"
            @font-face { src: url(orphan.woff2) format("woff2"); }
            @font-face { font-family: Kept; src: url(kept.woff2) format("woff2"); }
        "#;
        let faces = parse_font_faces(css, &base());
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].family, "Kept");
    }

    #[test]
    fn test_blank_family_is_unknown() {
        let css = r#"@font-face { font-family: ""; src: url(a.woff2); }"#;
        let faces = parse_font_faces(css, &base());
        assert_eq!(faces[0].family, "Unknown");
        assert_eq!(faces[0].format.as_deref(), Some("woff2"));
    }

    #[test]
    fn test_nested_braces_do_not_truncate() {
        let css = r#"
            @font-face {
                font-family: Nested;
                @supports (font-tech(variations)) { src: url(ignored.woff2); }
                src: url(real.woff2) format("woff2");
                font-weight: 600;
            }
            @font-face { font-family: After; src: url(after.woff) format("woff"); }
        "#;
        let faces = parse_font_faces(css, &base());
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0].family, "Nested");
        assert_eq!(faces[0].weight, "600");
        assert_eq!(faces[0].url.as_deref(), Some("https://ex.com/css/real.woff2"));
        assert_eq!(faces[1].family, "After");
    }

    #[test]
    fn test_braces_in_strings_and_comments() {
        let css = r#"
            /* @font-face { font-family: Commented; src: url(c.woff2); } */
            @font-face { font-family: "We}rd"; src: url(w.woff2) format("woff2"); }
        "#;
        let faces = parse_font_faces(css, &base());
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].family, "We}rd");
    }

    #[test]
    fn test_data_uri_does_not_split_declaration() {
        let css = r#"@font-face {
            font-family: Inline;
            src: url(data:font/woff2;base64,d09GMgABAAAAAA) format("woff2"), url(inline.woff) format("woff");
            font-style: oblique;
        }"#;
        let faces = parse_font_faces(css, &base());
        assert_eq!(faces.len(), 2);
        assert_eq!(
            faces[0].url.as_deref(),
            Some("data:font/woff2;base64,d09GMgABAAAAAA")
        );
        assert_eq!(faces[0].format.as_deref(), Some("woff2"));
        assert_eq!(faces[0].source, "ex.com");
        assert_eq!(faces[1].url.as_deref(), Some("https://ex.com/css/inline.woff"));
        assert!(faces.iter().all(|f| f.style == FontStyle::Oblique));
    }

    #[test]
    fn test_inline_only_icon_font() {
        let css = r#"@font-face{font-family:"Icons";src:url(data:font/woff2;base64,d09GMgAB) format("woff2");}"#;
        let faces = parse_font_faces(css, &base());
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].family, "Icons");
        assert_eq!(faces[0].format.as_deref(), Some("woff2"));

        let bare = r#"@font-face{font-family:I;src:url('data:application/x-font-ttf;base64,AAEAAA');}"#;
        let faces = parse_font_faces(bare, &base());
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].format.as_deref(), Some("truetype"));
    }

    #[test]
    fn test_unterminated_block_reads_to_end() {
        let css = r#"@font-face { font-family: Cut; src: url(cut.woff2) format("woff2");"#;
        let faces = parse_font_faces(css, &base());
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].family, "Cut");
    }

    #[test]
    fn test_font_face_inside_media() {
        let css = r#"@media screen { @FONT-FACE { font-family: M; src: url(m.otf); } }"#;
        let faces = parse_font_faces(css, &base());
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].format.as_deref(), Some("opentype"));
    }

    #[test]
    fn test_garbage_input() {
        assert!(parse_font_faces("", &base()).is_empty());
        assert!(parse_font_faces("@font-face", &base()).is_empty());
        assert!(parse_font_faces("}}}{{{ @font-face {", &base()).is_empty());
        assert!(parse_font_faces("body { color: red }", &base()).is_empty());
    }

    #[test]
    fn test_idempotent() {
        let css = r#"@font-face { font-family: A; src: url(a.woff2) format("woff2"), url(a.ttf); }"#;
        assert_eq!(parse_font_faces(css, &base()), parse_font_faces(css, &base()));
    }

    #[test]
    fn test_infer_format() {
        let url = |s: &str| Url::parse(s).unwrap();
        assert_eq!(infer_format(&url("https://a/x.WOFF2?v=3")), "woff2");
        assert_eq!(infer_format(&url("https://a/x.eot#iefix")), "embedded-opentype");
        assert_eq!(infer_format(&url("https://a/x.svg")), "unknown");
        assert_eq!(infer_format(&url("https://a/font")), "unknown");
        assert_eq!(infer_format(&url("data:font/woff;base64,d09GRg")), "woff");
        assert_eq!(
            infer_format(&url("data:application/vnd.ms-fontobject;base64,AA")),
            "embedded-opentype"
        );
        assert_eq!(infer_format(&url("data:;base64,AA")), "unknown");
    }

    #[test]
    fn test_parse_imports() {
        let css = r#"
            /* @import url(commented.css); */
            @import url("https://fonts.googleapis.com/css2?family=Inter:wght@400;700");
            @import 'local/more.css' screen;
            @import url(../shared.css);
        "#;
        let imports = parse_imports(css, &base());
        assert_eq!(imports.len(), 3);
        assert_eq!(imports[0].host_str(), Some("fonts.googleapis.com"));
        assert_eq!(imports[1].as_str(), "https://ex.com/css/local/more.css");
        assert_eq!(imports[2].as_str(), "https://ex.com/shared.css");
    }
}
