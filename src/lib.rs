//! fontgrab: Discover the web fonts a page uses
//!
//! Commands:
//! - analyze: List font families and weights declared by a page
//! - download: Save one variant's font file
//! - parse-css / google: Run a single parser offline

pub mod analyze;
pub mod css;
pub mod download;
pub mod error;
pub mod google;
pub mod inspect;
pub mod proxy;
pub mod scanner;
pub mod schema;

pub use css::{parse_font_faces, parse_imports};
pub use download::{DownloadRequest, DownloadResult, Downloader, FormatLabel};
pub use error::{AnalyzeError, DownloadError, FetchError};
pub use google::parse_google_fonts_url;
pub use proxy::{try_in_order, FetchConfig, ProxyFetcher};
pub use scanner::{ScanConfig, Scanner};
pub use schema::{FontDescriptor, FontFamilyGroup, FontKey, FontStyle, FontVariant};
