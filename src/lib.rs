pub mod cli;
pub mod downloader;
pub mod file_manager;
pub mod html_parser;
pub mod mirror;
pub mod report;

// Re-export main types for convenience
pub use cli::MirrorCommand;
pub use downloader::{derive_filename, Fetch, FetchedAsset, HttpFetcher};
pub use file_manager::{MirrorSummary, OutputLayout};
pub use html_parser::{AssetKind, AssetRef};
pub use mirror::SiteMirror;
pub use report::{ConsoleReporter, Report};
