use clap::Parser;
use std::path::PathBuf;

/// User agent sent with every request, matching a desktop browser so sites
/// serve their regular markup.
pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Parser, Debug)]
#[command(
    name = "page-mirror",
    about = "Save a static local copy of a single web page",
    version,
    long_about = "Downloads one HTML page together with its CSS, JavaScript, image, and icon assets, rewrites the references to local relative paths, and writes the result as a browsable directory."
)]
pub struct MirrorCommand {
    /// The URL of the page to mirror
    #[arg(required = true)]
    pub url: String,

    /// Output directory for the mirrored page
    #[arg(short, long, default_value = "scraped_website")]
    pub output_dir: PathBuf,

    /// Timeout for each request in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    /// User agent string to use for requests
    #[arg(long, default_value = DESKTOP_USER_AGENT)]
    pub user_agent: String,

    /// Print the final summary as JSON
    #[arg(long)]
    pub json: bool,
}
