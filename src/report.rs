use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use url::Url;

use crate::file_manager::{MirrorSummary, INDEX_FILE};
use crate::html_parser::AssetKind;

/// Progress and outcome reporting for one mirror run. The orchestrator owns
/// a boxed implementation, so tests can capture events instead of parsing
/// console output.
pub trait Report: Send + Sync {
    fn mirror_started(&self, url: &Url, output_dir: &Path);
    fn page_fetched(&self, bytes: usize);
    fn asset_saved(&self, kind: AssetKind, filename: &str);
    fn asset_skipped(&self, url: &str, reason: &str);
    fn download_failed(&self, url: &str, cause: &anyhow::Error);
    fn summary(&self, summary: &MirrorSummary);
}

pub struct ConsoleReporter {
    spinner: ProgressBar,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
            spinner.set_style(style);
        }
        Self { spinner }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Report for ConsoleReporter {
    fn mirror_started(&self, url: &Url, output_dir: &Path) {
        self.spinner
            .println(format!("🚀 Mirroring {}", url.as_str().blue()));
        self.spinner
            .println(format!("📁 Output directory: {}", output_dir.display()));
    }

    fn page_fetched(&self, bytes: usize) {
        self.spinner.println(format!("📄 Page fetched: {bytes} bytes"));
    }

    fn asset_saved(&self, kind: AssetKind, filename: &str) {
        self.spinner.set_message(format!("{}/{}", kind.folder(), filename));
        self.spinner.println(format!(
            "✅ Downloaded: {}/{}",
            kind.folder(),
            filename.green()
        ));
    }

    fn asset_skipped(&self, url: &str, reason: &str) {
        self.spinner
            .println(format!("⏭️  Skipped {} ({reason})", url.dimmed()));
    }

    fn download_failed(&self, url: &str, cause: &anyhow::Error) {
        self.spinner
            .println(format!("⚠️  Download failed for {}: {cause:#}", url.yellow()));
    }

    fn summary(&self, summary: &MirrorSummary) {
        self.spinner.finish_and_clear();

        println!();
        println!("{}", "=== Mirrored files ===".bold());
        println!("📄 HTML: {INDEX_FILE}");
        print_category("🎨 CSS files", &summary.stylesheets);
        print_category("📜 JavaScript files", &summary.scripts);
        print_category("🖼️  Images", &summary.images);
        print_category("🔖 Icons", &summary.icons);
    }
}

fn print_category(label: &str, names: &[String]) {
    println!("{label}: {}", names.len());
    for name in names {
        println!("  - {name}");
    }
}
