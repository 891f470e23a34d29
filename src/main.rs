use anyhow::Result;
use clap::Parser;
use std::time::Duration;

use page_mirror::{ConsoleReporter, HttpFetcher, MirrorCommand, SiteMirror};

#[tokio::main]
async fn main() -> Result<()> {
    let args = MirrorCommand::parse();

    let fetcher = HttpFetcher::new(&args.user_agent, Duration::from_secs(args.timeout))?;
    let mut mirror = SiteMirror::new(
        &args.url,
        &args.output_dir,
        Box::new(fetcher),
        Box::new(ConsoleReporter::new()),
    )?;

    let summary = mirror.mirror_page().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    println!(
        "✅ Page mirrored into {} ({} assets)",
        args.output_dir.display(),
        summary.total()
    );
    Ok(())
}
