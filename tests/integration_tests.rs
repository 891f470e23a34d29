use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;
use url::Url;

use page_mirror::{AssetKind, Fetch, FetchedAsset, MirrorSummary, Report, SiteMirror};

/// Serves canned responses by exact URL and records every fetch. URLs with
/// no canned response fail like a dead link.
struct StubFetcher {
    responses: HashMap<String, (Vec<u8>, Option<String>)>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl StubFetcher {
    fn new(page_url: &str, html: &str) -> Self {
        Self {
            responses: HashMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
        .respond(page_url, html.as_bytes(), "text/html")
    }

    fn respond(mut self, url: &str, body: &[u8], content_type: &str) -> Self {
        self.responses
            .insert(url.to_string(), (body.to_vec(), Some(content_type.to_string())));
        self
    }

    fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        self.calls.clone()
    }
}

#[async_trait]
impl Fetch for StubFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedAsset> {
        self.calls.lock().unwrap().push(url.as_str().to_string());

        match self.responses.get(url.as_str()) {
            Some((body, content_type)) => Ok(FetchedAsset {
                body: body.clone(),
                content_type: content_type.clone(),
            }),
            None => Err(anyhow!("HTTP 404 Not Found for {url}")),
        }
    }
}

/// Records reporter events as plain strings for assertions.
#[derive(Clone, Default)]
struct CaptureReporter {
    events: Arc<Mutex<Vec<String>>>,
}

impl CaptureReporter {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl Report for CaptureReporter {
    fn mirror_started(&self, url: &Url, _output_dir: &Path) {
        self.push(format!("started {url}"));
    }

    fn page_fetched(&self, bytes: usize) {
        self.push(format!("page {bytes}"));
    }

    fn asset_saved(&self, kind: AssetKind, filename: &str) {
        self.push(format!("saved {}/{filename}", kind.folder()));
    }

    fn asset_skipped(&self, url: &str, reason: &str) {
        self.push(format!("skipped {url} ({reason})"));
    }

    fn download_failed(&self, url: &str, _cause: &anyhow::Error) {
        self.push(format!("failed {url}"));
    }

    fn summary(&self, summary: &MirrorSummary) {
        self.push(format!("summary {}", summary.total()));
    }
}

fn build_mirror(output: &Path, fetcher: StubFetcher) -> SiteMirror {
    SiteMirror::new(
        "https://x.test/page",
        output,
        Box::new(fetcher),
        Box::new(CaptureReporter::default()),
    )
    .unwrap()
}

fn read_index(output: &Path) -> String {
    std::fs::read_to_string(output.join("index.html")).unwrap()
}

#[tokio::test]
async fn test_inline_style_round_trip() {
    let temp = tempdir().unwrap();
    let page = r#"
        <html><head>
            <title>Styled</title>
            <style>body { color: red; }</style>
        </head><body><p>hi</p></body></html>
    "#;

    let mut mirror = build_mirror(temp.path(), StubFetcher::new("https://x.test/page", page));
    let summary = mirror.mirror_page().await.unwrap();

    let index = read_index(temp.path());
    assert!(!index.contains("<style>"));
    assert!(index.contains(r#"<link rel="stylesheet" href="css/styles.css">"#));

    let css = std::fs::read_to_string(temp.path().join("css/styles.css")).unwrap();
    assert_eq!(css.trim(), "body { color: red; }");
    assert_eq!(summary.stylesheets, vec!["styles.css"]);
}

#[tokio::test]
async fn test_external_stylesheet_rewritten_to_local_path() {
    let temp = tempdir().unwrap();
    let page = r#"
        <html><head>
            <link rel="stylesheet" href="https://x.test/a.css">
        </head><body></body></html>
    "#;

    let fetcher = StubFetcher::new("https://x.test/page", page).respond(
        "https://x.test/a.css",
        b"p { margin: 0; }",
        "text/css",
    );

    let mut mirror = build_mirror(temp.path(), fetcher);
    let summary = mirror.mirror_page().await.unwrap();

    let index = read_index(temp.path());
    assert!(index.contains(r#"href="css/a.css""#));
    assert_eq!(
        std::fs::read_to_string(temp.path().join("css/a.css")).unwrap(),
        "p { margin: 0; }"
    );
    assert_eq!(summary.stylesheets, vec!["a.css"]);
}

#[tokio::test]
async fn test_stylesheet_without_extension_gets_one_from_content_type() {
    let temp = tempdir().unwrap();
    let page = r#"
        <html><head>
            <link rel="stylesheet" href="https://cdn.x.test/fonts?family=Sans">
        </head><body></body></html>
    "#;

    let fetcher = StubFetcher::new("https://x.test/page", page).respond(
        "https://cdn.x.test/fonts?family=Sans",
        b"@font-face {}",
        "text/css; charset=utf-8",
    );

    let mut mirror = build_mirror(temp.path(), fetcher);
    mirror.mirror_page().await.unwrap();

    assert!(temp.path().join("css/fonts.css").exists());
    assert!(read_index(temp.path()).contains(r#"href="css/fonts.css""#));
}

#[tokio::test]
async fn test_scripts_and_icons_land_in_their_folders() {
    let temp = tempdir().unwrap();
    let page = r#"
        <html><head>
            <script src="/js/app.js"></script>
            <link rel="shortcut icon" href="/favicon.ico">
        </head><body></body></html>
    "#;

    let fetcher = StubFetcher::new("https://x.test/page", page)
        .respond("https://x.test/js/app.js", b"console.log(1);", "application/javascript")
        .respond("https://x.test/favicon.ico", b"icon-bytes", "image/x-icon");

    let mut mirror = build_mirror(temp.path(), fetcher);
    let summary = mirror.mirror_page().await.unwrap();

    let index = read_index(temp.path());
    assert!(index.contains(r#"src="js/app.js""#));
    assert!(index.contains(r#"href="assets/favicon.ico""#));
    assert_eq!(summary.scripts, vec!["app.js"]);
    assert_eq!(summary.icons, vec!["favicon.ico"]);
}

#[tokio::test]
async fn test_duplicate_images_downloaded_once() {
    let temp = tempdir().unwrap();
    let page = r#"
        <html><head></head><body>
            <img src="/logo.png">
            <img src="/logo.png">
        </body></html>
    "#;

    let fetcher = StubFetcher::new("https://x.test/page", page).respond(
        "https://x.test/logo.png",
        b"png-bytes",
        "image/png",
    );
    let calls = fetcher.calls();

    let mut mirror = build_mirror(temp.path(), fetcher);
    mirror.mirror_page().await.unwrap();

    let logo_fetches = calls
        .lock()
        .unwrap()
        .iter()
        .filter(|u| u.as_str() == "https://x.test/logo.png")
        .count();
    assert_eq!(logo_fetches, 1);

    // Both references are rewritten to the one local copy.
    assert_eq!(read_index(temp.path()).matches(r#"src="images/logo.png""#).count(), 2);
}

#[tokio::test]
async fn test_data_urls_skipped_and_unchanged() {
    let temp = tempdir().unwrap();
    let page = r#"
        <html><head></head><body>
            <img src="data:image/gif;base64,R0lGODlh">
        </body></html>
    "#;

    let fetcher = StubFetcher::new("https://x.test/page", page);
    let calls = fetcher.calls();

    let mut mirror = build_mirror(temp.path(), fetcher);
    mirror.mirror_page().await.unwrap();

    assert_eq!(calls.lock().unwrap().len(), 1, "only the page itself is fetched");
    assert!(read_index(temp.path()).contains(r#"src="data:image/gif;base64,R0lGODlh""#));
}

#[tokio::test]
async fn test_css_url_reference_rewritten_and_downloaded() {
    let temp = tempdir().unwrap();
    let page = r#"
        <html><head>
            <style>.hero { background: url(bg.png); }</style>
        </head><body></body></html>
    "#;

    let fetcher = StubFetcher::new("https://x.test/page", page).respond(
        "https://x.test/bg.png",
        b"png-bytes",
        "image/png",
    );

    let mut mirror = build_mirror(temp.path(), fetcher);
    let summary = mirror.mirror_page().await.unwrap();

    let css = std::fs::read_to_string(temp.path().join("css/styles.css")).unwrap();
    assert!(css.contains("url(../images/bg.png)"));
    assert!(!css.contains("url(bg.png)"));
    assert!(temp.path().join("images/bg.png").exists());
    assert_eq!(summary.images, vec!["bg.png"]);
}

#[tokio::test]
async fn test_css_image_shared_with_img_tag_fetched_once() {
    let temp = tempdir().unwrap();
    let page = r#"
        <html><head>
            <style>.hero { background: url(/logo.png); }</style>
        </head><body>
            <img src="/logo.png">
        </body></html>
    "#;

    let fetcher = StubFetcher::new("https://x.test/page", page).respond(
        "https://x.test/logo.png",
        b"png-bytes",
        "image/png",
    );
    let calls = fetcher.calls();

    let mut mirror = build_mirror(temp.path(), fetcher);
    mirror.mirror_page().await.unwrap();

    let logo_fetches = calls
        .lock()
        .unwrap()
        .iter()
        .filter(|u| u.as_str() == "https://x.test/logo.png")
        .count();
    assert_eq!(logo_fetches, 1);

    let css = std::fs::read_to_string(temp.path().join("css/styles.css")).unwrap();
    assert!(css.contains("../images/logo.png"));
    assert!(read_index(temp.path()).contains(r#"src="images/logo.png""#));
}

#[tokio::test]
async fn test_root_fetch_failure_aborts_run() {
    let temp = tempdir().unwrap();
    let output = temp.path().join("site");

    // No canned responses at all: the page fetch itself fails.
    let fetcher = StubFetcher {
        responses: HashMap::new(),
        calls: Arc::new(Mutex::new(Vec::new())),
    };

    let mut mirror = SiteMirror::new(
        "https://x.test/page",
        &output,
        Box::new(fetcher),
        Box::new(CaptureReporter::default()),
    )
    .unwrap();

    let result = mirror.mirror_page().await;
    assert!(result.is_err());
    assert!(!output.join("index.html").exists());
    // Directories created up front persist even on total failure.
    assert!(output.join("css").is_dir());
}

#[tokio::test]
async fn test_failed_image_skipped_but_run_completes() {
    let temp = tempdir().unwrap();
    let page = r#"
        <html><head></head><body>
            <img src="/good.png">
            <img src="/bad.png">
        </body></html>
    "#;

    let fetcher = StubFetcher::new("https://x.test/page", page).respond(
        "https://x.test/good.png",
        b"png-bytes",
        "image/png",
    );

    let reporter = CaptureReporter::default();
    let mut mirror = SiteMirror::new(
        "https://x.test/page",
        temp.path(),
        Box::new(fetcher),
        Box::new(reporter.clone()),
    )
    .unwrap();

    let summary = mirror.mirror_page().await.unwrap();

    // Only the successful image shows up in the summary and on disk.
    assert_eq!(summary.images, vec!["good.png"]);
    assert!(!temp.path().join("images/bad.png").exists());

    // The failed reference keeps its original URL; the good one is local.
    let index = read_index(temp.path());
    assert!(index.contains(r#"src="images/good.png""#));
    assert!(index.contains(r#"src="/bad.png""#));

    let events = reporter.events();
    assert!(events.contains(&"failed https://x.test/bad.png".to_string()));
    assert!(events.contains(&"saved images/good.png".to_string()));
}

#[tokio::test]
async fn test_reporter_captures_run_lifecycle() {
    let temp = tempdir().unwrap();
    let page = r#"<html><head><style>body {}</style></head><body></body></html>"#;

    let reporter = CaptureReporter::default();
    let mut mirror = SiteMirror::new(
        "https://x.test/page",
        temp.path(),
        Box::new(StubFetcher::new("https://x.test/page", page)),
        Box::new(reporter.clone()),
    )
    .unwrap();

    mirror.mirror_page().await.unwrap();

    let events = reporter.events();
    assert_eq!(events.first().unwrap(), "started https://x.test/page");
    assert!(events.contains(&"saved css/styles.css".to_string()));
    assert_eq!(events.last().unwrap(), "summary 1");
}
