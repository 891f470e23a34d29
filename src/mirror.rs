use anyhow::{Context, Result};
use markup5ever_rcdom::{Handle, RcDom};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;
use url::Url;

use crate::downloader::{derive_filename, Fetch};
use crate::file_manager::{MirrorSummary, OutputLayout, COMBINED_STYLESHEET};
use crate::html_parser::{self, AssetKind, AssetRef};
use crate::report::Report;

/// Drives the whole pipeline for one page: fetch, parse, extract inline
/// styles, download and rewrite assets, serialize, report.
pub struct SiteMirror {
    page_url: Url,
    layout: OutputLayout,
    fetcher: Box<dyn Fetch>,
    reporter: Box<dyn Report>,
    // Absolute image URL -> derived filename. Repeated references reuse the
    // filename instead of fetching again.
    downloaded_images: HashMap<String, String>,
}

impl SiteMirror {
    pub fn new(
        url: &str,
        output_dir: &Path,
        fetcher: Box<dyn Fetch>,
        reporter: Box<dyn Report>,
    ) -> Result<Self> {
        let page_url = Url::parse(url).with_context(|| format!("invalid page URL: {url}"))?;

        Ok(Self {
            page_url,
            layout: OutputLayout::new(output_dir),
            fetcher,
            reporter,
            downloaded_images: HashMap::new(),
        })
    }

    /// Mirror the page into the output directory and return the summary of
    /// files written. Fails only when the page itself cannot be fetched;
    /// individual asset failures are reported and skipped.
    pub async fn mirror_page(&mut self) -> Result<MirrorSummary> {
        self.reporter.mirror_started(&self.page_url, self.layout.root());
        self.layout.ensure_dirs()?;

        let page = self
            .fetcher
            .fetch(&self.page_url)
            .await
            .with_context(|| format!("failed to fetch page {}", self.page_url))?;
        self.reporter.page_fetched(page.body.len());

        let dom = html_parser::parse_page(&page.text());

        let (inline_css, injected_link) = self.extract_inline_styles(&dom)?;

        self.process_assets(&dom, AssetKind::Stylesheet, injected_link.as_ref())
            .await;
        self.process_assets(&dom, AssetKind::Script, None).await;
        self.process_assets(&dom, AssetKind::Image, None).await;

        if let Some(css) = inline_css {
            self.process_stylesheet_urls(css).await?;
        }

        self.process_assets(&dom, AssetKind::Icon, None).await;

        let html = html_parser::serialize_page(&dom)?;
        self.layout.write_index(&html)?;

        let summary = self.layout.collect_summary()?;
        self.reporter.summary(&summary);
        Ok(summary)
    }

    /// Concatenate all inline `<style>` text in document order. When the
    /// result is non-blank it becomes `css/styles.css`, the style elements
    /// are removed, and a link to the combined file is appended to the head.
    /// Returns the buffer and the injected link's handle; the handle is
    /// excluded from the external-stylesheet pass so the mirror never tries
    /// to fetch its own output.
    fn extract_inline_styles(&self, dom: &RcDom) -> Result<(Option<String>, Option<Handle>)> {
        let styles = html_parser::style_elements(dom);

        let mut combined = String::new();
        for style in &styles {
            let text = html_parser::text_content(style);
            if !text.is_empty() {
                combined.push_str(&text);
                combined.push('\n');
            }
        }

        if combined.trim().is_empty() {
            return Ok((None, None));
        }

        self.layout.write_stylesheet(&combined)?;
        self.reporter
            .asset_saved(AssetKind::Stylesheet, COMBINED_STYLESHEET);

        for style in &styles {
            html_parser::detach(style);
        }

        // Without a <head> the combined stylesheet stays on disk unreferenced.
        let injected = html_parser::find_head(dom)
            .map(|head| html_parser::append_stylesheet_link(&head, &format!("css/{COMBINED_STYLESHEET}")));

        Ok((Some(combined), injected))
    }

    async fn process_assets(&mut self, dom: &RcDom, kind: AssetKind, skip: Option<&Handle>) {
        for asset in html_parser::discover_assets(dom, kind) {
            if skip.is_some_and(|node| Rc::ptr_eq(node, &asset.node)) {
                continue;
            }
            self.process_asset(&asset).await;
        }
    }

    /// Download one discovered asset and rewrite its attribute to the local
    /// relative path. The attribute keeps its original value when the
    /// download fails.
    async fn process_asset(&mut self, asset: &AssetRef) {
        if asset.raw.starts_with("data:") {
            self.reporter.asset_skipped(&asset.raw, "data URL");
            return;
        }

        let url = match html_parser::resolve_url(&self.page_url, &asset.raw) {
            Ok(url) => url,
            Err(err) => {
                self.reporter.download_failed(&asset.raw, &err);
                return;
            }
        };

        let cached = if asset.kind == AssetKind::Image {
            self.downloaded_images.get(url.as_str()).cloned()
        } else {
            None
        };

        let filename = match cached {
            Some(existing) => {
                self.reporter.asset_skipped(url.as_str(), "already downloaded");
                Some(existing)
            }
            None => self.download_asset(&url, asset.kind).await,
        };

        if let Some(filename) = filename {
            html_parser::set_attr(
                &asset.node,
                asset.kind.attr(),
                &format!("{}/{}", asset.kind.folder(), filename),
            );
        }
    }

    /// Scan the combined stylesheet for `url(...)` references, download each
    /// into the images folder, and substitute every occurrence of the
    /// original reference with `../images/<name>`. Applies only to the
    /// inline-origin stylesheet; downloaded external stylesheets are saved
    /// as-is.
    async fn process_stylesheet_urls(&mut self, mut css: String) -> Result<()> {
        let mut seen = HashSet::new();
        let mut changed = false;

        for reference in html_parser::css_url_references(&css) {
            // Each distinct reference string is handled once; replacing it
            // again would corrupt the already-substituted text.
            if reference.starts_with("data:") || !seen.insert(reference.clone()) {
                continue;
            }

            let url = match html_parser::resolve_url(&self.page_url, &reference) {
                Ok(url) => url,
                Err(err) => {
                    self.reporter.download_failed(&reference, &err);
                    continue;
                }
            };

            let filename = match self.downloaded_images.get(url.as_str()).cloned() {
                Some(existing) => Some(existing),
                None => self.download_asset(&url, AssetKind::Image).await,
            };

            if let Some(filename) = filename {
                css = css.replace(&reference, &format!("../images/{filename}"));
                changed = true;
            }
        }

        if changed {
            self.layout.write_stylesheet(&css)?;
        }
        Ok(())
    }

    async fn download_asset(&mut self, url: &Url, kind: AssetKind) -> Option<String> {
        match self.try_download(url, kind).await {
            Ok(filename) => {
                if kind == AssetKind::Image {
                    self.downloaded_images
                        .insert(url.as_str().to_string(), filename.clone());
                }
                Some(filename)
            }
            Err(err) => {
                self.reporter.download_failed(url.as_str(), &err);
                None
            }
        }
    }

    async fn try_download(&self, url: &Url, kind: AssetKind) -> Result<String> {
        let fetched = self.fetcher.fetch(url).await?;
        let filename = derive_filename(url, fetched.content_type.as_deref());
        self.layout.save_asset(kind, &filename, &fetched.body)?;
        self.reporter.asset_saved(kind, &filename);
        Ok(filename)
    }
}
