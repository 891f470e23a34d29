use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::html_parser::AssetKind;

pub const INDEX_FILE: &str = "index.html";
pub const COMBINED_STYLESHEET: &str = "styles.css";

/// The fixed on-disk layout of one mirrored page: `index.html` at the root
/// plus `css/`, `js/`, `images/`, and `assets/` subfolders.
#[derive(Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    pub fn dir_for(&self, kind: AssetKind) -> PathBuf {
        self.root.join(kind.folder())
    }

    /// Create the root and all category subfolders. They are created up
    /// front and persist even if the run fails later.
    pub fn ensure_dirs(&self) -> Result<()> {
        for kind in AssetKind::ALL {
            let dir = self.dir_for(kind);
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn save_asset(&self, kind: AssetKind, filename: &str, body: &[u8]) -> Result<PathBuf> {
        let path = self.dir_for(kind).join(filename);
        fs::write(&path, body).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Write or overwrite the combined stylesheet extracted from inline
    /// `<style>` blocks.
    pub fn write_stylesheet(&self, text: &str) -> Result<PathBuf> {
        self.save_asset(AssetKind::Stylesheet, COMBINED_STYLESHEET, text.as_bytes())
    }

    pub fn write_index(&self, html: &str) -> Result<PathBuf> {
        let path = self.index_path();
        fs::write(&path, html).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Enumerate the files actually present in each category folder,
    /// filtered by known extensions and sorted by name.
    pub fn collect_summary(&self) -> Result<MirrorSummary> {
        Ok(MirrorSummary {
            stylesheets: list_files(&self.dir_for(AssetKind::Stylesheet), |name| {
                name.ends_with(".css")
            })?,
            scripts: list_files(&self.dir_for(AssetKind::Script), |name| name.ends_with(".js"))?,
            images: list_files(&self.dir_for(AssetKind::Image), is_image_name)?,
            icons: list_files(&self.dir_for(AssetKind::Icon), is_image_name)?,
        })
    }
}

/// Files found on disk per category after a run. Informational only.
#[derive(Debug, Default, Serialize)]
pub struct MirrorSummary {
    pub stylesheets: Vec<String>,
    pub scripts: Vec<String>,
    pub images: Vec<String>,
    pub icons: Vec<String>,
}

impl MirrorSummary {
    pub fn total(&self) -> usize {
        self.stylesheets.len() + self.scripts.len() + self.images.len() + self.icons.len()
    }
}

fn list_files(dir: &Path, keep: impl Fn(&str) -> bool) -> Result<Vec<String>> {
    let mut names = Vec::new();
    if !dir.is_dir() {
        return Ok(names);
    }

    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            let name = entry.file_name().to_string_lossy().into_owned();
            if keep(&name) {
                names.push(name);
            }
        }
    }

    names.sort();
    Ok(names)
}

fn is_image_name(name: &str) -> bool {
    mime_guess::from_path(name)
        .first()
        .is_some_and(|guess| guess.type_() == mime::IMAGE)
}
