//! Retrieval of referenced documents (`xsl:include`, `xsl:import`, the
//! `document()` function), behind a trait so hosts can substitute their own
//! transport. Fetches are cached by URL for the lifetime of one run.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("cannot fetch '{url}': {message}")]
pub struct FetchError {
    pub url: String,
    pub message: String,
}

pub trait DocumentFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Reads documents from the local filesystem. `file://` URLs and plain
/// paths are both accepted.
#[derive(Debug, Default)]
pub struct FileFetcher;

impl DocumentFetcher for FileFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let path = url.strip_prefix("file://").unwrap_or(url);
        std::fs::read_to_string(Path::new(path)).map_err(|e| FetchError {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

/// Wraps any fetcher with a per-run URL cache.
pub struct FetchCache<'f> {
    inner: &'f dyn DocumentFetcher,
    cache: RefCell<HashMap<String, String>>,
}

impl<'f> FetchCache<'f> {
    pub fn new(inner: &'f dyn DocumentFetcher) -> Self {
        FetchCache {
            inner,
            cache: RefCell::new(HashMap::new()),
        }
    }
}

impl<'f> DocumentFetcher for FetchCache<'f> {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if let Some(hit) = self.cache.borrow().get(url) {
            return Ok(hit.clone());
        }
        let text = self.inner.fetch(url)?;
        self.cache.borrow_mut().insert(url.to_string(), text.clone());
        Ok(text)
    }
}

/// Resolves `href` against an optional base. Absolute URLs pass through;
/// URL bases use proper URL joining; anything else falls back to sibling
/// path resolution.
pub fn resolve_href(base: Option<&str>, href: &str) -> String {
    if url::Url::parse(href).is_ok() {
        return href.to_string();
    }
    match base {
        Some(base) => {
            if let Ok(base_url) = url::Url::parse(base) {
                if let Ok(joined) = base_url.join(href) {
                    return joined.to_string();
                }
            }
            match Path::new(base).parent() {
                Some(dir) if !dir.as_os_str().is_empty() => {
                    dir.join(href).to_string_lossy().into_owned()
                }
                _ => href.to_string(),
            }
        }
        None => href.to_string(),
    }
}
