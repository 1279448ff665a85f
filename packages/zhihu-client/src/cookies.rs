//! Cookie-file credential loading.
//!
//! The blob handed to the core is the raw file contents; interpreting it
//! (browser export array vs. plain header) happens in the client when the
//! credentials are applied.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use crawler_core::CredentialStore;
use serde::Deserialize;

/// One cookie from a browser-extension export.
#[derive(Debug, Clone, Deserialize)]
pub struct CookiePair {
    pub name: String,
    pub value: String,
}

pub struct CookieStore {
    path: PathBuf,
}

impl CookieStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for CookieStore {
    fn has_credentials(&self) -> bool {
        self.path.is_file()
    }

    fn load(&self) -> Result<String> {
        std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading cookie file {}", self.path.display()))
    }
}
