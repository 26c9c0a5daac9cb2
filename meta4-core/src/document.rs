//! Top-level Metalink4 document: render to and read from RFC 5854 XML.
//!
//! When served, a rendered document should carry the
//! `application/metalink4+xml` content type.

use crate::config::RenderConfig;
use crate::error::{Error, Result};
use crate::file_entry::FileEntry;
use crate::mime::{ContentTypeResolver, MimeGuessResolver};
use crate::xml::{self, XmlSink};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

pub const NAMESPACE: &str = "urn:ietf:params:xml:ns:metalink";
pub const TIMESTAMP_FORMAT: &str = "%FT%T%:z";

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Document {
    pub files: Vec<FileEntry>,
    /// Original publish date.
    pub published: Option<DateTime<FixedOffset>>,
    /// Last publish date.
    pub updated: Option<DateTime<FixedOffset>>,
    origin: Option<Url>,
    /// Whether updates may appear at `origin`.
    pub origin_dynamic: bool,
    #[serde(skip)]
    config: RenderConfig,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RenderConfig) -> Self {
        Self { config, ..Self::default() }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn add_file(&mut self, file: FileEntry) {
        self.files.push(file);
    }

    pub fn file(&self, local_path: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.local_path() == Some(local_path))
    }

    pub fn file_mut(&mut self, local_path: &str) -> Option<&mut FileEntry> {
        self.files.iter_mut().find(|f| f.local_path() == Some(local_path))
    }

    /// URL this document is published at; updates may appear there too.
    pub fn origin(&self) -> Option<&Url> {
        self.origin.as_ref()
    }

    pub fn set_origin(&mut self, origin: Option<&str>) -> Result<()> {
        self.origin = origin
            .map(|o| Url::parse(o).map_err(|_| Error::InvalidUri(o.to_string())))
            .transpose()?;
        Ok(())
    }

    pub fn set_published_str(&mut self, s: &str) -> Result<()> {
        self.published = Some(parse_timestamp(s)?);
        Ok(())
    }

    pub fn set_updated_str(&mut self, s: &str) -> Result<()> {
        self.updated = Some(parse_timestamp(s)?);
        Ok(())
    }

    /// Hash every file that has no hashes yet and whose backing file
    /// exists, using each file's piece policy.
    pub fn checksum_all(&mut self) -> Result<()> {
        #[cfg(feature = "parallel")]
        use rayon::prelude::*;
        #[cfg(feature = "parallel")]
        let files = self.files.par_iter_mut();
        #[cfg(not(feature = "parallel"))]
        let mut files = self.files.iter_mut();
        files.try_for_each(FileEntry::ensure_hashes)
    }

    /// Render with extension-based content types.
    ///
    /// Files without hashes whose backing file exists are hashed first.
    pub fn render(&mut self) -> Result<String> {
        self.render_with(&MimeGuessResolver)
    }

    pub fn render_with(&mut self, resolver: &dyn ContentTypeResolver) -> Result<String> {
        if self.files.is_empty() {
            return Err(Error::EmptyDocument);
        }
        self.checksum_all()?;

        let mut sink = XmlSink::new(self.config.indent);
        sink.declaration()?;
        sink.start("metalink", &[("xmlns", NAMESPACE)])?;
        sink.text_element("generator", &[], &self.config.generator)?;
        if let Some(origin) = &self.origin {
            let dynamic = if self.origin_dynamic { "true" } else { "false" };
            sink.text_element("origin", &[("dynamic", dynamic)], origin.as_str())?;
        }
        if let Some(published) = &self.published {
            sink.text_element("published", &[], &published.format(TIMESTAMP_FORMAT).to_string())?;
        }
        if let Some(updated) = &self.updated {
            sink.text_element("updated", &[], &updated.format(TIMESTAMP_FORMAT).to_string())?;
        }
        for file in &mut self.files {
            file.render(&mut sink, resolver)?;
        }
        sink.end("metalink")?;
        tracing::debug!(files = self.files.len(), "rendered metalink");
        sink.into_string()
    }

    /// Read a document from a file path or from raw XML text. Hashes in the
    /// document are imported as is; nothing is computed.
    pub fn read(source: &str) -> Result<Self> {
        let path = Path::new(source);
        if path.is_file() {
            return Self::read_path(path);
        }
        Self::parse(source)
    }

    pub fn read_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::NotXml(format!("{}: {e}", path.display())))?;
        Self::parse(&raw)
    }

    /// Parse XML text. Only input that is not XML fails; malformed fields
    /// are left empty.
    pub fn parse(input: &str) -> Result<Self> {
        let root = xml::parse(input)?;
        let mut doc = Document::new();
        if root.name != "metalink" {
            tracing::warn!(root = %root.name, "not a metalink document");
            return Ok(doc);
        }

        doc.published = root.try_parse("published", |s| parse_timestamp(s).ok());
        doc.updated = root.try_parse("updated", |s| parse_timestamp(s).ok());
        doc.origin = root.try_parse("origin", |s| Url::parse(s).ok());
        doc.origin_dynamic = root
            .child("origin")
            .and_then(|o| o.attr("dynamic"))
            .is_some_and(|d| d.trim() == "true");
        doc.files = root.children("file").map(FileEntry::read).collect();
        tracing::debug!(files = doc.files.len(), "read metalink");
        Ok(doc)
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s.trim()).map_err(|_| Error::InvalidTimestamp(s.to_string()))
}
