//! One described file: metadata, hashes and mirrors.

use crate::error::{Error, Result};
use crate::hash::{self, FileHash, PiecePolicy, MIN_PIECE_SIZE};
use crate::mime::ContentTypeResolver;
use crate::url_entry::UrlEntry;
use crate::validate;
use crate::xml::{Element, XmlSink};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use url::Url;

pub const PGP_SIGNATURE: &str = "application/pgp-signature";

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(try_from = "RawFileEntry")]
pub struct FileEntry {
    local_path: Option<String>,
    /// Human readable; a URL or the full text.
    pub copyright: Option<String>,
    /// "A Web Browser" for Firefox 3.5.
    pub description: Option<String>,
    /// "Firefox" for Firefox 3.5.
    pub identity: Option<String>,
    /// "3.5" for Firefox 3.5.
    pub version: Option<String>,
    pub publisher_name: Option<String>,
    publisher_url: Option<Url>,
    /// Detached signature over the described file, usually OpenPGP.
    pub signature: Option<String>,
    logo: Option<Url>,
    /// RFC 5646 tags.
    pub languages: Vec<String>,
    /// IANA operating system names.
    pub os: Vec<String>,
    pub urls: Vec<UrlEntry>,
    pub hashes: Vec<FileHash>,
    /// Size in bytes once hashed or read.
    pub size: Option<u64>,
    piece_policy: PiecePolicy,
    piece_size: Option<u64>,
}

/// Unchecked serde form. Hashes and urls validate themselves; the rest is
/// checked in the conversion.
#[derive(Deserialize, Default)]
#[serde(default)]
struct RawFileEntry {
    local_path: Option<String>,
    copyright: Option<String>,
    description: Option<String>,
    identity: Option<String>,
    version: Option<String>,
    publisher_name: Option<String>,
    publisher_url: Option<Url>,
    signature: Option<String>,
    logo: Option<Url>,
    languages: Vec<String>,
    os: Vec<String>,
    urls: Vec<UrlEntry>,
    hashes: Vec<FileHash>,
    size: Option<u64>,
    piece_policy: PiecePolicy,
    piece_size: Option<u64>,
}

impl TryFrom<RawFileEntry> for FileEntry {
    type Error = Error;

    fn try_from(raw: RawFileEntry) -> Result<Self> {
        if let PiecePolicy::ByCount(count) = raw.piece_policy {
            PiecePolicy::from_options(None, Some(count))?;
        }
        let mut entry = FileEntry {
            local_path: None,
            copyright: raw.copyright,
            description: raw.description,
            identity: raw.identity,
            version: raw.version,
            publisher_name: raw.publisher_name,
            publisher_url: raw.publisher_url,
            signature: raw.signature,
            logo: raw.logo,
            languages: raw.languages,
            os: raw.os,
            urls: raw.urls,
            hashes: raw.hashes,
            size: raw.size,
            piece_policy: raw.piece_policy,
            piece_size: raw.piece_size,
        };
        if let Some(local_path) = raw.local_path {
            entry.set_local_path(&local_path)?;
        }
        Ok(entry)
    }
}

impl FileEntry {
    /// `local_path` is relative to the working directory and is reproduced
    /// by clients, so it may not be absolute or contain `.`/`..` segments.
    pub fn new(local_path: &str) -> Result<Self> {
        let mut entry = FileEntry::default();
        entry.set_local_path(local_path)?;
        Ok(entry)
    }

    pub fn local_path(&self) -> Option<&str> {
        self.local_path.as_deref()
    }

    pub fn set_local_path(&mut self, local_path: &str) -> Result<()> {
        if !validate::validate_relative_path(local_path) {
            return Err(Error::InvalidPath(local_path.to_string()));
        }
        self.local_path = Some(local_path.to_string());
        Ok(())
    }

    pub fn logo(&self) -> Option<&Url> {
        self.logo.as_ref()
    }

    pub fn set_logo(&mut self, logo: Option<&str>) -> Result<()> {
        self.logo = logo.map(parse_uri).transpose()?;
        Ok(())
    }

    pub fn publisher_url(&self) -> Option<&Url> {
        self.publisher_url.as_ref()
    }

    pub fn set_publisher_url(&mut self, url: Option<&str>) -> Result<()> {
        self.publisher_url = url.map(parse_uri).transpose()?;
        Ok(())
    }

    pub fn set_language(&mut self, language: impl Into<String>) {
        self.languages = vec![language.into()];
    }

    pub fn set_languages<I, S>(&mut self, languages: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
    }

    pub fn set_os(&mut self, os: impl Into<String>) {
        self.os = vec![os.into()];
    }

    pub fn set_os_list<I, S>(&mut self, os: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.os = os.into_iter().map(Into::into).collect();
    }

    pub fn add_url(&mut self, url: UrlEntry) {
        self.urls.push(url);
    }

    pub fn piece_policy(&self) -> PiecePolicy {
        self.piece_policy
    }

    /// Resolved piece size: set directly by [`FileEntry::set_piece_size`],
    /// derived by hashing, or read from a `pieces` block.
    pub fn piece_size(&self) -> Option<u64> {
        self.piece_size
    }

    /// Hash pieces of `bytes` (at least 1 KiB). Replaces any piece count.
    pub fn set_piece_size(&mut self, bytes: u64) {
        self.piece_policy = PiecePolicy::BySize(bytes);
        self.piece_size = Some(bytes.max(MIN_PIECE_SIZE));
    }

    /// Hash roughly `count` pieces. Replaces any piece size; the size is
    /// derived from the file size when hashing.
    pub fn set_piece_count(&mut self, count: u32) -> Result<()> {
        self.piece_policy = PiecePolicy::from_options(None, Some(count))?;
        self.piece_size = self.size.and_then(|s| self.piece_policy.piece_size(s));
        Ok(())
    }

    pub fn clear_pieces(&mut self) {
        self.piece_policy = PiecePolicy::None;
        self.piece_size = None;
    }

    pub fn whole_file_hashes(&self) -> impl Iterator<Item = &FileHash> {
        self.hashes.iter().filter(|h| !h.is_piece())
    }

    /// Piece hashes sorted by index.
    pub fn piece_hashes(&self) -> Vec<&FileHash> {
        let mut pieces: Vec<&FileHash> = self.hashes.iter().filter(|h| h.is_piece()).collect();
        pieces.sort_by_key(|h| h.piece_index());
        pieces
    }

    /// SHA-256 the backing file, replacing every hash and the size.
    ///
    /// `path` reads from another location than `local_path`; it must carry
    /// the same extension. `policy` replaces the configured piece policy.
    /// No sandboxing is applied to `path`.
    pub fn checksum(&mut self, path: Option<&Path>, policy: Option<PiecePolicy>) -> Result<()> {
        let local = self.local_path.as_deref().ok_or(Error::MissingLocalPath)?;
        if let Some(p) = path {
            let expected = extension(Path::new(local));
            let actual = extension(p);
            if expected != actual {
                return Err(Error::MismatchedPath { expected, actual });
            }
        }
        let target: PathBuf = path.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(local));
        if !target.is_file() {
            return Err(Error::NotFound(target));
        }
        let f = File::open(&target)?;
        let size = f.metadata()?.len();
        self.checksum_reader(f, size, policy)?;
        tracing::debug!(path = %target.display(), size, "checksummed");
        Ok(())
    }

    /// Like [`FileEntry::checksum`] over any reader of `size` bytes. The
    /// entry is only updated once hashing succeeds.
    pub fn checksum_reader<R: Read>(
        &mut self,
        source: R,
        size: u64,
        policy: Option<PiecePolicy>,
    ) -> Result<()> {
        let policy = policy.unwrap_or(self.piece_policy);
        let computed = hash::compute_hashes(source, size, policy)?;
        self.piece_policy = policy;
        self.size = Some(computed.size);
        self.piece_size = computed.piece_size;
        self.hashes = computed.into_hashes();
        Ok(())
    }

    /// Hash with the configured policy unless hashes are already present
    /// or the backing file does not exist.
    pub fn ensure_hashes(&mut self) -> Result<()> {
        let backed = self.local_path.as_deref().is_some_and(|l| Path::new(l).is_file());
        if self.hashes.is_empty() && backed {
            self.checksum(None, None)
        } else {
            Ok(())
        }
    }

    /// Piece hashes must have indices `0..n`, a known piece size, and, when
    /// the size is known, `n == ceil(size / piece_size)`.
    pub fn check_pieces(&self) -> Result<()> {
        let pieces = self.piece_hashes();
        if pieces.is_empty() {
            return Ok(());
        }
        if pieces.iter().enumerate().any(|(i, h)| h.piece_index() != Some(i as u64)) {
            return Err(Error::InvalidConfiguration(
                "piece indices must be contiguous from 0".into(),
            ));
        }
        let piece_size = self.piece_size.ok_or_else(|| {
            Error::InvalidConfiguration("piece hashes present without a piece size".into())
        })?;
        if let Some(size) = self.size {
            let expected = hash::piece_count(size, piece_size);
            if expected != pieces.len() as u64 {
                return Err(Error::InvalidConfiguration(format!(
                    "{} piece hashes for {size} bytes at {piece_size} per piece (expected {expected})",
                    pieces.len()
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn render(
        &mut self,
        sink: &mut XmlSink,
        resolver: &dyn ContentTypeResolver,
    ) -> Result<()> {
        let local = self.local_path.clone().ok_or(Error::MissingLocalPath)?;
        self.ensure_hashes()?;
        self.check_pieces()?;

        sink.start("file", &[("name", local.as_str())])?;
        if let Some(copyright) = &self.copyright {
            sink.text_element("copyright", &[], &format!("\n{copyright}\n"))?;
        }
        if let Some(description) = &self.description {
            sink.text_element("description", &[], description)?;
        }
        if let Some(identity) = &self.identity {
            sink.text_element("identity", &[], identity)?;
        }
        for h in self.whole_file_hashes() {
            sink.text_element("hash", &type_attr(h.algorithm()), h.value())?;
        }
        for language in &self.languages {
            sink.text_element("language", &[], language)?;
        }
        if let Some(logo) = &self.logo {
            sink.text_element("logo", &[], logo.as_str())?;
        }
        for os in &self.os {
            sink.text_element("os", &[], os)?;
        }
        for url in &self.urls {
            url.render(sink, &local, resolver)?;
        }

        let pieces = self.piece_hashes();
        if let (Some(first), Some(piece_size)) =
            (self.hashes.iter().find(|h| h.is_piece()), self.piece_size)
        {
            let length = piece_size.to_string();
            let mut attrs = vec![("length", length.as_str())];
            attrs.extend(type_attr(first.algorithm()));
            sink.start("pieces", &attrs)?;
            for h in pieces {
                sink.text_element("hash", &[], h.value())?;
            }
            sink.end("pieces")?;
        }

        if self.publisher_name.is_some() || self.publisher_url.is_some() {
            let mut attrs = Vec::with_capacity(2);
            if let Some(name) = &self.publisher_name {
                attrs.push(("name", name.as_str()));
            }
            if let Some(url) = &self.publisher_url {
                attrs.push(("url", url.as_str()));
            }
            sink.text_element("publisher", &attrs, "")?;
        }
        if let Some(signature) = &self.signature {
            sink.text_element(
                "signature",
                &[("mediatype", PGP_SIGNATURE)],
                &format!("\n{signature}\n"),
            )?;
        }
        let size = self.size.map(|s| s.to_string()).unwrap_or_default();
        sink.text_element("size", &[], &size)?;
        if let Some(version) = &self.version {
            sink.text_element("version", &[], version)?;
        }
        sink.end("file")
    }

    /// Rebuild from a `file` element. Every field is recovered on its own;
    /// a malformed one is left empty instead of failing the entry.
    pub(crate) fn read(el: &Element) -> Self {
        let mut entry = FileEntry::default();

        match el.attr("name") {
            Some(name) if entry.set_local_path(name).is_ok() => {}
            Some(name) => tracing::warn!(value = name, "ignoring unsafe file name"),
            None => tracing::warn!("file element without name"),
        }
        entry.copyright = el.try_text("copyright");
        entry.description = el.try_text("description");
        entry.identity = el.try_text("identity");
        entry.version = el.try_text("version");
        entry.signature = el.try_text("signature");
        entry.logo = el.try_parse("logo", |s| Url::parse(s).ok());
        entry.size = el.try_parse("size", |s| s.parse::<u64>().ok());
        entry.languages = texts(el, "language");
        entry.os = texts(el, "os");

        if let Some(publisher) = el.child("publisher") {
            entry.publisher_name = publisher.attr("name").map(str::to_string);
            entry.publisher_url = publisher.attr("url").and_then(|u| Url::parse(u).ok());
        }

        for h in el.children("hash") {
            match FileHash::whole(h.text(), h.attr("type").unwrap_or_default()) {
                Ok(fh) => entry.hashes.push(fh),
                Err(e) => tracing::warn!(error = %e, "dropping file hash"),
            }
        }

        if let Some(pieces) = el.child("pieces") {
            if let Some(length) = pieces.attr("length").and_then(|l| l.trim().parse::<u64>().ok()) {
                entry.piece_policy = PiecePolicy::BySize(length);
                entry.piece_size = Some(length);
            }
            let algorithm = pieces.attr("type").unwrap_or_default();
            for (i, h) in pieces.children("hash").enumerate() {
                match FileHash::piece(h.text(), algorithm, i as u64) {
                    Ok(fh) => entry.hashes.push(fh),
                    Err(e) => tracing::warn!(piece = i, error = %e, "dropping piece hash"),
                }
            }
        }

        entry.urls = el
            .children
            .iter()
            .filter(|c| c.name == "url" || c.name == "metaurl")
            .filter_map(UrlEntry::read)
            .collect();
        entry
    }
}

fn parse_uri(s: &str) -> Result<Url> {
    Url::parse(s).map_err(|_| Error::InvalidUri(s.to_string()))
}

fn extension(p: &Path) -> String {
    p.extension().map(|e| e.to_string_lossy().into_owned()).unwrap_or_default()
}

fn type_attr(algorithm: &str) -> Vec<(&'static str, &str)> {
    if algorithm.is_empty() {
        Vec::new()
    } else {
        vec![("type", algorithm)]
    }
}

fn texts(el: &Element, name: &str) -> Vec<String> {
    el.children(name).map(|c| c.text().to_string()).filter(|t| !t.is_empty()).collect()
}
