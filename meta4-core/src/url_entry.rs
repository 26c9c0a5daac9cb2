use crate::error::{Error, Result};
use crate::mime::ContentTypeResolver;
use crate::validate;
use crate::xml::{Element, XmlSink};
use serde::{Deserialize, Serialize};
use url::Url;

/// A mirror or alternate-format reference for one described file.
///
/// Whether it is written as `url` or `metaurl` is decided at render time by
/// comparing content types; nothing about the kind is stored.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(try_from = "RawUrlEntry")]
pub struct UrlEntry {
    target: Url,
    location: Option<String>,
    priority: i64,
}

/// Unchecked serde form; converted through the setters.
#[derive(Deserialize)]
struct RawUrlEntry {
    target: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(default = "default_priority")]
    priority: i64,
}

fn default_priority() -> i64 {
    1
}

impl TryFrom<RawUrlEntry> for UrlEntry {
    type Error = Error;

    fn try_from(raw: RawUrlEntry) -> Result<Self> {
        let mut entry = UrlEntry::new(&raw.target)?;
        entry.set_location(raw.location.as_deref())?;
        entry.set_priority(raw.priority);
        Ok(entry)
    }
}

/// How a [`UrlEntry`] is written for a given described path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UrlKind {
    Direct,
    Meta { mediatype: String },
}

impl UrlEntry {
    pub fn new(target: &str) -> Result<Self> {
        let target = Url::parse(target).map_err(|_| Error::InvalidUri(target.to_string()))?;
        Ok(Self { target, location: None, priority: default_priority() })
    }

    pub fn with_location(mut self, location: &str) -> Result<Self> {
        self.set_location(Some(location))?;
        Ok(self)
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.set_priority(priority);
        self
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    pub fn set_location(&mut self, location: Option<&str>) -> Result<()> {
        match location {
            Some(l) if !validate::validate_location(l) => Err(Error::InvalidLocation(l.into())),
            l => {
                self.location = l.map(str::to_string);
                Ok(())
            }
        }
    }

    /// Clamped into `1..=999999`.
    pub fn set_priority(&mut self, priority: i64) {
        self.priority = validate::clamp_priority(priority);
    }

    /// Decide between a direct mirror and a meta-URL for `described_path`.
    pub fn classify(
        &self,
        described_path: &str,
        resolver: &dyn ContentTypeResolver,
    ) -> Result<UrlKind> {
        let path = self.target.path();
        let described = resolver.content_type(described_path);
        let target = resolver.content_type(path);
        if described == target {
            return Ok(UrlKind::Direct);
        }
        if described.is_none() {
            tracing::warn!(
                path = described_path,
                url = %self.target,
                "content type of described file could not be resolved"
            );
        }
        if path.ends_with(".torrent") {
            return Ok(UrlKind::Meta { mediatype: "torrent".into() });
        }
        match target {
            Some(mediatype) => Ok(UrlKind::Meta { mediatype }),
            None => {
                tracing::error!(
                    path = described_path,
                    url = %self.target,
                    "content type of url target could not be resolved"
                );
                Err(Error::TypeResolution {
                    path: described_path.to_string(),
                    url: self.target.to_string(),
                })
            }
        }
    }

    pub(crate) fn render(
        &self,
        sink: &mut XmlSink,
        described_path: &str,
        resolver: &dyn ContentTypeResolver,
    ) -> Result<()> {
        let priority = self.priority.to_string();
        match self.classify(described_path, resolver)? {
            UrlKind::Direct => {
                let mut attrs = Vec::with_capacity(2);
                if let Some(loc) = &self.location {
                    attrs.push(("location", loc.as_str()));
                }
                attrs.push(("priority", priority.as_str()));
                sink.text_element("url", &attrs, self.target.as_str())
            }
            UrlKind::Meta { mediatype } => sink.text_element(
                "metaurl",
                &[("priority", priority.as_str()), ("mediatype", mediatype.as_str())],
                self.target.as_str(),
            ),
        }
    }

    /// Rebuild from a `url` or `metaurl` element. An unparseable target
    /// drops the entry; bad `location` and `priority` fall back to defaults.
    pub(crate) fn read(el: &Element) -> Option<Self> {
        let mut entry = match UrlEntry::new(el.text()) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(element = %el.name, value = el.text(), error = %e, "dropping url");
                return None;
            }
        };
        if let Some(loc) = el.attr("location") {
            if entry.set_location(Some(loc)).is_err() {
                tracing::warn!(value = loc, "ignoring malformed url location");
            }
        }
        if let Some(priority) = el.attr("priority").and_then(parse_priority) {
            entry.set_priority(priority);
        }
        Some(entry)
    }
}

impl std::str::FromStr for UrlEntry {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        UrlEntry::new(s)
    }
}

/// Out-of-range values saturate so clamping still applies.
fn parse_priority(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    match raw.parse::<i64>() {
        Ok(n) => Some(n),
        Err(_) if !raw.is_empty() && raw.trim_start_matches('-').bytes().all(|b| b.is_ascii_digit()) => {
            Some(if raw.starts_with('-') { i64::MIN } else { i64::MAX })
        }
        Err(_) => None,
    }
}
