//! Magnet-style content identifiers.
//!
//! Identifiers take the form `magnet:?xt=urn:btmh:1220<hex>&dn=<name>`, where
//! `1220` is the multihash prefix for a 32-byte SHA-256 digest. Published
//! identifiers never carry tracker (`tr=`) parameters, so peers rely on
//! decentralized discovery only.

use std::fmt::Write;

use magnetcast_common::{ContentId, Error, Result};
use url::form_urlencoded;

use crate::artifact::InfoHash;

const SCHEME: &str = "magnet:?";
const XT_PREFIX: &str = "urn:btmh:1220";

/// Parsed magnet identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Magnet {
    pub info_hash: InfoHash,
    pub name: Option<String>,
    pub trackers: Vec<String>,
    /// Parameters other than `xt`, `dn` and `tr`, kept in order.
    pub extra: Vec<(String, String)>,
}

impl Magnet {
    pub fn new(info_hash: InfoHash, name: Option<String>) -> Self {
        Self {
            info_hash,
            name,
            trackers: Vec::new(),
            extra: Vec::new(),
        }
    }

    /// Parse a magnet URI.
    pub fn parse(uri: &str) -> Result<Self> {
        let query = uri
            .trim()
            .strip_prefix(SCHEME)
            .ok_or_else(|| Error::InvalidIdentifier(format!("not a magnet URI: {uri}")))?;

        let mut info_hash = None;
        let mut name = None;
        let mut trackers = Vec::new();
        let mut extra = Vec::new();

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "xt" => {
                    let hex = value.strip_prefix(XT_PREFIX).ok_or_else(|| {
                        Error::InvalidIdentifier(format!("unsupported exact topic: {value}"))
                    })?;
                    info_hash = Some(hex.parse::<InfoHash>()?);
                }
                "dn" => name = Some(value.into_owned()),
                "tr" => trackers.push(value.into_owned()),
                _ => extra.push((key.into_owned(), value.into_owned())),
            }
        }

        let info_hash = info_hash
            .ok_or_else(|| Error::InvalidIdentifier(format!("magnet URI has no xt: {uri}")))?;

        Ok(Self {
            info_hash,
            name,
            trackers,
            extra,
        })
    }

    /// Parse the magnet carried by a content identifier.
    pub fn from_content_id(id: &ContentId) -> Result<Self> {
        Self::parse(id.as_str())
    }

    /// Drop every tracker parameter.
    pub fn strip_trackers(mut self) -> Self {
        self.trackers.clear();
        self
    }

    /// Render the URI, including trackers if any are present.
    pub fn render(&self) -> String {
        let mut out = format!("{SCHEME}xt={XT_PREFIX}{}", self.info_hash);
        if let Some(name) = &self.name {
            let _ = write!(out, "&dn={}", encode(name));
        }
        for tracker in &self.trackers {
            let _ = write!(out, "&tr={}", encode(tracker));
        }
        for (key, value) in &self.extra {
            let _ = write!(out, "&{}={}", encode(key), encode(value));
        }
        out
    }

    /// Canonical content identifier: this magnet with trackers stripped.
    pub fn to_content_id(&self) -> Result<ContentId> {
        self.clone().strip_trackers().render().parse()
    }
}

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash() -> InfoHash {
        InfoHash::of_info(b"d4:name8:seg0.m4se")
    }

    #[test]
    fn render_and_parse() {
        let magnet = Magnet::new(hash(), Some("seg 0.m4s".into()));
        let uri = magnet.render();
        assert!(uri.starts_with("magnet:?xt=urn:btmh:1220"));
        assert!(uri.ends_with("&dn=seg+0.m4s"));
        assert_eq!(Magnet::parse(&uri).unwrap(), magnet);
    }

    #[test]
    fn content_id_strips_trackers() {
        let uri = format!(
            "magnet:?xt=urn:btmh:1220{}&dn=init.mp4&tr=ws%3A%2F%2Flocalhost%3A8033&tr=udp%3A%2F%2Ft.example%3A80",
            hash()
        );
        let magnet = Magnet::parse(&uri).unwrap();
        assert_eq!(magnet.trackers.len(), 2);
        assert_eq!(magnet.trackers[0], "ws://localhost:8033");

        let id = magnet.to_content_id().unwrap();
        assert!(!id.as_str().contains("tr="));
        assert_eq!(Magnet::from_content_id(&id).unwrap().info_hash, hash());
    }

    #[test]
    fn extra_params_are_kept() {
        let uri = format!("magnet:?xt=urn:btmh:1220{}&x.pe=10.0.0.1%3A6881", hash());
        let magnet = Magnet::parse(&uri).unwrap();
        assert_eq!(magnet.extra, vec![("x.pe".into(), "10.0.0.1:6881".into())]);
        assert!(magnet.render().contains("x.pe=10.0.0.1%3A6881"));
    }

    #[test]
    fn rejects_non_magnet() {
        assert!(Magnet::parse("http://example.com").is_err());
        assert!(Magnet::parse("magnet:?dn=only-a-name").is_err());
        assert!(Magnet::parse("magnet:?xt=urn:btih:c12fe1c06bba254a9dc9f519b335aa7c1367a88a").is_err());
    }
}
