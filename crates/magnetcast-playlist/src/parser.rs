//! Live playlist parser.
//!
//! A playlist is read line by line. Lines of the form `#KEY` or `#KEY:ARGS`
//! are directives; only `#EXT-X-MAP` is meaningful here, its `URI="..."`
//! attribute naming the initialization segment. Every other non-empty line is
//! a segment path.

use magnetcast_common::{Error, Result};
use serde::Serialize;

/// Directive carrying the initialization segment.
pub const INIT_DIRECTIVE: &str = "EXT-X-MAP";

/// One classified playlist line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistLine<'a> {
    /// `#KEY` or `#KEY:ARGS`.
    Directive {
        key: &'a str,
        args: Option<&'a str>,
    },
    /// A `#` line that is not a well-formed directive.
    Comment,
    /// A segment path.
    Segment(&'a str),
    /// Whitespace only.
    Blank,
}

/// Classify a single playlist line.
pub fn parse_line(line: &str) -> PlaylistLine<'_> {
    let line = line.trim();
    if line.is_empty() {
        return PlaylistLine::Blank;
    }

    let Some(rest) = line.strip_prefix('#') else {
        return PlaylistLine::Segment(line);
    };

    let (key, args) = match rest.split_once(':') {
        Some((key, args)) => (key, Some(args)),
        None => (rest, None),
    };

    let well_formed = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if well_formed {
        PlaylistLine::Directive { key, args }
    } else {
        PlaylistLine::Comment
    }
}

/// Role of a playlist entry in the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Named by the initialization directive.
    Init,
    /// A plain media segment line.
    Media,
}

/// A resolvable reference in the playlist, in line order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaylistEntry {
    /// Path as written in the playlist (relative to the playlist directory
    /// unless absolute).
    pub uri: String,
    /// Whether this came from the init directive.
    pub kind: EntryKind,
    /// 1-based line number.
    pub line: usize,
}

/// A parsed live playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LivePlaylist {
    pub entries: Vec<PlaylistEntry>,
}

impl LivePlaylist {
    /// Parse playlist text.
    ///
    /// Fails only when an init directive is present without a quoted `URI`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            match parse_line(raw) {
                PlaylistLine::Directive { key, args } if key == INIT_DIRECTIVE => {
                    let uri = args.and_then(|a| attribute(a, "URI")).ok_or_else(|| {
                        Error::playlist(format!(
                            "line {line}: #{INIT_DIRECTIVE} without a quoted URI"
                        ))
                    })?;
                    entries.push(PlaylistEntry {
                        uri: uri.to_string(),
                        kind: EntryKind::Init,
                        line,
                    });
                }
                PlaylistLine::Segment(uri) => entries.push(PlaylistEntry {
                    uri: uri.to_string(),
                    kind: EntryKind::Media,
                    line,
                }),
                PlaylistLine::Directive { .. } | PlaylistLine::Comment | PlaylistLine::Blank => {}
            }
        }

        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The init directive's entry, if the playlist has one.
    pub fn init_entry(&self) -> Option<&PlaylistEntry> {
        self.entries.iter().find(|e| e.kind == EntryKind::Init)
    }
}

/// Extract a quoted attribute value from an HLS attribute list.
fn attribute<'a>(args: &'a str, name: &str) -> Option<&'a str> {
    let mut rest = args;
    while !rest.is_empty() {
        let (key, after_eq) = rest.split_once('=')?;
        let key = key.trim().trim_start_matches(',').trim();

        let (value, remaining) = if let Some(quoted) = after_eq.strip_prefix('"') {
            let end = quoted.find('"')?;
            let after = &quoted[end + 1..];
            (&quoted[..end], after.strip_prefix(',').unwrap_or(after))
        } else {
            match after_eq.split_once(',') {
                Some((v, r)) => (v, r),
                None => (after_eq, ""),
            }
        };

        if key.eq_ignore_ascii_case(name) && after_eq.starts_with('"') {
            return Some(value);
        }
        rest = remaining;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIVE: &str = "#EXTM3U
#EXT-X-VERSION:7
#EXT-X-TARGETDURATION:2
#EXT-X-MEDIA-SEQUENCE:14
#EXT-X-MAP:URI=\"init.mp4\"
#EXTINF:2.000000,
stream14.m4s
#EXTINF:2.000000,
stream15.m4s

#EXTINF:2.000000,
stream16.m4s
";

    #[test]
    fn classify_lines() {
        assert_eq!(parse_line(""), PlaylistLine::Blank);
        assert_eq!(parse_line("  "), PlaylistLine::Blank);
        assert_eq!(
            parse_line("#EXTM3U"),
            PlaylistLine::Directive {
                key: "EXTM3U",
                args: None
            }
        );
        assert_eq!(
            parse_line("#EXTINF:2.0,"),
            PlaylistLine::Directive {
                key: "EXTINF",
                args: Some("2.0,")
            }
        );
        assert_eq!(parse_line("# just a comment"), PlaylistLine::Comment);
        assert_eq!(parse_line("seg1.m4s\r"), PlaylistLine::Segment("seg1.m4s"));
    }

    #[test]
    fn parse_live_playlist_in_line_order() {
        let playlist = LivePlaylist::parse(LIVE).unwrap();
        let uris: Vec<&str> = playlist.entries.iter().map(|e| e.uri.as_str()).collect();
        assert_eq!(
            uris,
            vec!["init.mp4", "stream14.m4s", "stream15.m4s", "stream16.m4s"]
        );
        assert_eq!(playlist.entries[0].kind, EntryKind::Init);
        assert!(playlist.entries[1..]
            .iter()
            .all(|e| e.kind == EntryKind::Media));
        assert_eq!(playlist.init_entry().unwrap().line, 5);
    }

    #[test]
    fn parse_map_with_byterange() {
        let text = "#EXT-X-MAP:BYTERANGE=\"720@0\",URI=\"main.mp4\"\nseg.m4s\n";
        let playlist = LivePlaylist::parse(text).unwrap();
        assert_eq!(playlist.entries[0].uri, "main.mp4");
        assert_eq!(playlist.len(), 2);
    }

    #[test]
    fn map_without_uri_is_rejected() {
        let err = LivePlaylist::parse("#EXT-X-MAP:BYTERANGE=\"1@0\"\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn directives_only_yield_empty_playlist() {
        let playlist = LivePlaylist::parse("#EXTM3U\n#EXT-X-VERSION:7\n").unwrap();
        assert!(playlist.is_empty());
        assert!(playlist.init_entry().is_none());
    }

    #[test]
    fn attribute_lookup() {
        assert_eq!(attribute("URI=\"a.mp4\"", "URI"), Some("a.mp4"));
        assert_eq!(
            attribute("METHOD=NONE,URI=\"b.mp4\"", "uri"),
            Some("b.mp4")
        );
        assert_eq!(attribute("URI=unquoted", "URI"), None);
        assert_eq!(attribute("", "URI"), None);
    }
}
