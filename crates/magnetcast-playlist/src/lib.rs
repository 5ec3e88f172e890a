//! # magnetcast-playlist
//!
//! Text formats at both ends of the feed:
//!
//! - **[`LivePlaylist`]** -- the publisher's input, an HLS-style media playlist
//!   whose directives are mostly ignored except for the initialization map.
//! - **[`FeedSnapshot`]** -- the publisher's output and the consumer's input,
//!   one content identifier per line with the initialization segment first.

pub mod feed;
pub mod parser;

pub use feed::FeedSnapshot;
pub use parser::{parse_line, EntryKind, LivePlaylist, PlaylistEntry, PlaylistLine};
