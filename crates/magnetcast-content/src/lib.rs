//! # magnetcast-content
//!
//! Everything between a segment file on disk and its payload in a consumer:
//!
//! - **[`artifact`]** -- piece-hashed info dictionaries and their info hashes
//! - **[`magnet`]** -- magnet-style content identifiers, tracker stripping
//! - **[`provider`]** -- the [`ContentPublisher`] / [`ContentFetcher`]
//!   capabilities the pipeline is written against
//! - **[`swarm`]** -- [`LocalSwarm`], an in-process seeding registry
//! - **[`http`]** -- [`HttpSwarmFetcher`], which retrieves and verifies
//!   payloads from a gateway serving a [`LocalSwarm`]
//!
//! # Examples
//!
//! ```
//! use magnetcast_content::{ArtifactInfo, Magnet};
//!
//! let info = ArtifactInfo::from_bytes("seg0.m4s", b"segment bytes", 4);
//! let id = Magnet::new(info.info_hash(), Some(info.name.clone()))
//!     .to_content_id()
//!     .unwrap();
//! assert!(id.as_str().starts_with("magnet:?xt=urn:btmh:1220"));
//! assert!(info.verify(b"segment bytes").is_ok());
//! ```

pub mod artifact;
pub mod bencode;
pub mod http;
pub mod magnet;
pub mod provider;
pub mod swarm;

pub use artifact::{Artifact, ArtifactInfo, InfoHash, DEFAULT_PIECE_LENGTH};
pub use http::HttpSwarmFetcher;
pub use magnet::Magnet;
pub use provider::{
    ContentFetcher, ContentPublisher, ProgressSender, RetrievalProgress, RetrieveOptions,
    SeedHandle,
};
pub use swarm::{LocalSwarm, SeededArtifact};
