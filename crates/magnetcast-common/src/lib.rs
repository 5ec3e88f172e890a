//! Magnetcast-Common: shared types used by the publisher and the consumer.
//!
//! - **Identifiers**: [`ContentId`] for published segments, [`SessionId`] for
//!   seeding sessions
//! - **Error Handling**: the [`Error`] taxonomy and its [`Result`] alias
//! - **Events**: a broadcast [`EventBus`] with a ring buffer of recent events
//!
//! # Examples
//!
//! ```
//! use magnetcast_common::{ContentId, Error, Result};
//!
//! let id: ContentId = "magnet:?xt=urn:btmh:1220ab".parse().unwrap();
//! assert!(id.as_str().starts_with("magnet:"));
//!
//! fn example() -> Result<()> {
//!     Err(Error::internal("nothing to do"))
//! }
//! assert!(example().is_err());
//! ```

pub mod error;
pub mod events;
pub mod ids;

pub use error::{Error, Result};
pub use events::{Event, EventBus, EventPayload};
pub use ids::*;
