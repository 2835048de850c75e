//! Project files and the models built over their events.
//!
//! - [`ProjectFile`]: the `FLhd`/`FLdt` container around the event stream
//! - [`Arrangement`]: arrangement name and index, with its [`Playlist`]
//! - [`Insert`]: mixer insert with its [`InsertSlot`]s
//! - [`EnvelopeLfo`]: per-channel envelope/LFO records

pub mod arrangement;
pub mod container;
pub mod envelope;
pub mod insert;
pub mod playlist;

pub use arrangement::{arrangements, Arrangement, Arrangements};
pub use container::{FileFormat, ProjectFile};
pub use envelope::{EnvelopeFlags, EnvelopeLfo, LfoShape};
pub use insert::{Insert, InsertFlags, InsertSlot};
pub use playlist::{ClipSource, Playlist, PlaylistItem};
