//! Text preparation: cleaning, segmentation, and chunk joining.
//!
//! Everything in this module is pure and deterministic. The pipeline runs
//! [`clean_for_speech`] → [`split_text`] → [`join_short_chunks`]; the empty
//! string acts as a paragraph-break sentinel between segments and is never
//! sent to the synthesis server.

mod clean;
mod join;
mod segment;

pub use clean::clean_for_speech;
pub use join::join_short_chunks;
pub use segment::split_text;
