//! ICS feed parsing.
//!
//! Rotation feeds are parsed with the icalendar crate's parser and normalized
//! into UTC `Event`s. Text decoding is tolerant: see the `text` module.

mod parse;
mod text;
mod zones;

pub use parse::parse_feed;
pub use text::{decode_feed, repair_mojibake, unescape_text};
