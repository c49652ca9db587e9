// src/source/mod.rs
pub mod hn;
pub mod types;

pub use hn::HnClient;
pub use types::{Item, ItemKind, ItemSource, MalformedItem, UserSummary, MAX_ID_UNKNOWN};
