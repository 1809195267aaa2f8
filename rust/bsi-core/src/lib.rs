//! Bit-sliced index (BSI): integer values attached to 64-bit identifiers,
//! stored as one compressed identifier set per bit position.
//!
//! Range and equality predicates, sums, extrema and value histograms are all
//! answered by set algebra over the planes, without decoding values one by
//! one. Work over large identifier sets fans out to the rayon thread pool,
//! either one task per plane or one task per batch of identifiers.
//!
//! The compressed set is [`RoaringTreemap`], re-exported for convenience.
//!
//! # Concurrency
//!
//! Read-only operations take `&self` and may run from several threads at
//! once. Mutating operations take `&mut self`; sharing an index between a
//! writer and readers needs external synchronization.

mod aggregate;
pub mod bsi;
mod codec;
pub mod compare;
pub mod config;
mod executor;
mod merge;
mod scratch;
mod transpose;

#[cfg(test)]
mod tests;

pub use bsi::Bsi;
pub use compare::Operation;
pub use config::BsiConfig;
pub use roaring::RoaringTreemap;
