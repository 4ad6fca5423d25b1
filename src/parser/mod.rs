//! Parsers for annotation, chain and sequence size files.

pub mod gxf;
pub mod sizes;
pub mod util;

pub use gxf::GxfReader;
pub use sizes::GenomeSizes;
