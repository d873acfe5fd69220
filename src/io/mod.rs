//! Input/output helpers.
//!
//! - payload parsing into raw tables (`ingest`)
//! - date/numeric schema normalization (`normalize`)
//! - xlsx serialization of results (`export`)
//! - remote file download (`fetch`)

pub mod export;
pub mod fetch;
pub mod ingest;
pub mod normalize;

pub use export::*;
pub use fetch::*;
pub use ingest::*;
pub use normalize::*;
