pub mod adapters;
pub mod prelude;

pub use stakeidx_core as core;
