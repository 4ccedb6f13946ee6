pub mod stats;
pub mod target;

pub use stats::*;
pub use target::*;
