#![forbid(unsafe_code)]

mod counters;
mod locks;
mod queue;
mod records;
mod sandbox;

pub use counters::*;
pub use locks::*;
pub use queue::*;
pub use records::*;
pub use sandbox::*;
