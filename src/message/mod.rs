mod queue;
mod types;

pub use queue::*;
pub use types::*;
