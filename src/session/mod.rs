mod media;
mod negotiation;
mod state;

pub use media::*;
pub use negotiation::*;
pub use state::*;
