mod buffer;
mod error;
mod crypto;
mod time;

pub use buffer::*;
pub use error::*;
pub use crypto::*;
pub use time::*;
