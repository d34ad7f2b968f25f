mod audio;
mod metadata;
mod nal;
mod timestamp;
mod video;

pub use audio::*;
pub use metadata::*;
pub use nal::*;
pub use timestamp::*;
pub use video::*;
