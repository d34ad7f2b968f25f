mod config;
mod events;
mod publisher;

pub use config::{AudioProfile, Endpoint, PublishConfig, PublishConfigBuilder, VideoProfile};
pub use events::PublishEvent;
pub use publisher::RtmpPublisher;
