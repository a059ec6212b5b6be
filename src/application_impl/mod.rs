mod history_api_fake;
mod peer_directory_fake;
mod realtime_channel_fake;

pub use history_api_fake::*;
pub use peer_directory_fake::*;
pub use realtime_channel_fake::*;
