mod history_api;
mod peer_directory;
mod realtime_channel;

pub use history_api::*;
pub use peer_directory::*;
pub use realtime_channel::*;
