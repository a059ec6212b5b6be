mod realtime_channel_ws;

pub use realtime_channel_ws::*;
