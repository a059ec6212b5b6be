mod client;
mod history_api_http;
mod peer_directory_http;

pub use client::*;
pub use history_api_http::*;
pub use peer_directory_http::*;
