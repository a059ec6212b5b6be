mod chat_session;
mod log;

pub use chat_session::*;
pub use log::*;
