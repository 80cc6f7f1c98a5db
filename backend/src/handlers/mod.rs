pub mod chat;
pub mod commands;
pub mod plugins;

pub use chat::*;
pub use commands::*;
pub use plugins::*;
