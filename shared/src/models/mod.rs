pub mod api;
pub mod capability;
pub mod command;
pub mod result;

pub use api::*;
pub use capability::*;
pub use command::*;
pub use result::*;
