pub mod common;
pub mod generated;
pub mod prompt;
pub mod upload;

pub use common::*;
pub use generated::*;
pub use prompt::*;
pub use upload::*;
