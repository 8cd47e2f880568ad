pub mod client;
pub mod signature;
pub mod traits;
pub mod url;

pub use client::CloudinaryClient;
pub use traits::ImageHost;
pub use url::{CloudinaryUrl, Transformation};
