use crate::models::UploadResult;
use async_trait::async_trait;
use std::path::Path;

/// A remote store that turns a local image file into a public URL.
///
/// Implementations never fail outward: every problem is reported through the
/// `Err` side of [`UploadResult`].
#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, path: &Path) -> UploadResult;

    fn name(&self) -> &str;
}
