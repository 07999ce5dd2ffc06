use async_trait::async_trait;

use crate::error::OutfitResult;

/// Multimodal completion: an image plus an instruction in, free text out.
///
/// The text is not guaranteed to contain JSON even when asked for it; the
/// caller runs it through [`crate::extraction::parse_products`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VisionProvider: Send + Sync {
    async fn extract(&self, image: &[u8], instruction: &str) -> OutfitResult<String>;
}
