mod image;
mod openai;
mod provider;

pub use image::ImageFormat;
pub use openai::{DEFAULT_INSTRUCTION, OpenAIVisionProvider};
pub use provider::VisionProvider;

#[cfg(test)]
pub use provider::MockVisionProvider;
