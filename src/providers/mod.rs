//! Image generation providers
//!
//! ```text
//!   ┌──────────────────────┐
//!   │ ImageProvider trait  │
//!   └──────────┬───────────┘
//!              │
//!        ┌─────┴─────┐
//!        │  Imagen   │
//!        └───────────┘
//! ```

pub mod http_client;
pub mod imagen;
pub mod traits;

// Re-export commonly used types
pub use http_client::RateLimitedClient;
pub use imagen::ImagenProvider;
pub use traits::{
    GeneratedImage, ImageProvider, ImageRequest, ImageSize, ImageStyle, ProviderError,
    ProviderResult,
};
