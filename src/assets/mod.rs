//! Static asset delivery.
//!
//! # Design Decisions
//! - Assets come from one directory; nothing outside it is reachable
//! - Successful responses are cacheable for a year, errors are not
//! - Content type follows the normalized path, so `/` and `/index.html` agree

pub mod content_type;
pub mod resolver;

pub use content_type::content_type_for;
pub use resolver::{AssetError, StaticAssets};
