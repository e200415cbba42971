//! Image decode, resize and cache
//!
//! Textures go through a [`TextureCodec`]; loose PNG/JPEG entries go through
//! the `image` crate. Both end up scaled by [`fit_to_edge`].

pub mod cache;
pub mod codec;
pub mod resize;

pub use cache::{CacheKey, ThumbnailCache, format_file_size};
pub use codec::{BlockTextureCodec, TextureCodec, decode_image, encode_png};
pub use resize::{fit_to_edge, fitted_size};
