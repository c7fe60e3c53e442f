//! HTTP Handlers

mod ping;
mod synthesize;

pub use ping::*;
pub use synthesize::*;
