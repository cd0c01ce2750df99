//! Application state.

use mconv_media::{Converter, EncoderConfig};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub converter: Converter,
}

impl AppState {
    /// Create new application state.
    pub fn new(config: ApiConfig, encoder: EncoderConfig) -> Self {
        Self {
            config,
            converter: Converter::new(encoder),
        }
    }
}
