//! Response generators.
//!
//! The voice session only sees [`ResponseGenerator`]; this crate supplies the
//! implementations the CLI can wire in: an HTTP answer service and an echo
//! generator for trying the turn-taking loop without a backend.

use std::sync::Arc;

use tracing::info;

use parley_core::config::GeneratorConfig;
use parley_core::error::Result;
use parley_core::ports::ResponseGenerator;

pub mod echo;
pub mod http;

pub use echo::EchoGenerator;
pub use http::HttpResponseGenerator;

/// Pick the generator for a configuration. No `generator` section means echo.
pub fn from_config(config: Option<&GeneratorConfig>) -> Result<Arc<dyn ResponseGenerator>> {
    match config {
        Some(config) => {
            let generator = HttpResponseGenerator::from_config(config)?;
            info!(url = %config.url, "Using HTTP answer service");
            Ok(Arc::new(generator))
        }
        None => {
            info!("No answer service configured, echoing questions");
            Ok(Arc::new(EchoGenerator))
        }
    }
}
