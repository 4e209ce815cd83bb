//! Per-frame scene processing for a forward/deferred renderer: visibility, light
//! accumulation, shadow splits and pipeline-state sorted batches, independent of the
//! native graphics API behind [`renderer::GraphicsDevice`].

pub mod error;
pub mod math;
pub mod renderer;
pub mod scene;
pub mod settings;

pub use error::PipelineError;
pub use settings::{LightingMode, PipelineSettings};

/// Installs `env_logger` at `Info`, overridable through `RUST_LOG`.
pub fn init_logging() {
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}
