pub mod codec;
pub mod config;
pub mod errors;
pub mod imageops_ai;
pub mod model;
pub mod overlay;
pub mod pipeline;
pub mod postprocess;
pub mod preprocess;
pub mod server;
pub mod tracing_config;
pub mod traits;

pub mod mocks;

pub use config::Config;
pub use errors::{Result, SegError};
pub use model::OnnxModel;
pub use pipeline::{SegmentationContext, Segmented};
pub use server::router;
pub use traits::*;
