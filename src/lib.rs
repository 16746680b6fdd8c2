pub mod config;
pub mod dto;
pub mod error;
pub mod interpret;
pub mod model;
pub mod preprocess;
pub mod routes;
pub mod taxonomy;

pub use config::{AppConfig, LoadPolicy, NormalizationScheme};
pub use error::{ApiError, LoadError};
pub use model::{LifecycleManager, ModelHandle};
pub use routes::{AppState, configure_routes};
pub use taxonomy::DiseaseTaxonomy;
