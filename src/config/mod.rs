mod schema;

pub use schema::{Config, ModelConfig, ReliabilityConfig};
