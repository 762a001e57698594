pub mod generator_config;
pub mod project_root;

pub use generator_config::{CONFIG_FILE_NAME, ConfigError, GeneratorConfig};
