pub use adedel_app as app;
pub use adedel_domain as domain;

pub mod adapters;
pub mod config;
pub mod dialect;
pub mod export;
pub mod utils;
