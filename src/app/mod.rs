pub use adedel_domain as domain;

pub mod classifier;
pub mod generator;
pub mod introspector;
pub mod naming;
pub mod ports;
pub mod registry;
pub mod script;
#[cfg(any(test, feature = "test-support"))]
pub mod simulator;
pub mod synthesizer;
