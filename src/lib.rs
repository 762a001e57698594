pub use adedel_app as app;
pub use adedel_domain as domain;
pub use adedel_infra as infra;

pub mod cli;
pub mod error;
pub mod logging;
