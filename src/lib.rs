pub mod advisor;
pub mod aggregate;
pub mod display;
pub mod error;
pub mod export;
pub mod feed;
pub mod logging;
pub mod model;
pub mod phase;
pub mod pipeline;
pub mod state;
