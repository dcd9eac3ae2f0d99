//! HTTP API handlers for tkm-recon
//!
//! A thin transport over the workflow orchestrator: multipart uploads are
//! streamed to disk, JSON bodies map onto workflow calls, bundles stream back.

pub mod download;
pub mod health;
pub mod session_workflow;
pub mod types;

pub use download::download_routes;
pub use health::health_routes;
pub use session_workflow::session_routes;
