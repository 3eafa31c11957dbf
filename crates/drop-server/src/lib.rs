//! HTTP server for the drop allocation ledger.
//!
//! Hosts one ledger partition per configured campaign and exposes claim,
//! check and pool info endpoints, plus secret-gated reset and resync.
//! Error responses carry only a coarse code; details go to the log.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use auth::AdminSecret;
pub use config::{AllowLists, CampaignConfig, SeedItem, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use handler::{AdminRequest, CheckResponse, ClaimRequest, ClaimResponse, HealthResponse};
pub use server::DropServer;
pub use state::AppState;
