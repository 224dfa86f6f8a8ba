//! TensorDock GPU/CPU server rental API client.
//!
//! This crate wraps the TensorDock REST API behind typed operations for
//! listing, deploying, modifying, powering and deleting virtual servers,
//! reading billing details and querying hardware stock.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────┐   ┌───────────┐   ┌────────────┐
//! │  TensorDock  │──►│ Transport │──►│ normalize │──►│ typed      │
//! │  operation   │   │ (reqwest) │   │           │   │ response   │
//! └──────┬───────┘   └───────────┘   └───────────┘   └────────────┘
//!        │ writes
//!        ▼
//!   DeploySpec / ModifySpec ──► FormBody
//! ```
//!
//! The upstream API is inconsistent about how it reports success (booleans,
//! string booleans, implicit HTTP status, HTML error pages with `200`).
//! [`normalize`] folds all of these into a JSON object with a boolean
//! `success` key before anything is decoded.
//!
//! ## Example
//!
//! ```ignore
//! use tensordock::{Config, TensorDock};
//!
//! let client = TensorDock::from_config(&config)?;
//!
//! for server in client.list_servers().await?.servers.values() {
//!     println!("{} {}", server.id, server.status);
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod marshal;
pub mod models;
pub mod normalize;
pub mod transport;

pub use client::TensorDock;
pub use config::{Config, ConfigFile, ConfigOverrides, Credentials};
pub use error::{Result, TensorDockError};
pub use marshal::{DeploySpec, FormBody, InstanceType, ModifySpec};
pub use models::{
    BillingDetails, BillingResponse, Cost, CpuStock, CpuStockResponse, DeployServerResponse,
    DeployedServer, Envelope, GetServerResponse, GpuStock, GpuStockResponse, Link,
    ListServersResponse, ServerRecord, ServerStatusResponse,
};
pub use transport::{ApiRequest, HttpTransport, RawResponse, Transport};
