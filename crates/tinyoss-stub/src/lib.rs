//! In-memory S3-compatible stub server.
//!
//! Serves just enough of the S3 REST API (bucket and object CRUD, V1 listing,
//! presigned-URL expiry) over real HTTP on a loopback port for the tinyoss
//! client to be exercised end to end without network access.
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use tinyoss_stub::{StubConfig, StubServer};
//!
//! let stub = StubServer::start(StubConfig::default()).await?;
//! println!("S3 endpoint at {}", stub.endpoint());
//! stub.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod router;
pub mod server;
pub mod service;
pub mod state;
pub mod xml;

pub use router::StubOperation;
pub use server::{StubConfig, StubServer};
pub use state::{StoredObject, StubError, StubState};
