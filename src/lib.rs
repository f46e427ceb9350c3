//! A TCP server that shepherds remote robot clients to the origin of a
//! 2-D grid.
//!
//! Every connection runs the same three-phase exchange: a challenge-response
//! authentication against a shared key table, guided navigation to `(0,0)`
//! around obstacles the server discovers as the robot bumps into them, and a
//! final secret-message pickup. The robot is a dumb actor that only moves,
//! turns, and reports its coordinates; all planning state lives here.
//!
//! Records on the wire are ASCII payloads terminated by the two-byte
//! sentinel `0x07 0x08` and may be interrupted at any point by a
//! `RECHARGING` / `FULL POWER` pause that the transport layer absorbs
//! transparently.
//!
//! # Example
//! This example runs a server with the default configuration (the five
//! reference key pairs, recharging support, the simple axis-by-axis
//! planner) on `localhost:9999`.
//!
//! ```no_run
//! # async fn example() -> roverd::ServerResult<()> {
//! use roverd::Server;
//!
//! Server::builder().build().run().await?;
//! # Ok(())
//! # }
//! ```
//! # Example
//! This example picks the extended bundle, which swaps the axis-by-axis
//! planner for the BFS path planner.
//!
//! ```no_run
//! # async fn example() -> roverd::ServerResult<()> {
//! use roverd::{Bundle, Server, ServerConfig};
//!
//! let config = ServerConfig { port: 2099, ..ServerConfig::default() };
//! Server::builder()
//!     .with_config(config)
//!     .with_bundle(Bundle::extended())
//!     .build()
//!     .run()
//!     .await?;
//! # Ok(())
//! # }
//! ```
use thiserror::Error;

pub mod builder;
pub mod codec;
pub mod config;
pub mod grid;
pub mod server;
pub mod session;
pub mod transport;
pub use builder::{Bundle, ServerBuilder};
pub use config::{KeysPair, Planner, ServerConfig};
pub use server::Server;

/// Errors raised while serving a robot connection.
///
/// The first four kinds have a fixed wire reply that the session controller
/// sends before closing; `Timeout` and `Io` close the connection silently.
/// `NumberFormat` never reaches the wire as-is: the authenticator re-maps it
/// to `KeyOutOfRange` or `LoginFailed` depending on which record carried the
/// bad number.
#[derive(Error, Debug)]
pub enum Error {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("logic error: {0}")]
    Logic(String),
    #[error("login failed: {0}")]
    LoginFailed(String),
    #[error("key id out of range: {0}")]
    KeyOutOfRange(String),
    #[error("bad number format: {0}")]
    NumberFormat(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type ServerResult<T> = std::result::Result<T, Error>;
