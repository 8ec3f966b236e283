//! # Blockgate Server Library
//!
//! A small server speaking the 1.12.2 (protocol 340) game protocol over TCP.
//! It answers server-list pings, logs players in with an offline-mode UUID,
//! places them at the configured spawn point, keeps them alive and relays
//! their chat to everyone else in the game.
//!
//! ## Architecture
//!
//! ### Sessions
//! Each connection owns a [`session::Session`] which tracks its protocol state
//! (Handshake, Status, Login, Play) and turns decoded packets into replies.
//! Sessions never touch sockets; replies are queued on an [`session::Outbox`]
//! that a dedicated writer task drains in order.
//!
//! ### Registry
//! The [`registry::Registry`] holds every live session together with the
//! immutable configuration. It fans chat out to players in `Play`, hands out
//! entity ids and enforces `max_players`.
//!
//! ### Network
//! [`network::Server`] accepts TCP connections, spawns a reader and a writer
//! per socket and runs a 50 ms tick that sends Keep-Alives to idle players.
//! A malformed or oversized frame only ever ends the connection it came from.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::load(None)?;
//!     let server = Server::bind(config).await?;
//!
//!     server
//!         .run_until(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod network;
pub mod registry;
pub mod session;
