//! Rich presence IPC client.
//!
//! Connects to the local presence socket, performs the handshake, and
//! exchanges commands with the peer application.
//!
//! ```rust,no_run
//! use richpresence_client::RpcClient;
//! use richpresence_core::ActivityBuilder;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = RpcClient::new("123456789012345678");
//! let ready = client.login().await?;
//! println!("connected as {:?}", ready.user.map(|u| u.username));
//!
//! let activity = ActivityBuilder::new().details("Compiling")?.build()?;
//! client.set_activity(activity).await?;
//! client.destroy().await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod connector;
pub mod correlator;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod keepalive;
pub mod state;
pub mod subscription;

#[cfg(test)]
mod testing;

pub use auth::{AuthorizeOptions, TokenExchange};
pub use client::RpcClient;
pub use config::ClientConfig;
pub use connector::{ConnectedEndpoint, Connector, EndpointOpener, SystemOpener};
pub use error::{ClientError, ClientResult};
pub use state::{ConnectionState, Transition};
pub use subscription::{Subscription, SubscriptionId};
