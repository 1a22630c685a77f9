//! OAuth2 Authorization-Code + PKCE login with a stateless token exchange
//! broker.
//!
//! [`routes`] and [`oauth::exchange`] form the server that holds the client
//! secret; [`client`] is the browser-side flow that talks to it.

pub mod client;
pub mod config;
pub mod error;
pub mod oauth;
pub mod routes;

pub use error::AuthError;
