//! Protocol pieces shared by the broker service and its clients.

pub mod exchange;
pub mod pkce;
pub mod token;

pub use exchange::{ExchangeError, ExchangeRequest, GrantKind, TokenExchangeService};
pub use token::{TokenResponse, TokenSet};
