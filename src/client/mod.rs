//! Client-side half of the login flow: initiating authorization, handling the
//! redirect callback, and consuming the resulting tokens.

pub mod broker;
pub mod callback;
pub mod login;
pub mod resource;
pub mod session;
pub mod storage;

pub use broker::{BrokerClient, TokenExchanger};
pub use callback::{CallbackHandler, CallbackOutcome, Navigation, FAILURE_REDIRECT_DELAY};
pub use login::{AuthorizationInitiator, ClientConfig};
pub use resource::AuthorizedClient;
pub use session::{AttemptStore, Session, TokenStore};
pub use storage::{KeyValueStore, MemoryStorage};
