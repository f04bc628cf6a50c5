//! Per-user OAuth token lifecycle: persistence behind an object-store
//! contract, identity resolution from bearer tokens, and the token-endpoint
//! client used for grant exchange and refresh.

pub mod fs;
pub mod oauth;
pub mod profile;
pub mod store;
pub mod token;

pub use fs::FsObjectStore;
pub use oauth::{AuthError, OAuthClient, OAuthConfig, DEFAULT_TOKEN_URL};
pub use profile::{ProfileUserIdResolver, ResolveError, UserIdResolver, DEFAULT_PROFILE_URL};
pub use store::{ObjectStore, ObjectTokenStore, StoreError, TokenStore};
pub use token::OAuthToken;
