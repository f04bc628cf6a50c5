//! Smart home skill toolkit: the directive/response wire contract,
//! namespace-based routing, response envelope builders, and the stock
//! handlers shared by the synchronous entry point and the deferred consumer.

pub mod handler;
pub mod handlers;
pub mod response;
pub mod router;
pub mod trace;
pub mod types;

pub use handler::{DirectiveHandler, SkillError};
pub use handlers::{
    AuthorizationHandler, DeferredRelayHandler, PercentageControllerHandler,
    PowerControllerHandler, Relayer, SceneControllerHandler, StaticDiscoveryHandler,
};
pub use response::{MessageIdSource, ResponseBuilder};
pub use router::{EndpointRouter, NamespaceRouter};
pub use trace::TracedHandler;
pub use types::{Request, Response};
