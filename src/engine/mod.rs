mod address;
mod identifier;
mod orchestrator;
mod registry;
mod scopes;
mod traits;
mod verifier;

pub use address::{AddressError, AddressExtractor, ClientAddress};
pub use identifier::IdentifierMatcher;
pub use orchestrator::{
    Decision, DecisionEngine, DecisionSource, EngineSettings, Outcome, SharedComponents,
};
pub use registry::{Provider, ProviderRegistry, RegistryError, DEFAULT_PROVIDERS};
pub use scopes::ScopeRouter;
pub use traits::RequestContext;
pub use verifier::{DomainExtractor, FcrdnsVerifier, Rejection, Verdict};
