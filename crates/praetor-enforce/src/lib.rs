//! Praetor enforcement layer
//!
//! Wraps a [`praetor_policy::PolicyDecisionPoint`] with the two collaborators
//! around it: an information point that turns a [`Request`] into a context,
//! and an enforcement point that answers yes/no and runs triggered
//! obligations and advice.

pub mod enforcement;
pub mod error;
pub mod information;
pub mod request;

pub use enforcement::PolicyEnforcementPoint;
pub use error::{EnforcementError, EnforcementResult};
pub use information::{
    AttributeResolver, ContextDefinition, InformationPoint, PolicyInformationPoint, RequestContext,
};
pub use request::Request;
