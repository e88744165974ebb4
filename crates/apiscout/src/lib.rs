//! apiscout — find out which credentials and endpoints an HTTP API really accepts.
//!
//! Two stages: a [`CredentialNegotiator`] walks a ladder of client-credentials
//! variants until one yields a well-formed token, then an
//! [`EndpointMatrixProber`] tries every base URL / path combination with it.
//! Outcomes are classified and reduced into a [`DiscoveryReport`].

pub mod aggregator;
pub mod classifier;
pub mod error;
pub mod negotiator;
pub mod openapi;
pub mod prober;
pub mod transport;
pub mod types;

pub use aggregator::{aggregate, DiscoveryReport, ShapeSummary, SurfaceAggregator, WorkingEndpoint};
pub use classifier::{classify, classify_status, Classification};
pub use error::{AttemptError, NegotiationFailure, ScoutError, ScoutResult};
pub use negotiator::{
    standard_ladder, CredentialNegotiator, Negotiated, NegotiationAttempt, NegotiatorConfig,
    ParameterVariant, Preflight,
};
pub use openapi::ApiDocument;
pub use prober::{targets, EndpointMatrixProber, ProberConfig};
pub use transport::{FailureKind, HttpTransport, Outcome, Transport, TransportRequest};
pub use types::*;
