//! Request pipeline stages.
//!
//! Per request: the fault boundary decodes parameters, [`token::extract`]
//! reads the authorization header, zero or more route layers
//! ([`token::require`], [`mandatory::enforce`]) check the request, then the
//! handler answers through [`envelope`]. Any stage may halt with an
//! [`ApiError`], which [`resolver::ErrorResolver`] renders as a failure envelope.
//!
//! # Module invariants
//!
//! - Stages only read and write the request's extensions; no shared state.
//! - Every response, success or failure, is an envelope with `success` and `nonce`.

pub mod context;
pub mod envelope;
pub mod mandatory;
pub mod resolver;
pub mod token;

pub use context::{ApiContext, RequestParams, ResponseMeta, Target};
pub use mandatory::{Mandatory, ValidationSpec};
pub use resolver::{ApiError, ErrorResolver};
