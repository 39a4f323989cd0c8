//! Common types, envelope protocol definitions, and the error taxonomy shared
//! across the gateway crates.

pub mod error;
pub mod protocol;

pub use error::{ErrorKind, ErrorLike};
pub use protocol::{ErrorDescriptor, Token};
