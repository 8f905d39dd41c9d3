//! Auth-domain models: redacted secrets, the cached credential store, and SASL encoding.

pub mod credential;
pub mod sasl;
pub mod secret;

pub use credential::*;
pub use sasl::*;
pub use secret::*;
