//! Token material: the redacting secret wrapper and the credential pair it forms.

pub mod credential;
pub mod secret;

pub use credential::*;
pub use secret::*;
