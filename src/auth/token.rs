//! Token secrets and the credential record built from them.

pub mod credential;
pub mod secret;
