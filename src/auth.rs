//! Auth-domain identifiers, identity snapshots, and credential models.

pub mod id;
pub mod token;
pub mod user;

pub use id::*;
pub use token::{credential::*, secret::*};
pub use user::*;
