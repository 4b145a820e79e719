pub mod config;
pub mod error;
pub mod models;
pub mod signer;
pub mod utils;

pub use self::config::*;
pub use error::*;
pub use models::session::{Credential, Principal, SessionClaims};
pub use signer::*;
pub use utils::*;
