mod auth;
pub mod client;
pub mod portal;
pub mod types;

pub use client::ApiClient;
pub use portal::{ClaimQuery, PolicyQuery};
pub use types::*;
