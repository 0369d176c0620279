pub mod auth;
pub mod permissions;
pub mod refresh;
pub mod session;
