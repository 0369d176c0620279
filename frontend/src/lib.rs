//! Client core of the AutoInsure customer and admin portal: session
//! lifecycle, the authenticated request pipeline, route guards and the
//! typed API surface.

pub mod api;
pub mod app;
pub mod components;
pub mod config;
pub mod error;
pub mod http;
pub mod router;
pub mod state;
pub mod utils;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use app::Portal;
pub use config::PortalConfig;
pub use error::{ApiError, ErrorCode};
