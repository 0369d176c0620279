//! Client-side validation applied to request payloads before they are sent.
//!
//! Field rules live in [`rules`]; payload structs derive
//! [`validator::Validate`] and reference them with `custom(function = ...)`.

pub mod rules;

pub use validator::Validate;
