pub mod guard;
pub mod toast;
