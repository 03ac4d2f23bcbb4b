pub mod dump;
pub mod interfaces;
pub mod session;
pub mod source;
