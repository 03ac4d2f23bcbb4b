pub mod error;
pub mod fatal;
pub mod logging;
pub mod rotation;
