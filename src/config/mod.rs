pub mod args;
pub mod resolver;
