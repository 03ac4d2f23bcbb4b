pub mod config;
pub mod interface;
pub mod packet;
pub mod stats;
