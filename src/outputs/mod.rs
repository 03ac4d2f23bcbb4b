pub mod file;
pub mod hep;
pub mod publisher;

use log::info;
use std::path::PathBuf;

use crate::models::config::OutputConfig;
use crate::models::packet::DecodedEvent;
use crate::outputs::file::FileOutputer;
use crate::outputs::hep::HepOutputer;
use crate::utils::error::OutputError;

/// Delivers one event to its destination
pub trait Outputer {
    fn publish(&mut self, event: &DecodedEvent) -> Result<(), OutputError>;

    /// Destination description for logs
    fn describe(&self) -> String;
}

/// The output backend, fixed for the life of the process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputerChoice {
    /// Forward to a HEP collector at host:port
    Network { address: String, node_id: u32 },

    /// Append to a local file
    File { path: PathBuf },
}

impl OutputerChoice {
    /// A non-empty collector address selects the network sink, anything else the file sink
    pub fn select(config: &OutputConfig) -> Self {
        if config.collector_address.is_empty() {
            OutputerChoice::File { path: config.event_file.clone() }
        } else {
            OutputerChoice::Network {
                address: config.collector_address.clone(),
                node_id: config.node_id,
            }
        }
    }

    /// Construct the chosen outputer
    pub fn build(&self) -> Result<Box<dyn Outputer>, OutputError> {
        let outputer: Box<dyn Outputer> = match self {
            OutputerChoice::Network { address, node_id } => Box::new(HepOutputer::connect(address, *node_id)?),
            OutputerChoice::File { path } => Box::new(FileOutputer::create(path)?),
        };
        info!("Publishing events to {}", outputer.describe());
        Ok(outputer)
    }
}
