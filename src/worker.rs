use log::info;

use crate::capture::session::PacketHandler;
use crate::decoder::parser::SipDecoder;
use crate::decoder::Decoder;
use crate::models::config::AppConfig;
use crate::models::packet::CaptureMetadata;
use crate::outputs::publisher::Publisher;
use crate::outputs::OutputerChoice;
use crate::utils::error::{OutputError, WorkerError};

/// Per-worker counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Packets that produced an event
    pub decoded: u64,

    /// Packets the decoder dropped
    pub filtered: u64,
}

/// Binds a decoder to a publisher; the packet hot path.
///
/// There is no queue between capture and publish: a slow outputer stalls capture.
pub struct Worker<D: Decoder> {
    decoder: D,
    publisher: Publisher,
    stats: WorkerStats,
}

impl Worker<SipDecoder> {
    /// Build the SIP decoder and the outputer selected by the configuration
    pub fn from_config(config: &AppConfig) -> Result<Self, OutputError> {
        let choice = OutputerChoice::select(&config.output);
        let outputer = choice.build()?;
        let decoder = SipDecoder::new(config.interface_addrs.clone());
        Ok(Worker::new(decoder, Publisher::new(outputer)))
    }
}

impl<D: Decoder> Worker<D> {
    pub fn new(decoder: D, publisher: Publisher) -> Self {
        Self { decoder, publisher, stats: WorkerStats::default() }
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Log the counters collected so far
    pub fn log_summary(&self) {
        let stats = self.stats();
        let publisher = self.publisher();
        info!(
            "Worker summary: {} events decoded, {} packets filtered, {} published to {}, {} failed",
            stats.decoded,
            stats.filtered,
            publisher.published(),
            publisher.destination(),
            publisher.failed()
        );
    }
}

impl<D: Decoder> PacketHandler for Worker<D> {
    fn on_packet(&mut self, data: &[u8], metadata: &CaptureMetadata) -> Result<(), WorkerError> {
        match self.decoder.process(data, metadata)? {
            Some(event) => {
                self.stats.decoded += 1;
                self.publisher.publish_event(event);
            }
            None => self.stats.filtered += 1,
        }
        Ok(())
    }
}
