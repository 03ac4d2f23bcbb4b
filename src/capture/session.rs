use chrono::Utc;
use log::{info, warn};

use crate::capture::dump::PacketDumper;
use crate::capture::source::{open_source, PacketSource};
use crate::models::config::CaptureConfig;
use crate::models::packet::CaptureMetadata;
use crate::models::stats::CaptureStats;
use crate::utils::error::{CaptureError, WorkerError};

/// Receives every captured packet, synchronously and in arrival order
pub trait PacketHandler {
    fn on_packet(&mut self, data: &[u8], metadata: &CaptureMetadata) -> Result<(), WorkerError>;
}

/// Owns the packet source for the life of the capture
pub struct CaptureSession {
    source: Option<Box<dyn PacketSource>>,
    dumper: Option<PacketDumper>,
    stats: CaptureStats,
}

impl CaptureSession {
    /// Open the configured source, and the dump file if one is configured
    pub fn open(config: &CaptureConfig) -> Result<Self, CaptureError> {
        let source = open_source(config)?;
        let dumper = match &config.dump_file {
            Some(path) => Some(PacketDumper::create(path, source.link_type())?),
            None => None,
        };
        Ok(Self::with_source(source, dumper))
    }

    /// Build a session around an already opened source
    pub fn with_source(source: Box<dyn PacketSource>, dumper: Option<PacketDumper>) -> Self {
        Self { source: Some(source), dumper, stats: CaptureStats::default() }
    }

    /// Deliver every packet to `handler` until the source is exhausted.
    ///
    /// Stops at the first capture fault or handler error.
    pub fn run(&mut self, handler: &mut dyn PacketHandler) -> Result<CaptureStats, CaptureError> {
        let source = self.source.as_mut().ok_or(CaptureError::Released)?;
        info!("Starting capture loop on {}", source.describe());
        self.stats.start_time = Some(Utc::now());

        let result = loop {
            let packet = match source.next_packet() {
                Ok(Some(packet)) => packet,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            };

            self.stats.total_packets += 1;
            self.stats.total_bytes += packet.data.len() as u64;
            if packet.metadata.truncated {
                self.stats.truncated_packets += 1;
            }

            if let Some(dumper) = self.dumper.as_mut() {
                dumper.write(&packet);
            }

            if let Err(e) = handler.on_packet(&packet.data, &packet.metadata) {
                break Err(CaptureError::Handler(e));
            }
        };

        self.stats.end_time = Some(Utc::now());
        self.stats.replay_passes = source.completed_passes();
        info!(
            "Capture loop stopped: {} packets, {} bytes",
            self.stats.total_packets, self.stats.total_bytes
        );

        result.map(|_| self.stats.clone())
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    /// Free the capture handle and flush the dump file. Safe to call repeatedly.
    pub fn release(&mut self) {
        if let Some(source) = self.source.take() {
            info!("Releasing capture source {}", source.describe());
        }
        if let Some(mut dumper) = self.dumper.take() {
            match dumper.flush() {
                Ok(()) => info!("Dumped {} packets to {}", dumper.written(), dumper.path().display()),
                Err(e) => warn!("Failed to flush dump file {}: {}", dumper.path().display(), e),
            }
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.release();
    }
}
