use chrono::{DateTime, Utc};
use log::{debug, info, trace};
use pcap::{Active, BpfProgram, Capture, Linktype, Offline};
use pnet_datalink::{Channel, DataLinkReceiver};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::config::{CaptureConfig, CaptureMechanism, CaptureSource, LoopCount};
use crate::models::packet::{CapturedPacket, LinkType};
use crate::utils::error::CaptureError;

/// Read timeout for live sources, so a quiet link does not block forever in the kernel
const READ_TIMEOUT_MS: i32 = 1000;

/// Largest frame an AF_PACKET socket read can return
const MAX_FRAME_SIZE: usize = 65536;

/// A packet source yielding packets in arrival order
pub trait PacketSource {
    /// Link layer of the packets this source yields
    fn link_type(&self) -> LinkType;

    /// Next packet, or `None` once the source is exhausted
    fn next_packet(&mut self) -> Result<Option<CapturedPacket>, CaptureError>;

    /// Human readable description for logs
    fn describe(&self) -> String;

    /// Completed passes over a replay file
    fn completed_passes(&self) -> u32 {
        0
    }
}

/// Open the source selected by the configuration
pub fn open_source(config: &CaptureConfig) -> Result<Box<dyn PacketSource>, CaptureError> {
    let source: Box<dyn PacketSource> = match &config.source {
        CaptureSource::ReplayFile(path) => Box::new(ReplaySource::open(path, config)?),
        CaptureSource::Device(device) => match config.mechanism {
            CaptureMechanism::Pcap => Box::new(PcapLiveSource::open(device, config)?),
            CaptureMechanism::AfPacket => Box::new(AfPacketSource::open(device, config)?),
        },
    };
    info!("Opened capture source {} (link type {})", source.describe(), source.link_type().0);
    Ok(source)
}

/// Convert a pcap timestamp
pub fn timestamp_from_timeval(ts: &libc::timeval) -> DateTime<Utc> {
    let micros = (ts.tv_usec as i64).clamp(0, 999_999) as u32;
    DateTime::from_timestamp(ts.tv_sec as i64, micros * 1000).unwrap_or_else(Utc::now)
}

fn captured_from_pcap(packet: &pcap::Packet<'_>, link_type: LinkType) -> CapturedPacket {
    CapturedPacket::new(
        packet.data.to_vec(),
        packet.header.len as usize,
        timestamp_from_timeval(&packet.header.ts),
        link_type,
    )
}

fn as_pcap_int(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Live capture through libpcap
pub struct PcapLiveSource {
    device: String,
    capture: Capture<Active>,
    link_type: LinkType,
}

impl PcapLiveSource {
    pub fn open(device: &str, config: &CaptureConfig) -> Result<Self, CaptureError> {
        info!("Creating pcap capture on device: {}", device);

        let mut capture = Capture::from_device(device)?
            .promisc(true)
            .snaplen(as_pcap_int(config.snaplen))
            .buffer_size(as_pcap_int(config.buffer_size))
            .timeout(READ_TIMEOUT_MS)
            .open()?;

        if let Some(filter) = &config.filter {
            info!("Applying filter: {}", filter);
            capture.filter(filter, true)?;
        }

        let link_type = capture.get_datalink().into();
        Ok(Self { device: device.to_string(), capture, link_type })
    }
}

impl PacketSource for PcapLiveSource {
    fn link_type(&self) -> LinkType {
        self.link_type
    }

    fn next_packet(&mut self) -> Result<Option<CapturedPacket>, CaptureError> {
        loop {
            match self.capture.next_packet() {
                Ok(packet) => return Ok(Some(captured_from_pcap(&packet, self.link_type))),
                Err(pcap::Error::TimeoutExpired) => {
                    trace!("Packet capture timed out, continuing");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn describe(&self) -> String {
        format!("pcap:{}", self.device)
    }
}

/// Live capture on a Linux packet socket.
///
/// Filters are compiled by libpcap and evaluated in user space.
pub struct AfPacketSource {
    device: String,
    rx: Box<dyn DataLinkReceiver>,
    filter: Option<BpfProgram>,
    snaplen: usize,
}

impl AfPacketSource {
    pub fn open(device: &str, config: &CaptureConfig) -> Result<Self, CaptureError> {
        info!("Creating af_packet capture on device: {}", device);

        let interface = pnet_datalink::interfaces()
            .into_iter()
            .find(|iface| iface.name == device)
            .ok_or_else(|| CaptureError::DeviceNotFound(device.to_string()))?;

        let datalink_config = pnet_datalink::Config {
            read_buffer_size: MAX_FRAME_SIZE,
            read_timeout: Some(Duration::from_millis(READ_TIMEOUT_MS as u64)),
            promiscuous: true,
            ..Default::default()
        };

        let rx = match pnet_datalink::channel(&interface, datalink_config)? {
            Channel::Ethernet(_tx, rx) => rx,
            _ => return Err(CaptureError::UnsupportedChannel(device.to_string())),
        };

        let filter = match &config.filter {
            Some(expr) => {
                info!("Compiling filter: {}", expr);
                Some(Capture::dead(Linktype::ETHERNET)?.compile(expr, true)?)
            }
            None => None,
        };

        Ok(Self {
            device: device.to_string(),
            rx,
            filter,
            snaplen: config.snaplen as usize,
        })
    }
}

impl PacketSource for AfPacketSource {
    fn link_type(&self) -> LinkType {
        LinkType::ETHERNET
    }

    fn next_packet(&mut self) -> Result<Option<CapturedPacket>, CaptureError> {
        loop {
            match self.rx.next() {
                Ok(frame) => {
                    if let Some(program) = &self.filter {
                        if !program.filter(frame) {
                            continue;
                        }
                    }
                    let caplen = frame.len().min(self.snaplen);
                    return Ok(Some(CapturedPacket::new(
                        frame[..caplen].to_vec(),
                        frame.len(),
                        Utc::now(),
                        LinkType::ETHERNET,
                    )));
                }
                Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {
                    trace!("Packet socket read timed out, continuing");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn describe(&self) -> String {
        format!("af_packet:{}", self.device)
    }
}

/// Replays a pcap file, optionally looping over it
pub struct ReplaySource {
    path: PathBuf,
    filter: Option<String>,
    loop_count: LoopCount,
    passes: u32,
    pass_packets: u64,
    capture: Option<Capture<Offline>>,
    link_type: LinkType,
}

impl ReplaySource {
    pub fn open(path: &Path, config: &CaptureConfig) -> Result<Self, CaptureError> {
        info!("Reading packets from file: {}", path.display());
        if !path.is_file() {
            return Err(CaptureError::ReplayFile(path.to_path_buf()));
        }

        let capture = Self::open_file(path, config.filter.as_deref())?;
        let link_type = capture.get_datalink().into();

        Ok(Self {
            path: path.to_path_buf(),
            filter: config.filter.clone(),
            loop_count: config.loop_count,
            passes: 0,
            pass_packets: 0,
            capture: Some(capture),
            link_type,
        })
    }

    fn open_file(path: &Path, filter: Option<&str>) -> Result<Capture<Offline>, CaptureError> {
        let mut capture = Capture::from_file(path)?;
        if let Some(filter) = filter {
            capture.filter(filter, true)?;
        }
        Ok(capture)
    }
}

impl PacketSource for ReplaySource {
    fn link_type(&self) -> LinkType {
        self.link_type
    }

    fn next_packet(&mut self) -> Result<Option<CapturedPacket>, CaptureError> {
        loop {
            let capture = match self.capture.as_mut() {
                Some(capture) => capture,
                None => return Ok(None),
            };

            let packet = match capture.next_packet() {
                Ok(packet) => Some(captured_from_pcap(&packet, self.link_type)),
                Err(pcap::Error::NoMorePackets) => None,
                Err(e) => return Err(e.into()),
            };
            if packet.is_some() {
                self.pass_packets += 1;
                return Ok(packet);
            }

            self.passes = self.passes.saturating_add(1);
            let empty_pass = self.pass_packets == 0;
            self.pass_packets = 0;
            if empty_pass {
                info!("Replay pass over {} yielded no packets, stopping", self.path.display());
                self.capture = None;
            } else if self.loop_count.allows_pass(self.passes) {
                debug!("Replay pass {} of {} finished, rewinding", self.passes, self.path.display());
                self.capture = Some(Self::open_file(&self.path, self.filter.as_deref())?);
            } else {
                info!("Replay of {} finished after {} pass(es)", self.path.display(), self.passes);
                self.capture = None;
            }
        }
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn completed_passes(&self) -> u32 {
        self.passes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::dump::PacketDumper;
    use crate::models::config::CaptureMechanism;
    use tempfile::TempDir;

    fn replay_config(path: &Path, loop_count: LoopCount, filter: Option<&str>) -> CaptureConfig {
        CaptureConfig {
            source: CaptureSource::ReplayFile(path.to_path_buf()),
            mechanism: CaptureMechanism::Pcap,
            filter: filter.map(str::to_string),
            snaplen: 65535,
            buffer_size: 1024 * 1024,
            with_vlans: false,
            dump_file: None,
            loop_count,
        }
    }

    fn write_trace(dir: &TempDir, frames: &[Vec<u8>]) -> PathBuf {
        let path = dir.path().join("trace.pcap");
        let mut dumper = PacketDumper::create(&path, LinkType::ETHERNET).expect("dumper");
        for (i, frame) in frames.iter().enumerate() {
            let ts = DateTime::from_timestamp(1_700_000_000 + i as i64, 0).expect("ts");
            dumper.write(&CapturedPacket::new(frame.clone(), frame.len(), ts, LinkType::ETHERNET));
        }
        dumper.flush().expect("flush");
        path
    }

    fn drain(source: &mut dyn PacketSource) -> Vec<CapturedPacket> {
        let mut packets = Vec::new();
        while let Some(packet) = source.next_packet().expect("next") {
            packets.push(packet);
        }
        packets
    }

    #[test]
    fn test_timestamp_from_timeval() {
        let tv = libc::timeval { tv_sec: 1_700_000_000, tv_usec: 250_000 };
        let ts = timestamp_from_timeval(&tv);
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.timestamp_subsec_micros(), 250_000);
    }

    #[test]
    fn test_replay_single_pass_preserves_order() {
        let dir = TempDir::new().expect("tempdir");
        let frames: Vec<Vec<u8>> = (0u8..3).map(|i| vec![i; 60]).collect();
        let path = write_trace(&dir, &frames);

        let mut source = ReplaySource::open(&path, &replay_config(&path, LoopCount::Times(1), None)).expect("open");
        let packets = drain(&mut source);

        assert_eq!(source.link_type(), LinkType::ETHERNET);
        assert_eq!(packets.len(), 3);
        for (packet, frame) in packets.iter().zip(&frames) {
            assert_eq!(&packet.data, frame);
        }
        assert_eq!(packets[1].metadata.timestamp.timestamp(), 1_700_000_001);
        assert_eq!(source.completed_passes(), 1);
    }

    #[test]
    fn test_replay_loops_bounded_times() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_trace(&dir, &[vec![1; 60], vec![2; 60]]);

        let mut source = ReplaySource::open(&path, &replay_config(&path, LoopCount::Times(3), None)).expect("open");
        let packets = drain(&mut source);

        assert_eq!(packets.len(), 6);
        assert_eq!(packets[2].data, vec![1; 60]);
        assert_eq!(source.completed_passes(), 3);
    }

    #[test]
    fn test_replay_missing_file() {
        let path = PathBuf::from("/nonexistent/trace.pcap");
        let err = ReplaySource::open(&path, &replay_config(&path, LoopCount::Times(1), None)).err().expect("error");
        assert!(matches!(err, CaptureError::ReplayFile(_)));
    }

    #[test]
    fn test_replay_invalid_filter_fails() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_trace(&dir, &[vec![1; 60]]);
        let result = ReplaySource::open(&path, &replay_config(&path, LoopCount::Times(1), Some("not a ( filter")));
        assert!(matches!(result, Err(CaptureError::PcapError(_))));
    }

    #[test]
    fn test_endless_replay_of_empty_file_stops() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_trace(&dir, &[]);

        let mut source = ReplaySource::open(&path, &replay_config(&path, LoopCount::Forever, None)).expect("open");

        assert!(drain(&mut source).is_empty());
        assert_eq!(source.completed_passes(), 1);
    }

    #[test]
    fn test_endless_replay_stops_when_filter_matches_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_trace(&dir, &[vec![1; 60], vec![2; 60]]);

        let config = replay_config(&path, LoopCount::Forever, Some("udp port 5060"));
        let mut source = ReplaySource::open(&path, &config).expect("open");

        assert!(drain(&mut source).is_empty());
        assert_eq!(source.completed_passes(), 1);
    }
}
