use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::interface::InterfaceAddressSet;

/// Immutable application configuration, built once by the config resolver
/// and passed by reference to every component that needs it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Packet source and capture settings
    pub capture: CaptureConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Output backend settings
    pub output: OutputConfig,

    /// Addresses bound to the capture device (live capture only)
    pub interface_addrs: Option<InterfaceAddressSet>,
}

/// Where packets come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureSource {
    /// Live network device
    Device(String),

    /// Stored packet trace read back as if arriving live
    ReplayFile(PathBuf),
}

/// How a live device is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureMechanism {
    /// Linux packet socket, bypassing libpcap
    AfPacket,

    /// libpcap
    Pcap,
}

impl CaptureMechanism {
    /// Parse the `-t` option value
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "af_packet" | "afpacket" => Some(Self::AfPacket),
            "pcap" => Some(Self::Pcap),
            _ => None,
        }
    }
}

/// How many times a replay file is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopCount {
    /// Read the file this many times (at least once)
    Times(u32),

    /// Read the file until the process is stopped
    Forever,
}

impl LoopCount {
    /// Map the `--lp` option: 0 and 1 mean a single pass, negative means forever
    pub fn from_option(value: i64) -> Self {
        if value < 0 {
            Self::Forever
        } else {
            Self::Times(value.clamp(1, u32::MAX as i64) as u32)
        }
    }

    /// Whether another pass is allowed after `completed` passes
    pub fn allows_pass(&self, completed: u32) -> bool {
        match self {
            Self::Forever => true,
            Self::Times(n) => completed < *n,
        }
    }
}

/// Capture configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Device or replay file
    pub source: CaptureSource,

    /// Mechanism used for live devices
    pub mechanism: CaptureMechanism,

    /// BPF filter expression, already expanded for VLAN traffic
    pub filter: Option<String>,

    /// Snapshot length in bytes
    pub snaplen: u32,

    /// Kernel buffer size in bytes
    pub buffer_size: u32,

    /// Whether VLAN tagged traffic is included
    pub with_vlans: bool,

    /// Optional pcap file every captured packet is copied to
    pub dump_file: Option<PathBuf>,

    /// Replay loop count
    pub loop_count: LoopCount,
}

/// Size based log rotation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRotationPolicy {
    /// Directory holding the log files
    pub path: PathBuf,

    /// Active log file name
    pub name: String,

    /// Rotate once the active file would exceed this many bytes
    pub rotate_every_bytes: u64,

    /// Number of rotated files retained
    pub keep_files: usize,
}

impl LogRotationPolicy {
    /// Full path of the active log file
    pub fn active_file(&self) -> PathBuf {
        self.path.join(&self.name)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level name as given on the command line
    pub level: String,

    /// File sink; console only when absent
    pub rotation: Option<LogRotationPolicy>,
}

/// Output backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Collector host:port; empty selects the file sink
    pub collector_address: String,

    /// HEP capture agent id
    pub node_id: u32,

    /// File used by the file sink
    pub event_file: PathBuf,
}
