use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while turning command line options into an `AppConfig`
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Neither a device nor a replay file was given
    #[error("no interface specified")]
    NoCaptureSource,

    /// Interface address lookup failed for the configured device
    #[error("error while looking up interface address: {0}")]
    AddressLookup(#[from] AddressLookupError),

    /// Capture type other than `af_packet` or `pcap`
    #[error("unknown capture type '{0}', expected af_packet or pcap")]
    UnknownCaptureType(String),

    /// A numeric option outside its valid range
    #[error("invalid value for {option}: {value}")]
    InvalidValue { option: &'static str, value: String },
}

/// Errors from resolving the addresses bound to a device
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressLookupError {
    /// No interface with that name exists
    #[error("no such interface: {0}")]
    NoSuchInterface(String),

    /// The interface exists but has no addresses bound
    #[error("interface {0} has no addresses")]
    NoAddresses(String),
}

/// Decode failure reported by a `Decoder`.
///
/// Any decode error is fatal to the process, see `WorkerError::Decode`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Link layer the decoder cannot interpret
    #[error("unsupported link type {0}")]
    UnsupportedLinkType(i32),

    /// Frame that cannot belong to the declared link type
    #[error("corrupted frame: {0}")]
    Corrupted(String),
}

/// Errors from an `Outputer`
#[derive(Error, Debug)]
pub enum OutputError {
    /// Collector address could not be resolved
    #[error("invalid collector address '{0}'")]
    InvalidAddress(String),

    /// Error from I/O operations
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from JSON serialization
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Encoded event does not fit in one HEP frame
    #[error("event too large for HEP frame: {0} bytes")]
    FrameTooLarge(usize),
}

/// Errors surfaced by the packet handler
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Decoder failure. Policy: abort the process.
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
}

/// Errors from the capture layer
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Error from pcap library
    #[error("PCAP error: {0}")]
    PcapError(#[from] pcap::Error),

    /// Error from I/O operations
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The live device could not be found
    #[error("capture device not found: {0}")]
    DeviceNotFound(String),

    /// The datalink channel is not an ethernet channel
    #[error("unsupported channel type on {0}")]
    UnsupportedChannel(String),

    /// Replay file missing or unreadable
    #[error("cannot read replay file {0}")]
    ReplayFile(PathBuf),

    /// The session was released before it was run
    #[error("capture session already released")]
    Released,

    /// The packet handler reported a fatal condition
    #[error("packet handler failed: {0}")]
    Handler(#[from] WorkerError),
}

/// Errors while setting up logging
#[derive(Error, Debug)]
pub enum LoggingError {
    /// Log directory or file could not be created
    #[error("cannot open log file {path}: {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A global logger was already installed
    #[error("logger already initialized")]
    AlreadyInitialized,
}
