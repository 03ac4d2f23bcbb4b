pub mod parser;

use crate::models::packet::{CaptureMetadata, DecodedEvent};
use crate::utils::error::DecodeError;

/// Turns raw captured bytes into signaling events.
///
/// `Ok(None)` means the packet is irrelevant and is dropped silently.
pub trait Decoder {
    fn process(&mut self, data: &[u8], metadata: &CaptureMetadata) -> Result<Option<DecodedEvent>, DecodeError>;
}
