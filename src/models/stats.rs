use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Statistics for a capture run
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CaptureStats {
    /// Total number of packets captured
    pub total_packets: u64,

    /// Total bytes captured
    pub total_bytes: u64,

    /// Packets cut at the snapshot length
    pub truncated_packets: u64,

    /// Completed passes over a replay file
    pub replay_passes: u32,

    /// Capture start time
    pub start_time: Option<DateTime<Utc>>,

    /// Capture end time (if stopped)
    pub end_time: Option<DateTime<Utc>>,
}

impl CaptureStats {
    /// Packet rate over the run (packets per second)
    pub fn packet_rate(&self) -> f64 {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => {
                let elapsed_secs = end.signed_duration_since(start).num_milliseconds() as f64 / 1000.0;
                if elapsed_secs > 0.0 {
                    self.total_packets as f64 / elapsed_secs
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_packet_rate() {
        let start = Utc::now();
        let stats = CaptureStats {
            total_packets: 100,
            start_time: Some(start),
            end_time: Some(start + Duration::seconds(4)),
            ..Default::default()
        };
        assert!((stats.packet_rate() - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_packet_rate_without_end() {
        let stats = CaptureStats { total_packets: 5, start_time: Some(Utc::now()), ..Default::default() };
        assert_eq!(stats.packet_rate(), 0.0);
    }
}
