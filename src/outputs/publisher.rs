use log::warn;

use crate::models::packet::DecodedEvent;
use crate::outputs::Outputer;

/// Sole forwarding entry point, owning the single active outputer.
///
/// Not synchronized: the worker is its only caller.
pub struct Publisher {
    outputer: Box<dyn Outputer>,
    published: u64,
    failed: u64,
}

impl Publisher {
    pub fn new(outputer: Box<dyn Outputer>) -> Self {
        Self { outputer, published: 0, failed: 0 }
    }

    /// Forward one event. Delivery failures are logged, never returned.
    pub fn publish_event(&mut self, event: DecodedEvent) {
        match self.outputer.publish(&event) {
            Ok(()) => self.published += 1,
            Err(e) => {
                self.failed += 1;
                warn!("Failed to publish event to {}: {}", self.outputer.describe(), e);
            }
        }
    }

    /// Events delivered successfully
    pub fn published(&self) -> u64 {
        self.published
    }

    /// Events the outputer rejected
    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn destination(&self) -> String {
        self.outputer.describe()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::utils::error::OutputError;
    use parking_lot::Mutex;
    use std::io;
    use std::sync::Arc;

    /// Outputer recording every event it receives
    #[derive(Clone, Default)]
    pub(crate) struct RecordingOutputer {
        pub(crate) events: Arc<Mutex<Vec<DecodedEvent>>>,
        pub(crate) fail: bool,
    }

    impl Outputer for RecordingOutputer {
        fn publish(&mut self, event: &DecodedEvent) -> Result<(), OutputError> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused").into());
            }
            self.events.lock().push(event.clone());
            Ok(())
        }

        fn describe(&self) -> String {
            "recording".to_string()
        }
    }

    fn event(port: u16) -> DecodedEvent {
        DecodedEvent {
            timestamp: chrono::Utc::now(),
            source_ip: "10.0.0.1".parse().unwrap(),
            destination_ip: "10.0.0.2".parse().unwrap(),
            source_port: port,
            destination_port: 5060,
            transport: crate::models::packet::Transport::Udp,
            payload_type: crate::models::packet::PayloadType::Sip,
            direction: crate::models::packet::Direction::Unknown,
            payload: b"ACK sip:a SIP/2.0".to_vec(),
        }
    }

    #[test]
    fn test_publish_forwards_to_outputer() {
        let outputer = RecordingOutputer::default();
        let mut publisher = Publisher::new(Box::new(outputer.clone()));

        publisher.publish_event(event(1));
        publisher.publish_event(event(2));

        let ports: Vec<u16> = outputer.events.lock().iter().map(|e| e.source_port).collect();
        assert_eq!(ports, vec![1, 2]);
        assert_eq!(publisher.published(), 2);
        assert_eq!(publisher.destination(), "recording");
    }

    #[test]
    fn test_publish_failure_is_counted_not_returned() {
        let outputer = RecordingOutputer { fail: true, ..Default::default() };
        let mut publisher = Publisher::new(Box::new(outputer));

        publisher.publish_event(event(1));

        assert_eq!(publisher.published(), 0);
        assert_eq!(publisher.failed(), 1);
    }
}
