use std::path::PathBuf;

use crate::capture::interfaces::{AddressLookup, ANY_DEVICE};
use crate::config::args::Args;
use crate::models::config::{
    AppConfig, CaptureConfig, CaptureMechanism, CaptureSource, LogRotationPolicy, LoggingConfig,
    LoopCount, OutputConfig,
};
use crate::utils::error::ConfigError;

/// File written by the file sink when no collector is configured
pub const DEFAULT_EVENT_FILE: &str = "heplify-events.json";

/// Outcome of normalizing the command line.
///
/// Warnings are collected instead of logged because the logger is only
/// initialized from the normalized configuration.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub config: AppConfig,
    pub warnings: Vec<String>,
}

/// Validates and normalizes raw options into one immutable `AppConfig`.
///
/// Runs in two steps so the logger can be initialized in between:
/// `normalize` needs no system access, `resolve_addresses` snapshots the
/// device's addresses.
pub struct ConfigResolver<'a> {
    lookup: &'a dyn AddressLookup,
}

impl<'a> ConfigResolver<'a> {
    pub fn new(lookup: &'a dyn AddressLookup) -> Self {
        Self { lookup }
    }

    /// Validate `args` into a configuration without interface addresses
    pub fn normalize(&self, args: &Args) -> Result<Resolution, ConfigError> {
        let mut warnings = Vec::new();

        let source = match (args.device.is_empty(), args.read_file.is_empty()) {
            (true, true) => return Err(ConfigError::NoCaptureSource),
            (_, false) => {
                if !args.device.is_empty() && args.device != ANY_DEVICE {
                    warnings.push(format!(
                        "both device '{}' and replay file given, reading from {}",
                        args.device, args.read_file
                    ));
                }
                CaptureSource::ReplayFile(PathBuf::from(&args.read_file))
            }
            (false, true) => CaptureSource::Device(args.device.clone()),
        };

        let mut mechanism = CaptureMechanism::parse(&args.capture_type)
            .ok_or_else(|| ConfigError::UnknownCaptureType(args.capture_type.clone()))?;

        if source == CaptureSource::Device(ANY_DEVICE.to_string()) && mechanism == CaptureMechanism::AfPacket {
            warnings.push("af_packet cannot bind to 'any', capturing with pcap".to_string());
            mechanism = CaptureMechanism::Pcap;
        }

        let snaplen = positive_u32("snaplen", args.snaplen)?;
        let buffer_mb = positive_u32("buffer size", args.buffer_size_mb)?;
        let buffer_size = buffer_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| invalid("buffer size", args.buffer_size_mb))?;

        let capture = CaptureConfig {
            source,
            mechanism,
            filter: effective_filter(&args.filter, args.with_vlans),
            snaplen,
            buffer_size,
            with_vlans: args.with_vlans,
            dump_file: non_empty(&args.dump_file).map(PathBuf::from),
            loop_count: LoopCount::from_option(args.loop_count),
        };

        let rotation = non_empty(&args.log_path).map(|path| LogRotationPolicy {
            path: PathBuf::from(path),
            name: args.log_name.clone(),
            rotate_every_bytes: args.rotate_kb.saturating_mul(1024),
            keep_files: args.keep_files,
        });

        let output = OutputConfig {
            collector_address: if args.use_hep { args.hep_server.trim().to_string() } else { String::new() },
            node_id: args.hep_node_id,
            event_file: PathBuf::from(DEFAULT_EVENT_FILE),
        };

        Ok(Resolution {
            config: AppConfig {
                capture,
                logging: LoggingConfig { level: args.log_level.clone(), rotation },
                output,
                interface_addrs: None,
            },
            warnings,
        })
    }

    /// Snapshot the capture device's addresses; replay mode needs none
    pub fn resolve_addresses(&self, mut config: AppConfig) -> Result<AppConfig, ConfigError> {
        config.interface_addrs = match &config.capture.source {
            CaptureSource::Device(device) => Some(self.lookup.lookup(device)?),
            CaptureSource::ReplayFile(_) => None,
        };
        Ok(config)
    }
}

/// Expand a filter so it also matches the same traffic inside VLAN tags
pub fn effective_filter(filter: &str, with_vlans: bool) -> Option<String> {
    let filter = filter.trim();
    if filter.is_empty() {
        return None;
    }
    if with_vlans {
        Some(format!("({filter}) or (vlan and ({filter}))"))
    } else {
        Some(filter.to_string())
    }
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() { None } else { Some(value) }
}

fn positive_u32(option: &'static str, value: i64) -> Result<u32, ConfigError> {
    if value <= 0 || value > u32::MAX as i64 {
        return Err(invalid(option, value));
    }
    Ok(value as u32)
}

fn invalid(option: &'static str, value: i64) -> ConfigError {
    ConfigError::InvalidValue { option, value: value.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::interface::InterfaceAddressSet;
    use crate::utils::error::AddressLookupError;
    use clap::Parser;

    struct FakeLookup;

    impl AddressLookup for FakeLookup {
        fn lookup(&self, device: &str) -> Result<InterfaceAddressSet, AddressLookupError> {
            match device {
                "eth0" => Ok(InterfaceAddressSet::new("eth0", ["10.0.0.1", "10.0.0.2"])),
                "any" => Ok(InterfaceAddressSet::new("any", ["127.0.0.1", "10.0.0.1"])),
                other => Err(AddressLookupError::NoSuchInterface(other.to_string())),
            }
        }
    }

    fn resolve(argv: &[&str]) -> Result<Resolution, ConfigError> {
        let mut full = vec!["heplify"];
        full.extend_from_slice(argv);
        let resolver = ConfigResolver::new(&FakeLookup);
        let Resolution { config, warnings } = resolver.normalize(&Args::parse_from(full))?;
        Ok(Resolution { config: resolver.resolve_addresses(config)?, warnings })
    }

    #[test]
    fn test_device_mode_resolves_addresses() {
        let res = resolve(&["-i", "eth0"]).expect("resolve");
        assert_eq!(res.config.capture.source, CaptureSource::Device("eth0".to_string()));
        let addrs = res.config.interface_addrs.expect("addresses");
        assert!(addrs.contains("10.0.0.1"));
        assert!(addrs.contains("10.0.0.2"));
        assert!(res.warnings.is_empty());
    }

    #[test]
    fn test_replay_mode_skips_address_lookup() {
        let res = resolve(&["-i", "", "--rf", "trace.pcap"]).expect("resolve");
        assert_eq!(res.config.capture.source, CaptureSource::ReplayFile(PathBuf::from("trace.pcap")));
        assert!(res.config.interface_addrs.is_none());
    }

    #[test]
    fn test_missing_source_is_usage_error() {
        let err = resolve(&["-i", ""]).unwrap_err();
        assert!(matches!(err, ConfigError::NoCaptureSource));
    }

    #[test]
    fn test_both_sources_prefers_replay_file() {
        let res = resolve(&["-i", "eth0", "--rf", "trace.pcap"]).expect("resolve");
        assert_eq!(res.config.capture.source, CaptureSource::ReplayFile(PathBuf::from("trace.pcap")));
        assert_eq!(res.warnings.len(), 1);
    }

    #[test]
    fn test_unknown_device_fails_lookup() {
        let err = resolve(&["-i", "eth9"]).unwrap_err();
        assert!(matches!(err, ConfigError::AddressLookup(AddressLookupError::NoSuchInterface(_))));
    }

    #[test]
    fn test_any_device_switches_to_pcap() {
        let res = resolve(&[]).expect("resolve");
        assert_eq!(res.config.capture.mechanism, CaptureMechanism::Pcap);
        assert_eq!(res.warnings.len(), 1);

        let res = resolve(&["-i", "eth0"]).expect("resolve");
        assert_eq!(res.config.capture.mechanism, CaptureMechanism::AfPacket);
    }

    #[test]
    fn test_unknown_capture_type() {
        let err = resolve(&["-i", "eth0", "-t", "netmap"]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCaptureType(t) if t == "netmap"));
    }

    #[test]
    fn test_invalid_snaplen() {
        let err = resolve(&["-i", "eth0", "-s", "0"]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { option: "snaplen", .. }));
    }

    #[test]
    fn test_sizes_are_scaled() {
        let res = resolve(&["-i", "eth0", "-b", "2", "-p", "/tmp/logs", "-r", "10", "-k", "3"]).expect("resolve");
        assert_eq!(res.config.capture.buffer_size, 2 * 1024 * 1024);
        let rotation = res.config.logging.rotation.expect("rotation");
        assert_eq!(rotation.rotate_every_bytes, 10 * 1024);
        assert_eq!(rotation.keep_files, 3);
        assert_eq!(rotation.name, "heplify.log");
    }

    #[test]
    fn test_console_logging_without_path() {
        let res = resolve(&["-i", "eth0"]).expect("resolve");
        assert!(res.config.logging.rotation.is_none());
        assert_eq!(res.config.logging.level, "info");
    }

    #[test]
    fn test_hep_disabled_clears_collector() {
        let res = resolve(&["-i", "eth0", "--dh", "false"]).expect("resolve");
        assert!(res.config.output.collector_address.is_empty());

        let res = resolve(&["-i", "eth0", "--hs", "10.0.0.5:9060"]).expect("resolve");
        assert_eq!(res.config.output.collector_address, "10.0.0.5:9060");
    }

    #[test]
    fn test_effective_filter() {
        assert_eq!(effective_filter("", true), None);
        assert_eq!(effective_filter("port 5060", false).as_deref(), Some("port 5060"));
        assert_eq!(
            effective_filter("port 5060", true).as_deref(),
            Some("(port 5060) or (vlan and (port 5060))")
        );
    }

    #[test]
    fn test_normalize_does_not_touch_interfaces() {
        let resolver = ConfigResolver::new(&FakeLookup);
        let args = Args::parse_from(["heplify", "-i", "eth9", "-l", "debug"]);

        let res = resolver.normalize(&args).expect("normalize");
        assert!(res.config.interface_addrs.is_none());
        assert_eq!(res.config.logging.level, "debug");

        let err = resolver.resolve_addresses(res.config).unwrap_err();
        assert!(matches!(err, ConfigError::AddressLookup(AddressLookupError::NoSuchInterface(d)) if d == "eth9"));
    }

    #[test]
    fn test_resolve_addresses_keeps_normalized_options() {
        let resolver = ConfigResolver::new(&FakeLookup);
        let normalized = resolver
            .normalize(&Args::parse_from(["heplify", "-i", "eth0", "-f", "port 5060", "--wl"]))
            .expect("normalize")
            .config;

        let config = resolver.resolve_addresses(normalized.clone()).expect("addresses");

        assert_eq!(config.capture, normalized.capture);
        assert_eq!(config.interface_addrs, Some(InterfaceAddressSet::new("eth0", ["10.0.0.1", "10.0.0.2"])));
    }
}
