use clap::{ArgAction, Parser};

/// Raw command line options, consumed once by the config resolver
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about = "Capture SIP signaling and forward it to a HEP collector")]
pub struct Args {
    /// Listen on interface
    #[clap(short = 'i', long = "device", default_value = "any")]
    pub device: String,

    /// Capture type: pcap or af_packet
    #[clap(short = 't', long = "capture-type", default_value = "af_packet")]
    pub capture_type: String,

    /// BPF filter
    #[clap(short = 'f', long = "filter", default_value = "")]
    pub filter: String,

    /// Read packets from file
    #[clap(long = "read-file", visible_alias = "rf", default_value = "")]
    pub read_file: String,

    /// Dump captured packets to a pcap file
    #[clap(long = "dump-file", visible_alias = "df", default_value = "")]
    pub dump_file: String,

    /// Replay loop count (0 or 1 = once, negative = forever)
    #[clap(long = "loop", visible_alias = "lp", default_value_t = 0, allow_negative_numbers = true)]
    pub loop_count: i64,

    /// Include VLAN tagged traffic
    #[clap(long = "with-vlans", visible_alias = "wl")]
    pub with_vlans: bool,

    /// Snap length
    #[clap(short = 's', long = "snaplen", default_value_t = 65535)]
    pub snaplen: i64,

    /// Interface buffer size (MB)
    #[clap(short = 'b', long = "buffer-size", default_value_t = 128)]
    pub buffer_size_mb: i64,

    /// Log level (trace, debug, info, warning, error, critical, off)
    #[clap(short = 'l', long = "log-level", default_value = "info")]
    pub log_level: String,

    /// Log path; logs go to the console when empty
    #[clap(short = 'p', long = "log-path", default_value = "")]
    pub log_path: String,

    /// Log filename
    #[clap(short = 'n', long = "log-name", default_value = "heplify.log")]
    pub log_name: String,

    /// The size (KB) of each log file
    #[clap(short = 'r', long = "rotate-kb", default_value_t = 51200)]
    pub rotate_kb: u64,

    /// Keep the number of log files
    #[clap(short = 'k', long = "keep-files", default_value_t = 4)]
    pub keep_files: usize,

    /// Use HEP
    #[clap(long = "hep", visible_alias = "dh", default_value_t = true, action = ArgAction::Set)]
    pub use_hep: bool,

    /// HEP server address
    #[clap(long = "hep-server", visible_alias = "hs", default_value = "127.0.0.1:9060")]
    pub hep_server: String,

    /// HEP capture agent id
    #[clap(long = "hep-node-id", visible_alias = "hi", default_value_t = 2002)]
    pub hep_node_id: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["heplify"]);
        assert_eq!(args.device, "any");
        assert_eq!(args.capture_type, "af_packet");
        assert_eq!(args.snaplen, 65535);
        assert_eq!(args.buffer_size_mb, 128);
        assert_eq!(args.log_level, "info");
        assert_eq!(args.log_name, "heplify.log");
        assert_eq!(args.rotate_kb, 51200);
        assert_eq!(args.keep_files, 4);
        assert!(args.use_hep);
        assert_eq!(args.hep_server, "127.0.0.1:9060");
        assert_eq!(args.loop_count, 0);
    }

    #[test]
    fn test_short_aliases() {
        let args = Args::parse_from([
            "heplify", "--rf", "trace.pcap", "--lp", "-1", "--hs", "", "--dh", "false", "--wl",
        ]);
        assert_eq!(args.read_file, "trace.pcap");
        assert_eq!(args.loop_count, -1);
        assert_eq!(args.hep_server, "");
        assert!(!args.use_hep);
        assert!(args.with_vlans);
    }
}
