//! Command line interface for the `meshfrag` binary.
//!
//! The binary exercises the fragmentation engine offline: it builds a packet
//! of a chosen size, splits it and optionally feeds the fragments back in a
//! shuffled order. This file is also compiled by `build.rs` to render the man
//! page, so it depends only on `clap`.

use clap::{Args, Parser, Subcommand};

/// Command line arguments for the `meshfrag` binary.
#[derive(Debug, Parser)]
#[command(
    name = "meshfrag",
    version,
    about = "Split and reassemble mesh packets offline"
)]
pub struct Cli {
    #[command(flatten)]
    pub fragmentation: FragmentationArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Engine settings shared by every subcommand.
#[derive(Debug, Args)]
pub struct FragmentationArgs {
    /// Derive threshold and chunk size from this link MTU.
    #[arg(long, conflicts_with_all = ["threshold", "max_fragment_size"])]
    pub mtu: Option<usize>,

    /// Unpadded packet length above which packets are fragmented.
    #[arg(long, default_value_t = 512)]
    pub threshold: usize,

    /// Maximum chunk bytes per fragment.
    #[arg(long, default_value_t = 469)]
    pub max_fragment_size: usize,

    /// Seconds an incomplete set is kept before eviction.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Seconds between eviction sweeps.
    #[arg(long, default_value_t = 10)]
    pub cleanup_secs: u64,

    /// Require every fragment index before reassembling.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fragment a random packet and list the resulting envelopes.
    Split {
        /// Payload bytes in the generated packet.
        #[arg(short, long, default_value_t = 2048)]
        size: usize,
    },
    /// Fragment a random packet, shuffle the fragments and reassemble them.
    Roundtrip {
        /// Payload bytes in the generated packet.
        #[arg(short, long, default_value_t = 2048)]
        size: usize,
    },
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use rstest::rstest;

    use super::{Cli, Command};

    #[test]
    fn defaults_match_protocol_constants() {
        let cli = Cli::parse_from(["meshfrag", "split"]);
        assert_eq!(cli.fragmentation.threshold, 512);
        assert_eq!(cli.fragmentation.max_fragment_size, 469);
        assert_eq!(cli.fragmentation.timeout_secs, 30);
        assert_eq!(cli.fragmentation.cleanup_secs, 10);
        assert!(!cli.fragmentation.strict);
        assert!(matches!(cli.command, Command::Split { size: 2048 }));
    }

    #[rstest]
    #[case(&["meshfrag", "roundtrip", "--size", "900"], 900)]
    #[case(&["meshfrag", "--strict", "roundtrip", "-s", "10"], 10)]
    fn parses_roundtrip_size(#[case] args: &[&str], #[case] expected: usize) {
        let cli = Cli::parse_from(args);
        assert!(matches!(cli.command, Command::Roundtrip { size } if size == expected));
    }

    #[test]
    fn mtu_conflicts_with_explicit_sizes() {
        let parsed = Cli::try_parse_from(["meshfrag", "--mtu", "256", "--threshold", "100", "split"]);
        assert!(parsed.is_err());
    }
}
