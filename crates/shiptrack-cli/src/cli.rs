//! CLI argument definitions for shiptrack.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `track` | Resolve a tracking number through cache and providers |
//! | `refresh` | Force a live refresh of a tracking number |
//! | `providers` | Show the prioritized provider chain per identifier type |
//! | `health` | Report per-provider availability |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--mock` | `false` | Use deterministic offline providers |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--log-json` | `false` | Emit logs as JSON on stderr |
//! | `--catalog` | builtin | Provider catalog JSON file |
//!
//! # Examples
//!
//! ```bash
//! shiptrack --mock track MSKU1234567
//! shiptrack track MAEU240601123 --type bol --refresh --pretty
//! shiptrack providers --type container
//! RUST_LOG=shiptrack_core=debug shiptrack --mock health
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use shiptrack_core::IdentifierType;

/// Multi-provider shipment tracking CLI
#[derive(Debug, Parser)]
#[command(
    name = "shiptrack",
    author,
    version,
    about = "Multi-provider shipment tracking CLI",
    long_about = "shiptrack resolves container, booking, bill of lading and vessel numbers \
against carrier APIs and tracking aggregators. Features include:\n\
\n\
  • Deterministic provider prioritization with early stop\n\
  • Per-provider rate limits, timeouts and retries\n\
  • Stale-cache fallback when providers fail\n\
  • Structured JSON output with metadata\n\
\n\
Provider keys are read from SHIPTRACK_<PROVIDER>_API_KEY or <PROVIDER>_API_KEY.\n\
Use 'shiptrack <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Use deterministic offline providers instead of real HTTP clients.
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Emit logs as JSON lines on stderr.
    ///
    /// The log level is controlled by RUST_LOG (default: warn).
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,

    /// Provider catalog file overriding the builtin catalog.
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Identifier kinds accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TypeArg {
    Container,
    Booking,
    Bol,
    Vessel,
}

impl From<TypeArg> for IdentifierType {
    fn from(value: TypeArg) -> Self {
        match value {
            TypeArg::Container => Self::Container,
            TypeArg::Booking => Self::Booking,
            TypeArg::Bol => Self::Bol,
            TypeArg::Vessel => Self::Vessel,
        }
    }
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve a tracking number.
    ///
    /// Serves a fresh cached record when one exists, refreshes stale ones,
    /// and falls back to archived data when every provider fails.
    ///
    /// # Examples
    ///
    ///   shiptrack track MSKU1234567
    ///   shiptrack track BKG20240601 --type booking
    Track(TrackArgs),

    /// Force a live refresh of a tracking number.
    Refresh(RefreshArgs),

    /// Show the prioritized provider chain.
    Providers(ProvidersArgs),

    /// Report provider availability.
    Health,
}

/// Arguments for the `track` command.
#[derive(Debug, Args)]
pub struct TrackArgs {
    /// Container, booking, bill of lading or vessel number.
    pub identifier: String,

    /// Identifier type. Detected from the identifier when omitted.
    #[arg(long = "type", value_enum)]
    pub identifier_type: Option<TypeArg>,

    /// Skip the cache and query providers directly.
    #[arg(long, default_value_t = false)]
    pub refresh: bool,
}

/// Arguments for the `refresh` command.
#[derive(Debug, Args)]
pub struct RefreshArgs {
    pub identifier: String,

    #[arg(long = "type", value_enum)]
    pub identifier_type: Option<TypeArg>,
}

/// Arguments for the `providers` command.
#[derive(Debug, Args)]
pub struct ProvidersArgs {
    /// Only show the chain for this identifier type.
    #[arg(long = "type", value_enum)]
    pub identifier_type: Option<TypeArg>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_accepts_type_and_refresh_flags() {
        let cli = Cli::try_parse_from([
            "shiptrack",
            "--mock",
            "track",
            "MSKU1234567",
            "--type",
            "container",
            "--refresh",
        ])
        .expect("valid arguments");

        assert!(cli.mock);
        match cli.command {
            Command::Track(args) => {
                assert_eq!(args.identifier, "MSKU1234567");
                assert_eq!(args.identifier_type, Some(TypeArg::Container));
                assert!(args.refresh);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_are_accepted_after_the_subcommand() {
        let cli = Cli::try_parse_from(["shiptrack", "health", "--pretty", "--log-json"])
            .expect("valid arguments");

        assert!(cli.pretty);
        assert!(cli.log_json);
        assert!(matches!(cli.command, Command::Health));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result = Cli::try_parse_from(["shiptrack", "providers", "--type", "parcel"]);
        assert!(result.is_err());
    }
}
