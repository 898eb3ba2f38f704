//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use url::Url;

/// Fetch, post and save over one shared network transport.
///
/// Every command runs one blocking exchange. Proxy and certificate handling
/// follow the config file unless overridden here.
#[derive(Parser, Debug)]
#[command(name = "netmanager")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Route every request through this proxy
    #[arg(long, global = true, conflicts_with = "no_proxy")]
    pub proxy: Option<Url>,

    /// Connect directly, ignoring proxy settings and environment
    #[arg(long, global = true)]
    pub no_proxy: bool,

    /// Fail on certificate validation errors instead of overriding them
    #[arg(long, global = true)]
    pub strict_certificates: bool,

    /// Overall exchange timeout in seconds (1-3600)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: Option<u64>,

    /// Print a JSON outcome report instead of plain output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// GET a URL into memory and write the body to stdout or a file
    Get {
        url: String,

        /// Write the body here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// GET a URL into the scratch file and print its path
    GetToFile { url: String },

    /// POST an RPC payload and write the reply to stdout
    Post {
        url: String,

        /// Read the payload from this file instead of stdin
        #[arg(long)]
        body_file: Option<PathBuf>,
    },

    /// GET a URL and save the reply to a chosen location
    Save {
        url: String,

        /// Accept the suggested destination without prompting
        #[arg(short, long)]
        yes: bool,
    },
}

impl Command {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Get { .. } => "get",
            Self::GetToFile { .. } => "get-to-file",
            Self::Post { .. } => "post",
            Self::Save { .. } => "save",
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Get { url, .. }
            | Self::GetToFile { url }
            | Self::Post { url, .. }
            | Self::Save { url, .. } => url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_get_parses_url() {
        let args = Args::try_parse_from(["netmanager", "get", "https://example.com/a"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert_eq!(
            args.command,
            Command::Get {
                url: "https://example.com/a".to_string(),
                output: None
            }
        );
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["netmanager", "-v", "get-to-file", "https://e.com"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["netmanager", "get-to-file", "https://e.com", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = Args::try_parse_from(["netmanager", "-q", "get", "https://e.com"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_post_body_file() {
        let args = Args::try_parse_from([
            "netmanager",
            "post",
            "https://e.com/edam/user",
            "--body-file",
            "payload.bin",
        ])
        .unwrap();
        assert_eq!(
            args.command,
            Command::Post {
                url: "https://e.com/edam/user".to_string(),
                body_file: Some(PathBuf::from("payload.bin"))
            }
        );
        assert_eq!(args.command.name(), "post");
    }

    #[test]
    fn test_cli_save_yes_flag() {
        let args = Args::try_parse_from(["netmanager", "save", "-y", "https://e.com/r.pdf"]).unwrap();
        assert_eq!(
            args.command,
            Command::Save {
                url: "https://e.com/r.pdf".to_string(),
                yes: true
            }
        );
    }

    #[test]
    fn test_cli_network_flags() {
        let args = Args::try_parse_from([
            "netmanager",
            "--proxy",
            "http://proxy.local:3128",
            "--strict-certificates",
            "--timeout",
            "30",
            "--json",
            "get",
            "https://e.com",
        ])
        .unwrap();
        assert_eq!(
            args.proxy.as_ref().map(Url::as_str),
            Some("http://proxy.local:3128/")
        );
        assert!(args.strict_certificates);
        assert_eq!(args.timeout, Some(30));
        assert!(args.json);
    }

    #[test]
    fn test_cli_proxy_conflicts_with_no_proxy() {
        let result = Args::try_parse_from([
            "netmanager",
            "--proxy",
            "http://proxy.local:3128",
            "--no-proxy",
            "get",
            "https://e.com",
        ]);
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::ArgumentConflict
        );
    }

    #[test]
    fn test_cli_timeout_zero_rejected() {
        let result = Args::try_parse_from(["netmanager", "--timeout", "0", "get", "https://e.com"]);
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::ValueValidation
        );
    }

    #[test]
    fn test_cli_requires_subcommand() {
        let result = Args::try_parse_from(["netmanager"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let result = Args::try_parse_from(["netmanager", "--help"]);
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::DisplayHelp
        );
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let result = Args::try_parse_from(["netmanager", "--version"]);
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::DisplayVersion
        );
    }
}
