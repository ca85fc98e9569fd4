use anyhow::bail;
use clap::{Parser, ValueEnum};
use core::time::Duration;
use tonic::codec::CompressionEncoding;

use crate::client::facade::Deadlines;

/// Runtime configuration for the `lmc` binary.
///
/// Every setting can be given as a flag, through the environment, or through
/// a `.env` file in the working directory. The trailing positional arguments
/// select the command; see `lmc --help` for the list.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "lmc",
    version,
    about = "Drive a lumber.LogStore service: one-shot calls, bulk, flood and stream load"
)]
pub struct CliArgs {
    /// Address of the log store (`host:port` or a full `http://` URI).
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("http://127.0.0.1:9090"))]
    pub server_addr: String,

    /// Number of entries written by `write-bulk` and `write-stream`.
    ///
    /// `write-bulk` gives every worker `count / num_workers` entries; any
    /// remainder is not written.
    ///
    /// Environment variable: `COUNT`
    #[arg(short = 'n', long, env = "COUNT", default_value_t = 1000)]
    pub count: usize,

    /// Number of concurrent workers used by `write-bulk` and `write-flood`.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS", default_value_t = 8)]
    pub num_workers: usize,

    /// Hard wall-clock ceiling for `write-flood`, in seconds. When it fires
    /// the process exits immediately, abandoning in-flight writes.
    ///
    /// Environment variable: `FLOOD_DURATION_SECS`
    #[arg(long, env = "FLOOD_DURATION_SECS", default_value_t = 600)]
    pub flood_duration_secs: u64,

    /// Deadline applied to every unary call, in seconds.
    ///
    /// Environment variable: `CALL_TIMEOUT_SECS`
    #[arg(long, env = "CALL_TIMEOUT_SECS", default_value_t = 10)]
    pub call_timeout_secs: u64,

    /// Overall deadline for `read-stream`, in seconds.
    ///
    /// Environment variable: `BATCH_STREAM_TIMEOUT_SECS`
    #[arg(long, env = "BATCH_STREAM_TIMEOUT_SECS", default_value_t = 30)]
    pub batch_stream_timeout_secs: u64,

    /// Capacity of the outbound queue feeding the `write-stream` send half.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 16)]
    pub stream_buffer_size: usize,

    /// Compression applied to requests and accepted on responses.
    ///
    /// Environment variable: `COMPRESSION`
    #[arg(long, env = "COMPRESSION", value_enum, default_value_t = Compression::None)]
    pub compression: Compression,

    /// Command followed by its arguments. Options must come before the
    /// command; everything after it, including values starting with `-`, is
    /// passed to the command verbatim.
    #[arg(value_name = "COMMAND", trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Compression {
    None,
    Gzip,
    Zstd,
    Deflate,
}

impl From<Compression> for Option<CompressionEncoding> {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => None,
            Compression::Gzip => Some(CompressionEncoding::Gzip),
            Compression::Zstd => Some(CompressionEncoding::Zstd),
            Compression::Deflate => Some(CompressionEncoding::Deflate),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: String,
    pub count: usize,
    pub num_workers: usize,
    pub flood_ceiling: Duration,
    pub deadlines: Deadlines,
    pub stream_buffer_size: usize,
    pub compression: Compression,
    pub command: Vec<String>,
}

impl TryFrom<CliArgs> for ClientConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.num_workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }
        if args.flood_duration_secs == 0 {
            bail!("FLOOD_DURATION_SECS must be greater than 0");
        }
        if args.call_timeout_secs == 0 || args.batch_stream_timeout_secs == 0 {
            bail!("call and stream timeouts must be greater than 0");
        }
        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        let server_addr = if args.server_addr.contains("://") {
            args.server_addr
        } else {
            format!("http://{}", args.server_addr)
        };

        Ok(Self {
            server_addr,
            count: args.count,
            num_workers: args.num_workers,
            flood_ceiling: Duration::from_secs(args.flood_duration_secs),
            deadlines: Deadlines {
                call: Duration::from_secs(args.call_timeout_secs),
                batch_stream: Duration::from_secs(args.batch_stream_timeout_secs),
            },
            stream_buffer_size: args.stream_buffer_size,
            compression: args.compression,
            command: args.command,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> anyhow::Result<ClientConfig> {
        let args = CliArgs::try_parse_from(core::iter::once("lmc").chain(argv.iter().copied()))?;
        ClientConfig::try_from(args)
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let config = parse(&["write-bulk", "orders"]).unwrap();

        assert_eq!(config.num_workers, 8);
        assert_eq!(config.flood_ceiling, Duration::from_secs(600));
        assert_eq!(config.deadlines.call, Duration::from_secs(10));
        assert_eq!(config.deadlines.batch_stream, Duration::from_secs(30));
        assert_eq!(config.compression, Compression::None);
        assert_eq!(config.command, vec!["write-bulk", "orders"]);
    }

    #[test]
    fn bare_host_port_gets_a_scheme() {
        let config = parse(&["--server-addr", "10.0.0.7:9090", "list-prefixes"]).unwrap();
        assert_eq!(config.server_addr, "http://10.0.0.7:9090");

        let config = parse(&["--server-addr", "https://logs.internal:443"]).unwrap();
        assert_eq!(config.server_addr, "https://logs.internal:443");
    }

    #[test]
    fn count_flag_accepts_short_form() {
        let config = parse(&["-n", "800", "write-bulk", "orders"]).unwrap();
        assert_eq!(config.count, 800);
    }

    #[test]
    fn rejects_zero_workers() {
        assert!(parse(&["--num-workers", "0", "write-bulk", "orders"]).is_err());
    }

    #[test]
    fn rejects_zero_durations() {
        assert!(parse(&["--flood-duration-secs", "0"]).is_err());
        assert!(parse(&["--call-timeout-secs", "0"]).is_err());
        assert!(parse(&["--batch-stream-timeout-secs", "0"]).is_err());
    }

    #[test]
    fn compression_maps_to_encoding() {
        let config = parse(&["--compression", "zstd"]).unwrap();
        let encoding: Option<CompressionEncoding> = config.compression.into();
        assert_eq!(encoding, Some(CompressionEncoding::Zstd));

        let encoding: Option<CompressionEncoding> = Compression::None.into();
        assert_eq!(encoding, None);
    }

    #[test]
    fn arguments_after_the_command_are_passed_verbatim() {
        let config = parse(&["write", "orders", "-x"]).unwrap();
        assert_eq!(config.command, vec!["write", "orders", "-x"]);

        let config = parse(&["-n", "5", "write", "orders", "--count"]).unwrap();
        assert_eq!(config.count, 5);
        assert_eq!(config.command, vec!["write", "orders", "--count"]);
    }
}
