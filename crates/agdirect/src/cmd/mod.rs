use std::path::PathBuf;
use std::time::Duration;

use agdirect_link::{CallStyle, LinkConfig, DEFAULT_PORT};
use agdirect_transport::TraceLevel;
use clap::{Args, Subcommand, ValueEnum};

use crate::exit::{io_error, CliError, CliResult, DATA_INVALID};
use crate::output::OutputFormat;

pub mod call;
pub mod stub;
pub mod verify;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Invoke one operation and print its results.
    Call(CallArgs),
    /// Connect and check the server speaks AGDirect.
    Verify(VerifyArgs),
    /// Run a local echo server speaking the protocol.
    Stub(StubArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat, trace: Option<TraceLevel>) -> CliResult<i32> {
    match command {
        Command::Call(args) => call::run(args, format, trace),
        Command::Verify(args) => verify::run(args, format, trace),
        Command::Stub(args) => stub::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Where and how to connect.
#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Server address as HOST[:PORT].
    pub target: String,
    /// JSON file with connection settings; flags given here override it.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Connect attempts before giving up.
    #[arg(long)]
    pub poll_count: Option<u32>,
    /// Per-attempt connect timeout (e.g. 5s, 500ms). The greeting may take ten times this.
    #[arg(long)]
    pub timeout: Option<String>,
    /// Emit DUPLICATE / REPEAT markers in outgoing sequences.
    #[arg(long)]
    pub compress: bool,
}

impl ConnectArgs {
    pub fn link_config(&self, trace: Option<TraceLevel>) -> CliResult<LinkConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => LinkConfig::default(),
        };
        let (host, port) = parse_target(&self.target, config.port)?;
        config.host = host;
        config.port = port;
        if let Some(count) = self.poll_count {
            config.poll_count = count;
        }
        if let Some(timeout) = &self.timeout {
            config.timeout_ms = u64::try_from(parse_duration(timeout)?.as_millis())
                .map_err(|_| CliError::usage(format!("timeout too large: {timeout}")))?;
        }
        if let Some(trace) = trace {
            config.trace = trace;
        }
        config.compress_sequences |= self.compress;
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct CallArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Operation name.
    pub operation: String,
    /// Arguments: `int:42`, `str:hi`, `long:`, `byte:`, `short:`, `char:`,
    /// `float:`, `double:`, `bool:`, `upi:<24 hex>`, `bytes:<hex>`, `null`.
    /// Untyped tokens are integers, booleans or strings.
    #[arg(allow_negative_numbers = true)]
    pub args: Vec<String>,
    /// Call style.
    #[arg(long, default_value = "two-way")]
    pub style: CallStyle,
    /// Print only the result at this index; fewer results is an error.
    #[arg(long, conflicts_with = "expect_none")]
    pub index: Option<usize>,
    /// Fail unless the call returns no results.
    #[arg(long)]
    pub expect_none: bool,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum GreetingArg {
    Accept,
    Full,
    Reject,
}

#[derive(Args, Debug)]
pub struct StubArgs {
    /// Port to listen on; 0 picks a free one.
    #[arg(default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    pub bind: String,
    /// Greeting sent to every client.
    #[arg(long, value_enum, default_value = "accept")]
    pub greeting: GreetingArg,
    /// Emit DUPLICATE / REPEAT markers in reply sequences.
    #[arg(long)]
    pub compress: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn load_config(path: &std::path::Path) -> CliResult<LinkConfig> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
    LinkConfig::from_json(&text).map_err(|err| {
        CliError::new(
            DATA_INVALID,
            format!("invalid config {}: {err}", path.display()),
        )
    })
}

/// Split `HOST[:PORT]`; a missing port falls back to `default_port`.
pub fn parse_target(target: &str, default_port: u16) -> CliResult<(String, u16)> {
    let target = target.trim();
    if target.is_empty() {
        return Err(CliError::usage("target must not be empty"));
    }
    let Some((host, port)) = target.rsplit_once(':') else {
        return Ok((target.to_string(), default_port));
    };
    if host.is_empty() {
        return Err(CliError::usage(format!("missing host in target: {target}")));
    }
    let port = port
        .parse()
        .map_err(|_| CliError::usage(format!("invalid port in target: {target}")))?;
    Ok((host.to_string(), port))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }
    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_with_and_without_port() {
        assert_eq!(
            parse_target("db.local:4567", DEFAULT_PORT).unwrap(),
            ("db.local".to_string(), 4567)
        );
        assert_eq!(
            parse_target("db.local", DEFAULT_PORT).unwrap(),
            ("db.local".to_string(), DEFAULT_PORT)
        );
        assert!(parse_target(":4567", DEFAULT_PORT).is_err());
        assert!(parse_target("db.local:http", DEFAULT_PORT).is_err());
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn flags_override_defaults() {
        let args = ConnectArgs {
            target: "10.0.0.5:9000".to_string(),
            config: None,
            poll_count: Some(1),
            timeout: Some("250ms".to_string()),
            compress: true,
        };
        let config = args.link_config(Some(TraceLevel::Calls)).unwrap();
        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.port, 9000);
        assert_eq!(config.poll_count, 1);
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.trace, TraceLevel::Calls);
        assert!(config.compress_sequences);
    }
}
