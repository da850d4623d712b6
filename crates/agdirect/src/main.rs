mod cmd;
mod exit;
mod logging;
mod output;

use agdirect_transport::TraceLevel;
use clap::Parser;

use crate::cmd::Command;
use crate::logging::{effective_filter, init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "agdirect", version, about = "AGDirect protocol client")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// Protocol trace level: off, calls, values or bytes.
    #[arg(long, value_name = "LEVEL", global = true, env = "AGDIRECT_TRACE")]
    trace: Option<TraceLevel>,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    let filter = effective_filter(cli.log_level, cli.trace.unwrap_or_default());
    init_logging(cli.log_format, filter);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format, cli.trace);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
