use agdirect_link::connect_with_config;
use agdirect_transport::TraceLevel;

use crate::cmd::VerifyArgs;
use crate::exit::{link_error, CliResult, SUCCESS};
use crate::output::{print_server_info, OutputFormat};

pub fn run(args: VerifyArgs, format: OutputFormat, trace: Option<TraceLevel>) -> CliResult<i32> {
    let config = args.connect.link_config(trace)?;
    let conn = connect_with_config(&config).map_err(|err| link_error("connect failed", err))?;
    let info = conn
        .verify()
        .map_err(|err| link_error("verify failed", err))?;
    if let Err(err) = conn.disconnect() {
        tracing::debug!(error = %err, "disconnect after verify failed");
    }
    print_server_info(&info, conn.peer(), format);
    Ok(SUCCESS)
}
