use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agdirect_link::{echo_handler, Greeting, StubServer};
use agdirect_wire::WireConfig;
use serde_json::json;

use crate::cmd::{GreetingArg, StubArgs};
use crate::exit::{link_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::OutputFormat;

pub fn run(args: StubArgs, format: OutputFormat) -> CliResult<i32> {
    let addr = format!("{}:{}", args.bind, args.port);
    let server = StubServer::bind(&addr, echo_handler)
        .map_err(|err| link_error("bind failed", err))?
        .with_greeting(greeting(args.greeting))
        .with_wire_config(wire_config(args.compress));
    let local = server.local_addr();

    match format {
        OutputFormat::Json => println!("{}", json!({ "listening": local.to_string(), "port": local.port() })),
        _ => println!("listening on {local}"),
    }
    if let Err(err) = std::io::stdout().flush() {
        tracing::debug!(error = %err, "stdout flush failed");
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let handle = server.spawn();
    tracing::info!(%local, greeting = ?args.greeting, compress = args.compress, "stub server running");
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }
    let served = handle.served_calls();
    handle.stop();
    tracing::info!(served, "stub server stopped");
    Ok(SUCCESS)
}

fn greeting(arg: GreetingArg) -> Greeting {
    match arg {
        GreetingArg::Accept => Greeting::Accept,
        GreetingArg::Full => Greeting::TooManyConnections,
        GreetingArg::Reject => Greeting::Reject,
    }
}

fn wire_config(compress: bool) -> WireConfig {
    WireConfig {
        compress_sequences: compress,
        ..WireConfig::default()
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
