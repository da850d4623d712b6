use agdirect_link::{connect_with_config, CallStyle, ResultSelector};
use agdirect_transport::TraceLevel;
use agdirect_wire::{Upi, Value};

use crate::cmd::CallArgs;
use crate::exit::{link_error, CliError, CliResult, SUCCESS};
use crate::output::{print_results, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat, trace: Option<TraceLevel>) -> CliResult<i32> {
    let values = args
        .args
        .iter()
        .map(|arg| parse_arg(arg))
        .collect::<CliResult<Vec<_>>>()?;
    let selector = selector_for(&args)?;
    let config = args.connect.link_config(trace)?;

    let conn = connect_with_config(&config).map_err(|err| link_error("connect failed", err))?;
    let result = conn
        .call(&args.operation, args.style, &values)
        .and_then(|values| selector.select(&args.operation, values));
    if let Err(err) = conn.disconnect() {
        tracing::debug!(error = %err, "disconnect after call failed");
    }
    let results = result.map_err(|err| link_error("call failed", err))?;

    print_results(
        &args.operation,
        args.style.as_str(),
        conn.peer(),
        &results,
        format,
    );
    Ok(SUCCESS)
}

fn selector_for(args: &CallArgs) -> CliResult<ResultSelector> {
    let selector = match (args.index, args.expect_none) {
        (Some(index), _) => ResultSelector::Index(index),
        (None, true) => ResultSelector::Nothing,
        (None, false) => ResultSelector::All,
    };
    if selector != ResultSelector::All && args.style != CallStyle::TwoWay {
        return Err(CliError::usage(
            "--index and --expect-none need a two-way call",
        ));
    }
    Ok(selector)
}

/// Parse one command-line argument into a wire value.
///
/// `kind:body` picks the wire type. Anything without a known prefix is an
/// integer if it parses as one, a boolean for `true`/`false`, and a string
/// otherwise.
pub fn parse_arg(arg: &str) -> CliResult<Value> {
    if arg == "null" {
        return Ok(Value::Null);
    }
    let bad = |what: &str| CliError::usage(format!("invalid {what} argument: {arg}"));
    let Some((kind, body)) = arg.split_once(':') else {
        return Ok(untyped(arg));
    };
    let value = match kind {
        "int" => Value::Int(body.parse().map_err(|_| bad("int"))?),
        "long" => Value::Integer(body.parse().map_err(|_| bad("long"))?),
        "short" => Value::Short(body.parse().map_err(|_| bad("short"))?),
        "byte" => Value::Byte(body.parse().map_err(|_| bad("byte"))?),
        "float" => Value::Float(body.parse().map_err(|_| bad("float"))?),
        "double" => Value::Double(body.parse().map_err(|_| bad("double"))?),
        "str" => Value::from(body),
        "char" => {
            let units: Vec<u16> = body.encode_utf16().collect();
            match units.as_slice() {
                [unit] => Value::Char(*unit),
                _ => return Err(bad("char")),
            }
        }
        "bool" => match body {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => return Err(bad("bool")),
        },
        "upi" => Value::Upi(Upi::from_hex(body).ok_or_else(|| bad("upi"))?),
        "bytes" => Value::Bytes(decode_hex(body).ok_or_else(|| bad("bytes"))?.into()),
        _ => untyped(arg),
    };
    Ok(value)
}

fn untyped(arg: &str) -> Value {
    if let Ok(n) = arg.parse::<i64>() {
        return Value::Integer(n);
    }
    match arg {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::from(arg),
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}
