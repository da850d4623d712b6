use agdirect_wire::tags::AG_DIRECT_LEVEL;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("agdirect {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: agdirect");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("protocol_level: {AG_DIRECT_LEVEL}");
    println!(
        "target: {}",
        option_env!("AGDIRECT_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("features: link={}, cli=true", cfg!(feature = "link"));

    Ok(SUCCESS)
}
