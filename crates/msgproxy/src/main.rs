mod exit;
mod logging;
mod registry;

use clap::Parser;

use crate::logging::{LogFormat, LogLevel};

/// The pipeline is assembled left to right: the first stage is the
/// source, the last is the sink, everything between transforms.
#[derive(Parser, Debug)]
#[command(
    name = "msgproxy",
    version,
    about = "Configurable message proxy: pipe bytes between transports through framing and encoding stages",
    after_help = "EXAMPLES:\n  \
        msgproxy udp:0.0.0.0:7000 -length +delim:\\n tcp:10.0.0.1:9000\n  \
        msgproxy file:in.bin -length +lines file:out.txt\n  \
        msgproxy - +url -"
)]
struct Cli {
    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Stage tokens in pipeline order, each `name[:options]`.
    #[arg(required = true, num_args = 2.., value_name = "STAGE", allow_hyphen_values = true)]
    stages: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.log_format, cli.log_level);

    let mut pipeline = match registry::build_pipeline(&cli.stages) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(exit::code_for(&err));
        }
    };

    match pipeline.run() {
        Ok(()) => std::process::exit(exit::SUCCESS),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(exit::code_for(&err));
        }
    }
}
