//! # preq
//!
//! Reads raw HTTP requests as JSON lines from standard input, sends them in parallel and writes
//! one JSON line per request, with the response or the error, to standard output.
use std::{path::PathBuf, process::ExitCode};

use anyhow::Context;
use clap::Parser;
use preq::{
    config::{Overrides, Settings},
    httpipe::{JsonLinesWriter, read_requests},
    logging::{Level, set_up_logging},
    runtime::{connection::Connector, executor::RequestExecutor, pipeline::Pipeline, tls::client_config},
};
use tokio::io::{BufReader, stdin, stdout};
use tracing::info;

const USAGE_DETAILS: &str = r#"Input is read from standard input in the httpipe format: one JSON object
per line. At least the "host" and "req" fields must be present. If the
"tls" field is missing, TLS (HTTPS) is used. If the "port" field is
missing, port 80 is used without TLS and port 443 with TLS.

Requests are sent in the order they arrive. With --parallel greater than
1, the order of the output lines may not match the input.

Options can also be set in a config file or with the environment variables
PREQ_TIMEOUT, PREQ_PARALLEL and PREQ_CA_FILE. Command-line flags win.

Example:
  echo '{"host":"x.com","req":"GET / HTTP/1.1\r\nHost: x.com\r\n\r\n"}' | preq"#;

#[derive(Parser, Debug)]
#[command(version, about, after_help = USAGE_DETAILS)]
struct Args {
    /// Timeout for each request, e.g. 500ms, 5s or 1m [default: 5s]
    #[clap(long, short)]
    timeout: Option<String>,

    /// Number of parallel requests [default: 1]
    #[clap(long, short)]
    parallel: Option<usize>,

    /// Configuration file with timeout, parallel and ca_file keys
    #[clap(long)]
    config: Option<PathBuf>,

    /// Additional CA certificates to trust, in PEM format
    #[clap(long)]
    ca_file: Option<PathBuf>,

    /// Most verbose level logged to standard error
    #[clap(long, default_value = "warn")]
    log_level: Level,

    /// Log as JSON lines
    #[clap(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::debug!(?error);
            eprintln!("Error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    set_up_logging(args.log_level, args.log_json)?;

    let overrides = Overrides {
        config_file: args.config,
        timeout: args.timeout,
        parallel: args.parallel,
        ca_file: args.ca_file,
    };
    let settings = Settings::load(&overrides).context("invalid configuration")?;

    let tls = client_config(settings.ca_file.as_deref()).context("could not set up TLS")?;
    let executor = RequestExecutor::new(Connector::with_system_resolver(tls), settings.timeout);
    let pipeline = Pipeline::new(executor, settings.parallel)?;

    info!(timeout = ?settings.timeout, parallel = settings.parallel, "starting");
    let mut sink = JsonLinesWriter::new(stdout());
    let report = pipeline.run(read_requests(BufReader::new(stdin())), &mut sink).await?;
    info!(
        dispatched = report.dispatched,
        completed = report.completed,
        failed = report.failed,
        "finished"
    );
    Ok(())
}
