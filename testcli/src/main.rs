//! A small manual test client for exercising a running balancer: upload a
//! local file and watch the progress logs. A direct port of `cmd/test/main.go`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use content_store::FileStore;
use net::BalancerClient;
use upload::PlainUpload;

#[derive(Debug, Parser)]
#[command(about = "Manual balancer upload/download test tool")]
struct Args {
    /// Balancer address without protocol, e.g. `0.0.0.0:8080`.
    #[arg(short = 'a', long, default_value = "0.0.0.0:8080")]
    addr: String,

    /// `upload` or `download`.
    #[arg(short = 'm', long, default_value = "upload")]
    mode: String,

    /// Name (upload mode) or path (download mode).
    #[arg(short = 'n', long, default_value = "file.txt")]
    name: String,

    /// Directory used for staging while computing the file's digest.
    #[arg(short = 'd', long, default_value = "data")]
    dir: PathBuf,

    /// Request and response timeout, e.g. `300s` or `2h45m`.
    #[arg(short = 't', long, value_parser = humantime::parse_duration, default_value = "120s")]
    timeout: Duration,
}

#[tokio::main]
async fn main() {
    telemetry::TracingBuilder::default()
        .build()
        .expect("set up logging");

    let args = Args::parse();

    match args.mode.as_str() {
        "upload" => {
            let files = match FileStore::new(args.dir.clone()).await {
                Ok(files) => Arc::new(files),
                Err(err) => {
                    tracing::error!(error = %err, "open file store");
                    return;
                }
            };
            let balancer = Arc::new(BalancerClient::new(args.addr.clone(), args.timeout));
            let upload = PlainUpload::new(files, balancer);

            if let Err(err) = upload.upload(std::path::Path::new(&args.name), &args.name).await {
                tracing::error!(error = %err, "upload");
            }
        }
        "download" => {
            // Not implemented, matching the original's empty `case "download":`.
        }
        _ => {
            use clap::CommandFactory;
            Args::command().print_help().ok();
        }
    }
}
