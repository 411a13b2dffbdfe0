#![forbid(unsafe_code)]

use std::net::TcpListener;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use deodex_hierarchy::{load_universe, parse_bootclasspath, IntrinsicTable};
use deodex_server::serve_connection;

#[derive(Parser)]
#[command(
    name = "deodexd",
    version,
    about = "Class-hierarchy oracle for odex disassembly"
)]
struct Cli {
    /// odex, dex, jar or apk file to answer queries about
    container: PathBuf,
    /// TCP port to listen on (all interfaces)
    port: u16,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(Cli::parse()) {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let bootclasspath = std::env::var("BOOTCLASSPATH")
        .context("the BOOTCLASSPATH environment variable must be set")?;
    let boot_entries = parse_bootclasspath(&bootclasspath);

    // Bind before the hierarchy load so the client can connect right away
    // and block until the first command is answered.
    let listener = TcpListener::bind(("0.0.0.0", cli.port))
        .with_context(|| format!("could not listen on port {}", cli.port))?;
    info!(port = cli.port, "listening");

    let mut universe = load_universe(&boot_entries, &cli.container)
        .with_context(|| format!("could not load {}", cli.container.display()))?;
    let intrinsics = IntrinsicTable::dalvik();

    serve_connection(&listener, &mut universe, &intrinsics)
        .context("connection failed")?;
    Ok(())
}
