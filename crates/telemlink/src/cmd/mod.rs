use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use telemlink_schema::{load_with_options, LoadOptions, Schema, DEFAULT_SCHEMA_FILE};

use crate::exit::{schema_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod listen;
#[cfg(feature = "serial")]
pub mod ports;
pub mod schema;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stream records from a device and print them.
    Listen(ListenArgs),
    /// Run a UDP device simulator that streams synthetic frames.
    Simulate(SimulateArgs),
    /// Load and print the wire schema.
    Schema(SchemaArgs),
    /// List serial ports.
    #[cfg(feature = "serial")]
    Ports(PortsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format),
        Command::Simulate(args) => simulate::run(args, format),
        Command::Schema(args) => schema::run(args, format),
        #[cfg(feature = "serial")]
        Command::Ports(args) => ports::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SchemaSource {
    /// Schema file. Created from the built-in template if missing.
    #[arg(long, env = "TELEMLINK_SCHEMA", default_value = DEFAULT_SCHEMA_FILE)]
    pub schema: PathBuf,
    /// Fail instead of creating a missing schema file.
    #[arg(long)]
    pub no_template: bool,
}

impl SchemaSource {
    pub fn load(&self) -> CliResult<Schema> {
        let options = LoadOptions {
            materialize_template: !self.no_template,
            ..LoadOptions::default()
        };
        load_with_options(&self.schema, &options)
            .map_err(|err| schema_error("schema load failed", err))
    }

    pub fn path(&self) -> &Path {
        &self.schema
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub source: SchemaSource,
    /// Serial port to read, or `auto` to pick the first port matching --port-pattern.
    #[arg(long, value_name = "PORT|auto", conflicts_with = "udp", required_unless_present = "udp")]
    pub serial: Option<String>,
    /// Device address to read over UDP (e.g. 192.168.4.1:5000).
    #[arg(long, value_name = "ADDR")]
    pub udp: Option<String>,
    /// Serial line rate.
    #[cfg(feature = "serial")]
    #[arg(long, default_value_t = 115_200)]
    pub baud: u32,
    /// Port descriptor substring used by `--serial auto`.
    #[cfg(feature = "serial")]
    #[arg(long, default_value = telemlink_transport::DEFAULT_PORT_PATTERN)]
    pub port_pattern: String,
    /// Exit after printing N records.
    #[arg(long)]
    pub count: Option<usize>,
    /// Exit after this long (e.g. 30s, 500ms).
    #[arg(long)]
    pub duration: Option<String>,
    /// Records buffered before the reader reports an overrun.
    #[arg(long, default_value_t = 100)]
    pub queue_capacity: usize,
    /// Transport read timeout; bounds how fast a stop takes effect.
    #[arg(long, default_value = "1s")]
    pub read_timeout: String,
    /// Timestamp records from the wall clock instead of the monotonic clock.
    #[arg(long)]
    pub wall_clock: bool,
    /// Reopen the transport after it is lost and keep streaming.
    #[arg(long)]
    pub reconnect: bool,
    /// Delay between reconnect attempts.
    #[arg(long, default_value = "1s")]
    pub reconnect_delay: String,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub source: SchemaSource,
    /// Local address to accept a receiver on.
    #[arg(long, default_value = "127.0.0.1:5005")]
    pub bind: String,
    /// Frames per second.
    #[arg(long, default_value_t = 100.0)]
    pub rate: f64,
    /// Exit after sending N frames in total.
    #[arg(long)]
    pub count: Option<u64>,
    /// Exit after the first session ends instead of waiting for a new START.
    #[arg(long)]
    pub once: bool,
    /// Give up if no receiver sends START within this long (e.g. 10s).
    #[arg(long)]
    pub wait_timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct SchemaArgs {
    #[command(flatten)]
    pub source: SchemaSource,
}

#[cfg(feature = "serial")]
#[derive(Args, Debug)]
pub struct PortsArgs {
    /// Only list ports whose name or description contains this text.
    #[arg(long)]
    pub filter: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else if let Some(num) = input.strip_suffix('m') {
        (num, "m")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value.saturating_mul(60))),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}

pub(crate) fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
