use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use telemlink_reader::{ClockKind, PipelineConfig, PipelineError, PipelineState, ReaderPipeline};
use telemlink_transport::{Transport, UdpConfig, UdpTransport};
use tracing::{info, warn};

use crate::cmd::{install_ctrlc_handler, parse_duration, ListenArgs};
use crate::exit::{pipeline_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{log_stats, print_records, value_columns, OutputFormat};

const DRAIN_INTERVAL: Duration = Duration::from_millis(20);

/// Where records come from. Reopened from scratch on every reconnect.
enum Target {
    #[cfg(feature = "serial")]
    Serial {
        port: String,
        pattern: String,
        config: telemlink_transport::SerialConfig,
    },
    Udp {
        addr: String,
        config: UdpConfig,
    },
}

impl Target {
    fn from_args(args: &ListenArgs, read_timeout: Duration) -> CliResult<Self> {
        if let Some(addr) = &args.udp {
            return Ok(Self::Udp {
                addr: addr.clone(),
                config: UdpConfig {
                    read_timeout,
                    ..UdpConfig::default()
                },
            });
        }

        match &args.serial {
            #[cfg(feature = "serial")]
            Some(port) => Ok(Self::Serial {
                port: port.clone(),
                pattern: args.port_pattern.clone(),
                config: telemlink_transport::SerialConfig {
                    baud_rate: args.baud,
                    read_timeout,
                },
            }),
            #[cfg(not(feature = "serial"))]
            Some(_) => Err(CliError::new(
                USAGE,
                "serial support not compiled in (enable the `serial` feature)",
            )),
            None => Err(CliError::new(USAGE, "one of --serial or --udp is required")),
        }
    }

    fn open(&self) -> CliResult<Box<dyn Transport>> {
        match self {
            #[cfg(feature = "serial")]
            Self::Serial {
                port,
                pattern,
                config,
            } => {
                let path = if port == "auto" {
                    telemlink_transport::find_port(pattern)
                        .map_err(|err| transport_error("port scan failed", err))?
                        .ok_or_else(|| {
                            CliError::new(
                                crate::exit::TRANSPORT_ERROR,
                                format!("no serial port matching '{pattern}'"),
                            )
                        })?
                } else {
                    port.clone()
                };
                let transport = telemlink_transport::SerialTransport::open_with_config(&path, config)
                    .map_err(|err| transport_error("open failed", err))?;
                Ok(Box::new(transport))
            }
            Self::Udp { addr, config } => {
                let transport = UdpTransport::connect_with_config(addr.as_str(), config)
                    .map_err(|err| transport_error("connect failed", err))?;
                Ok(Box::new(transport))
            }
        }
    }
}

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let schema = Arc::new(args.source.load()?);
    let read_timeout = parse_duration(&args.read_timeout)?;
    let reconnect_delay = parse_duration(&args.reconnect_delay)?;
    let deadline = args
        .duration
        .as_deref()
        .map(parse_duration)
        .transpose()?
        .map(|d| Instant::now() + d);
    if args.count == Some(0) {
        return Err(CliError::new(USAGE, "--count must be greater than zero"));
    }

    let target = Target::from_args(&args, read_timeout)?;
    let config = PipelineConfig {
        queue_capacity: args.queue_capacity,
        read_timeout,
        clock: if args.wall_clock {
            ClockKind::WallClock
        } else {
            ClockKind::Monotonic
        },
        ..PipelineConfig::default()
    };

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let columns = value_columns(&schema);
    let mut pipeline = ReaderPipeline::new(Arc::clone(&schema), config);
    pipeline
        .start(target.open()?)
        .map_err(|err| pipeline_error("start failed", err))?;
    info!(bytes_per_frame = schema.byte_size(), "listening");

    let mut printed = 0usize;
    let remaining = |printed: usize| args.count.map(|count| count.saturating_sub(printed));

    let outcome = loop {
        let mut batch = pipeline.drain();
        if let Some(left) = remaining(printed) {
            batch.truncate(left);
        }
        print_records(&batch, &columns, format);
        printed += batch.len();

        if remaining(printed) == Some(0) {
            break Ok(SUCCESS);
        }
        if !running.load(Ordering::SeqCst) {
            info!("interrupted");
            break Ok(SUCCESS);
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break Ok(SUCCESS);
        }

        match pipeline.poll() {
            Ok(PipelineState::Streaming) => thread::sleep(DRAIN_INTERVAL),
            Ok(_) => break Ok(SUCCESS),
            Err(PipelineError::Disconnected { elapsed, source }) if args.reconnect => {
                warn!(error = %source, elapsed, "transport lost; reconnecting");
                if let Err(err) =
                    reconnect(&mut pipeline, &target, reconnect_delay, &running, deadline)
                {
                    break Err(err);
                }
            }
            Err(err) => break Err(pipeline_error("stream failed", err)),
        }
    };

    let stopped = pipeline.stop();
    let mut tail = pipeline.drain();
    if let Some(left) = remaining(printed) {
        tail.truncate(left);
    }
    print_records(&tail, &columns, format);
    log_stats(&pipeline.stats());

    let code = outcome?;
    stopped.map_err(|err| pipeline_error("stop failed", err))?;
    Ok(code)
}

/// Keep reopening the target until the pipeline streams again or the run
/// is over.
fn reconnect(
    pipeline: &mut ReaderPipeline,
    target: &Target,
    delay: Duration,
    running: &AtomicBool,
    deadline: Option<Instant>,
) -> CliResult<()> {
    let mut attempt = 0u32;
    while running.load(Ordering::SeqCst) && !deadline.is_some_and(|d| Instant::now() >= d) {
        thread::sleep(delay);
        attempt += 1;
        let transport = match target.open() {
            Ok(transport) => transport,
            Err(err) => {
                warn!(attempt, error = %err, "reconnect attempt failed");
                continue;
            }
        };
        match pipeline.reconnect(transport) {
            Ok(()) => {
                info!(
                    attempt,
                    carry_over = pipeline.elapsed_time_at_disconnect(),
                    "reconnected"
                );
                return Ok(());
            }
            Err(PipelineError::Transport(err)) => {
                warn!(attempt, error = %err, "reconnect attempt failed");
            }
            Err(err) => return Err(pipeline_error("reconnect failed", err)),
        }
    }
    Ok(())
}
