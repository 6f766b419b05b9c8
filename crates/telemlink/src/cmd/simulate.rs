use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use telemlink_frame::{encode_frame_to_vec, ControlToken};
use telemlink_reader::{encode_values, Value};
use telemlink_schema::{PrimitiveType, Schema};
use telemlink_transport::{Transport, TransportError, UdpConfig, UdpTransport};
use tracing::{debug, info, warn};

use crate::cmd::{install_ctrlc_handler, parse_duration, SimulateArgs};
use crate::exit::{transport_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_simulation_summary, OutputFormat};

/// How often a waiting simulator checks for Ctrl-C.
const ACCEPT_POLL: Duration = Duration::from_millis(100);

/// Read timeout while streaming; bounds how late a STOP is noticed.
const CONTROL_POLL: Duration = Duration::from_millis(5);

#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Stopped,
    PeerGone,
    Interrupted,
    Exhausted,
}

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let schema = args.source.load()?;
    if !args.rate.is_finite() || args.rate <= 0.0 {
        return Err(CliError::new(USAGE, "--rate must be a positive number"));
    }
    if args.count == Some(0) {
        return Err(CliError::new(USAGE, "--count must be greater than zero"));
    }
    let interval = Duration::from_secs_f64(1.0 / args.rate);
    let wait = args.wait_timeout.as_deref().map(parse_duration).transpose()?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let config = UdpConfig {
        read_timeout: ACCEPT_POLL,
        ..UdpConfig::default()
    };

    let mut sessions = 0u64;
    let mut frames_sent = 0u64;
    let outcome = loop {
        let budget = args.count.map(|count| count.saturating_sub(frames_sent));
        if budget == Some(0) {
            break Ok(());
        }

        info!(bind = %args.bind, "simulator waiting for START");
        let accepted = UdpTransport::accept_until(args.bind.as_str(), wait, &config, || {
            !running.load(Ordering::SeqCst)
        });
        let (mut transport, first) = match accepted {
            Ok(accepted) => accepted,
            Err(TransportError::Open { source, .. }) if source.kind() == ErrorKind::Interrupted => {
                break Ok(());
            }
            Err(err) => break Err(transport_error("waiting for receiver failed", err)),
        };

        let peer = transport.peer_addr();
        if ControlToken::parse(&first) != Some(ControlToken::Start) {
            warn!(%peer, bytes = first.len(), "first datagram was not START; ignoring sender");
            close(&mut transport);
            continue;
        }

        sessions += 1;
        info!(%peer, session = sessions, "receiver connected; streaming");
        let streamed = stream(
            &mut transport,
            &schema,
            interval,
            &running,
            budget,
            frames_sent,
        );
        close(&mut transport);

        let (sent, end) = match streamed {
            Ok(streamed) => streamed,
            Err(err) => break Err(err),
        };
        frames_sent += sent;
        info!(%peer, frames = sent, reason = ?end, "session ended");

        if args.once || end != SessionEnd::Stopped {
            break Ok(());
        }
    };

    print_simulation_summary(sessions, frames_sent, format);
    outcome.map(|()| SUCCESS)
}

/// Send frames at a fixed rate until the receiver sends STOP or goes away.
///
/// Returns the number of frames written in this session.
fn stream(
    transport: &mut UdpTransport,
    schema: &Schema,
    interval: Duration,
    running: &AtomicBool,
    budget: Option<u64>,
    first_tick: u64,
) -> CliResult<(u64, SessionEnd)> {
    transport
        .set_read_timeout(CONTROL_POLL)
        .map_err(|err| transport_error("stream setup failed", err))?;

    let mut sent = 0u64;
    let mut buf = [0u8; 64];
    loop {
        if !running.load(Ordering::SeqCst) {
            return Ok((sent, SessionEnd::Interrupted));
        }
        if budget.is_some_and(|budget| sent >= budget) {
            return Ok((sent, SessionEnd::Exhausted));
        }

        let frame = synthetic_frame(schema, first_tick + sent)?;
        match transport.write_all(&frame) {
            Ok(()) => sent += 1,
            Err(TransportError::PeerGone(_)) => return Ok((sent, SessionEnd::PeerGone)),
            Err(err) => return Err(transport_error("send failed", err)),
        }

        let next = Instant::now() + interval;
        loop {
            match transport.read(&mut buf) {
                Ok(0) => {}
                Ok(n) => match ControlToken::parse(&buf[..n]) {
                    Some(ControlToken::Stop) => return Ok((sent, SessionEnd::Stopped)),
                    Some(token) => debug!(token = token.name(), "duplicate token ignored"),
                    None => debug!(bytes = n, "unexpected datagram ignored"),
                },
                Err(TransportError::PeerGone(_)) => return Ok((sent, SessionEnd::PeerGone)),
                Err(err) => return Err(transport_error("control read failed", err)),
            }
            if Instant::now() >= next {
                break;
            }
        }
    }
}

fn synthetic_frame(schema: &Schema, tick: u64) -> CliResult<Vec<u8>> {
    let values: Vec<Vec<Value>> = schema
        .channels()
        .iter()
        .enumerate()
        .map(|(channel_idx, channel)| {
            channel
                .value_fields()
                .enumerate()
                .map(|(field_idx, field)| {
                    synthetic_value(field.primitive(), tick, channel_idx * 8 + field_idx)
                })
                .collect()
        })
        .collect();

    let payload = encode_values(schema, &values)
        .map_err(|err| CliError::new(INTERNAL, format!("synthetic values rejected: {err}")))?;
    encode_frame_to_vec(&payload)
        .map_err(|err| CliError::new(INTERNAL, format!("frame encoding failed: {err}")))
}

/// A slowly varying value that fits every width of its type.
fn synthetic_value(primitive: PrimitiveType, tick: u64, phase: usize) -> Value {
    match primitive {
        PrimitiveType::Float32 | PrimitiveType::Float64 => {
            Value::Float((tick as f64 * 0.05 + phase as f64 * 0.5).sin())
        }
        PrimitiveType::Int8
        | PrimitiveType::Int16
        | PrimitiveType::Int32
        | PrimitiveType::Int64 => Value::Int((tick % 100) as i64 - 50),
        PrimitiveType::Bool => Value::Bool(tick % 2 == 0),
        PrimitiveType::Char => Value::Char(char::from(b'a' + (tick % 26) as u8)),
        PrimitiveType::UInt8
        | PrimitiveType::UInt16
        | PrimitiveType::UInt32
        | PrimitiveType::UInt64
        | PrimitiveType::Pad => Value::UInt(tick % 100),
    }
}

fn close(transport: &mut UdpTransport) {
    if let Err(err) = transport.close() {
        debug!(error = %err, "closing simulator transport failed");
    }
}
