use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use telemlink_frame::{decode_frame, ControlToken, FrameAccumulator, FrameError};
use telemlink_transport::{Transport, TransportError};
use tracing::{debug, error, info, trace, warn};

use crate::error::QueueOverrunError;
use crate::queue::RecordQueue;
use crate::record::RecordDecoder;
use crate::stats::SessionStats;

/// Why a reader thread exited.
#[derive(Debug)]
pub(crate) enum SessionEnd {
    /// The stop flag was observed.
    Stopped { elapsed: f64 },
    /// A read failed; the transport has been closed.
    TransportLost { elapsed: f64, error: TransportError },
    /// The queue was full; STOP was sent and the transport closed.
    Overrun {
        elapsed: f64,
        error: QueueOverrunError,
    },
}

/// Everything one reader thread owns: read, accumulate, split, decode,
/// enqueue, until stopped or the transport fails.
pub(crate) struct Session<T> {
    pub(crate) transport: T,
    pub(crate) accumulator: FrameAccumulator,
    pub(crate) decoder: RecordDecoder,
    pub(crate) queue: RecordQueue,
    pub(crate) stats: Arc<SessionStats>,
    pub(crate) stop: Arc<AtomicBool>,
    pub(crate) read_chunk_size: usize,
    pub(crate) send_control_tokens: bool,
}

impl<T: Transport> Session<T> {
    /// Send START. Called on the coordinator thread before spawning.
    pub(crate) fn announce(&mut self) -> Result<(), TransportError> {
        if self.send_control_tokens {
            let token = ControlToken::Start;
            self.transport.write_all(token.as_bytes())?;
            debug!(
                token = token.name(),
                transport = %self.transport.describe(),
                "control token sent"
            );
        }
        Ok(())
    }

    pub(crate) fn run(mut self) -> SessionEnd {
        let mut buf = vec![0u8; self.read_chunk_size.max(1)];
        debug!(
            transport = %self.transport.describe(),
            carry_over = self.decoder.clock().carry_over(),
            "reader thread started"
        );

        loop {
            if self.stop.load(Ordering::Acquire) {
                let elapsed = self.decoder.clock().elapsed();
                self.send_stop();
                self.close_transport();
                info!(elapsed, "reader stopped");
                return SessionEnd::Stopped { elapsed };
            }

            let n = match self.transport.read(&mut buf) {
                Ok(0) => continue,
                Ok(n) => n,
                Err(error) => {
                    let elapsed = self.decoder.clock().elapsed();
                    warn!(%error, elapsed, "transport lost");
                    self.close_transport();
                    return SessionEnd::TransportLost { elapsed, error };
                }
            };
            self.stats.add_bytes_read(n);
            self.accumulator.extend(&buf[..n]);

            if let Err(overrun) = self.drain_candidates() {
                let elapsed = self.decoder.clock().elapsed();
                error!(
                    capacity = overrun.capacity,
                    elapsed, "record queue overrun; ending session"
                );
                self.send_stop();
                self.close_transport();
                return SessionEnd::Overrun {
                    elapsed,
                    error: overrun,
                };
            }
        }
    }

    fn drain_candidates(&mut self) -> Result<(), QueueOverrunError> {
        loop {
            match self.accumulator.next_candidate() {
                Ok(Some(candidate)) => self.handle_candidate(&candidate)?,
                Ok(None) => return Ok(()),
                Err(FrameError::Overflow { discarded, .. }) => self.stats.add_overflow(discarded),
                Err(err) => {
                    debug!(error = %err, "accumulator error");
                    return Ok(());
                }
            }
        }
    }

    // Per-frame failures are counted and dropped; only a full queue escapes.
    fn handle_candidate(&mut self, candidate: &[u8]) -> Result<(), QueueOverrunError> {
        let payload = match decode_frame(candidate) {
            Ok(payload) => payload,
            Err(FrameError::Empty) => {
                self.stats.drop_empty();
                trace!("empty frame dropped");
                return Ok(());
            }
            Err(err) => {
                self.stats.drop_malformed();
                debug!(error = %err, "malformed frame dropped");
                return Ok(());
            }
        };

        let record = match self.decoder.decode(&payload) {
            Ok(record) => record,
            Err(err) => {
                self.stats.drop_size_mismatch();
                debug!(error = %err, "frame dropped");
                return Ok(());
            }
        };

        self.queue.try_push(record)?;
        self.stats.record_decoded();
        Ok(())
    }

    /// Undo [`announce`](Self::announce) for a session whose thread never
    /// started.
    pub(crate) fn abandon(mut self) {
        self.send_stop();
        self.close_transport();
    }

    fn send_stop(&mut self) {
        if !self.send_control_tokens {
            return;
        }
        let token = ControlToken::Stop;
        match self.transport.write_all(token.as_bytes()) {
            Ok(()) => debug!(token = token.name(), "control token sent"),
            Err(err) => debug!(token = token.name(), error = %err, "control token not sent"),
        }
    }

    fn close_transport(&mut self) {
        if let Err(err) = self.transport.close() {
            debug!(error = %err, "transport close failed");
        }
    }
}

/// A reader thread that could not be created, with the session it would
/// have run.
pub(crate) type SpawnFailure<T> = (io::Error, Option<Session<T>>);

/// Run `session` on a thread from `builder`.
///
/// The session is parked in a slot the thread empties on startup, so when
/// the thread cannot be created the session is handed back instead of being
/// dropped with the closure.
pub(crate) fn spawn<T: Transport + 'static>(
    builder: thread::Builder,
    session: Session<T>,
) -> Result<JoinHandle<SessionEnd>, SpawnFailure<T>> {
    let slot = Arc::new(Mutex::new(Some(session)));
    let thread_slot = Arc::clone(&slot);
    let spawned = builder.spawn(move || {
        match thread_slot.lock().ok().and_then(|mut slot| slot.take()) {
            Some(session) => session.run(),
            // Empty only after a failed spawn, in which case this never runs.
            None => SessionEnd::Stopped { elapsed: 0.0 },
        }
    });
    spawned.map_err(|err| (err, slot.lock().ok().and_then(|mut slot| slot.take())))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use telemlink_schema::Schema;

    use super::*;
    use crate::clock::ClockKind;

    #[derive(Default)]
    struct Recorder {
        written: Arc<Mutex<Vec<u8>>>,
        closed: Arc<AtomicBool>,
    }

    impl Transport for Recorder {
        fn read(&mut self, _buf: &mut [u8]) -> telemlink_transport::Result<usize> {
            thread::sleep(Duration::from_millis(1));
            Ok(0)
        }

        fn write(&mut self, data: &[u8]) -> telemlink_transport::Result<usize> {
            self.written.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }

        fn close(&mut self) -> telemlink_transport::Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn set_read_timeout(&mut self, _timeout: Duration) -> telemlink_transport::Result<()> {
            Ok(())
        }

        fn read_timeout(&self) -> Duration {
            Duration::from_millis(1)
        }

        fn describe(&self) -> String {
            "recorder".to_string()
        }
    }

    fn session(transport: Recorder) -> Session<Recorder> {
        let schema = Arc::new(Schema::from_format_strings(&["f"]).unwrap());
        Session {
            transport,
            accumulator: FrameAccumulator::new(),
            decoder: RecordDecoder::new(schema, ClockKind::Monotonic),
            queue: RecordQueue::new(4),
            stats: Arc::new(SessionStats::default()),
            stop: Arc::new(AtomicBool::new(false)),
            read_chunk_size: 64,
            send_control_tokens: true,
        }
    }

    #[test]
    fn failed_spawn_returns_the_session() {
        let transport = Recorder::default();
        let written = Arc::clone(&transport.written);
        let closed = Arc::clone(&transport.closed);
        let mut session = session(transport);
        session.announce().unwrap();

        // No address space can hold this stack.
        let builder = thread::Builder::new().stack_size(1 << 60);
        let (_err, session) = spawn(builder, session).expect_err("spawn should fail");
        session.expect("session should be handed back").abandon();

        let mut expected = ControlToken::Start.as_bytes().to_vec();
        expected.extend_from_slice(ControlToken::Stop.as_bytes());
        assert_eq!(*written.lock().unwrap(), expected);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn spawned_session_runs_until_stopped() {
        let transport = Recorder::default();
        let closed = Arc::clone(&transport.closed);
        let session = session(transport);
        let stop = Arc::clone(&session.stop);

        let handle = spawn(thread::Builder::new(), session)
            .map_err(|(err, _)| err)
            .unwrap();
        stop.store(true, Ordering::Release);
        assert!(matches!(handle.join().unwrap(), SessionEnd::Stopped { .. }));
        assert!(closed.load(Ordering::SeqCst));
    }
}
