use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use telemlink_frame::FrameAccumulator;
use telemlink_schema::Schema;
use telemlink_transport::Transport;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::queue::RecordQueue;
use crate::record::{Record, RecordDecoder};
use crate::session::{self, Session, SessionEnd};
use crate::state::PipelineState;
use crate::stats::{SessionStats, StatsSnapshot};

const READER_THREAD_NAME: &str = "telemlink-reader";

struct Worker {
    handle: JoinHandle<SessionEnd>,
    stop: Arc<AtomicBool>,
}

impl Worker {
    fn join(self) -> Result<SessionEnd> {
        self.handle.join().map_err(|_| PipelineError::Panicked)
    }

    fn stop_and_join(self) -> Result<SessionEnd> {
        self.stop.store(true, Ordering::Release);
        self.join()
    }
}

/// Coordinator for one reader thread at a time.
///
/// The pipeline owns the transport from `start`/`reconnect` until the
/// thread exits. The reader thread is joined on every transition out of
/// `Streaming`: by [`poll`](Self::poll) once it has exited on its own, or
/// by [`stop`](Self::stop).
///
/// ```no_run
/// use std::sync::Arc;
/// use telemlink_reader::{PipelineConfig, ReaderPipeline};
/// use telemlink_schema::Schema;
/// use telemlink_transport::UdpTransport;
///
/// let schema = Arc::new(Schema::from_format_strings(&["fff"]).unwrap());
/// let mut pipeline = ReaderPipeline::new(schema, PipelineConfig::default());
/// pipeline.start(UdpTransport::connect("192.168.4.1:5000").unwrap()).unwrap();
/// for record in pipeline.drain() {
///     println!("{:.3} {:?}", record.timestamp, record.values);
/// }
/// pipeline.stop().unwrap();
/// ```
pub struct ReaderPipeline {
    schema: Arc<Schema>,
    config: PipelineConfig,
    queue: RecordQueue,
    stats: Arc<SessionStats>,
    state: PipelineState,
    carry_over: f64,
    elapsed_at_disconnect: Option<f64>,
    worker: Option<Worker>,
}

impl ReaderPipeline {
    pub fn new(schema: Arc<Schema>, config: PipelineConfig) -> Self {
        Self::with_carry_over(schema, config, 0.0)
    }

    /// A pipeline whose timestamps continue from `elapsed` seconds, for
    /// resuming after a previous pipeline was lost.
    pub fn with_carry_over(schema: Arc<Schema>, config: PipelineConfig, elapsed: f64) -> Self {
        let queue = RecordQueue::new(config.queue_capacity);
        Self {
            schema,
            config,
            queue,
            stats: Arc::new(SessionStats::default()),
            state: PipelineState::Idle,
            carry_over: elapsed,
            elapsed_at_disconnect: None,
            worker: None,
        }
    }

    /// Take ownership of `transport`, send START and spawn the reader.
    ///
    /// Only valid from `Idle`. If the transport cannot be prepared it is
    /// closed and the pipeline stays `Idle`.
    pub fn start<T: Transport + 'static>(&mut self, transport: T) -> Result<()> {
        self.connect("start", PipelineState::Idle, transport)
    }

    /// Resume after a disconnect on a fresh transport. Timestamps continue
    /// from [`elapsed_time_at_disconnect`](Self::elapsed_time_at_disconnect).
    pub fn reconnect<T: Transport + 'static>(&mut self, transport: T) -> Result<()> {
        self.connect("reconnect", PipelineState::Disconnected, transport)
    }

    fn connect<T: Transport + 'static>(
        &mut self,
        operation: &'static str,
        from: PipelineState,
        mut transport: T,
    ) -> Result<()> {
        if self.state != from {
            let _ = transport.close();
            return Err(PipelineError::InvalidState {
                operation,
                state: self.state,
            });
        }

        self.state = PipelineState::Connecting;
        info!(
            transport = %transport.describe(),
            carry_over = self.carry_over,
            "connecting"
        );

        if let Err(err) = transport.set_read_timeout(self.config.read_timeout) {
            let _ = transport.close();
            self.state = from;
            return Err(err.into());
        }

        let stop = Arc::new(AtomicBool::new(false));
        let mut session = Session {
            transport,
            accumulator: FrameAccumulator::with_max_buffered(self.config.max_buffered_bytes),
            decoder: RecordDecoder::with_carry_over(
                Arc::clone(&self.schema),
                self.config.clock,
                self.carry_over,
            ),
            queue: self.queue.clone(),
            stats: Arc::clone(&self.stats),
            stop: Arc::clone(&stop),
            read_chunk_size: self.config.read_chunk_size,
            send_control_tokens: self.config.send_control_tokens,
        };
        if let Err(err) = session.announce() {
            let _ = session.transport.close();
            self.state = from;
            return Err(err.into());
        }

        let builder = thread::Builder::new().name(READER_THREAD_NAME.to_string());
        match session::spawn(builder, session) {
            Ok(handle) => {
                self.worker = Some(Worker { handle, stop });
                self.state = PipelineState::Streaming;
                Ok(())
            }
            Err((err, session)) => {
                if let Some(session) = session {
                    session.abandon();
                }
                self.state = from;
                Err(PipelineError::Spawn(err))
            }
        }
    }

    /// Observe the reader thread.
    ///
    /// If it has exited on its own, it is joined and the outcome is
    /// reported exactly once: a lost transport as
    /// [`PipelineError::Disconnected`] (state becomes `Disconnected`), a
    /// queue overrun as [`PipelineError::QueueOverrun`] (state becomes
    /// `Closed`). Otherwise returns the current state.
    pub fn poll(&mut self) -> Result<PipelineState> {
        let finished = self
            .worker
            .as_ref()
            .is_some_and(|worker| worker.handle.is_finished());
        if finished {
            if let Some(worker) = self.worker.take() {
                let end = self.join(worker)?;
                self.settle(end)?;
            }
        }
        Ok(self.state)
    }

    /// Signal the reader to send STOP and exit, join it, and close the
    /// pipeline. Closing an already closed pipeline is a no-op.
    ///
    /// Queued records stay drainable. An overrun that happened before the
    /// stop request and was not yet observed by [`poll`](Self::poll) is
    /// returned here.
    pub fn stop(&mut self) -> Result<()> {
        let result = match self.worker.take() {
            None => Ok(()),
            Some(worker) => {
                worker.stop.store(true, Ordering::Release);
                match self.join(worker) {
                    Ok(SessionEnd::TransportLost { elapsed, error }) => {
                        warn!(%error, "transport lost while stopping");
                        self.mark_disconnect(elapsed);
                        Ok(())
                    }
                    Ok(end) => self.settle(end),
                    Err(err) => Err(err),
                }
            }
        };
        if self.state != PipelineState::Closed {
            info!(stats = ?self.stats.snapshot(), "pipeline closed");
        }
        self.state = PipelineState::Closed;
        result
    }

    /// Every record queued so far, oldest first. Never blocks.
    pub fn drain(&self) -> Vec<Record> {
        self.queue.drain()
    }

    /// Shared handle to the record queue, for a consumer on another thread.
    pub fn queue(&self) -> &RecordQueue {
        &self.queue
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Last observed state. A reader that exited on its own is only
    /// noticed by [`poll`](Self::poll).
    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Elapsed session time captured when the last session ended on a
    /// transport loss or overrun. `None` until that happens.
    pub fn elapsed_time_at_disconnect(&self) -> Option<f64> {
        self.elapsed_at_disconnect
    }

    fn join(&mut self, worker: Worker) -> Result<SessionEnd> {
        worker.join().inspect_err(|_| {
            self.state = PipelineState::Closed;
        })
    }

    fn mark_disconnect(&mut self, elapsed: f64) {
        self.carry_over = elapsed;
        self.elapsed_at_disconnect = Some(elapsed);
    }

    fn settle(&mut self, end: SessionEnd) -> Result<()> {
        match end {
            SessionEnd::Stopped { elapsed } => {
                self.carry_over = elapsed;
                self.state = PipelineState::Closed;
                Ok(())
            }
            SessionEnd::TransportLost { elapsed, error } => {
                self.mark_disconnect(elapsed);
                self.state = PipelineState::Disconnected;
                Err(PipelineError::Disconnected {
                    elapsed,
                    source: error,
                })
            }
            SessionEnd::Overrun { elapsed, error } => {
                self.mark_disconnect(elapsed);
                self.state = PipelineState::Closed;
                Err(PipelineError::QueueOverrun(error))
            }
        }
    }
}

impl Drop for ReaderPipeline {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_and_join();
        }
    }
}
