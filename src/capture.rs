use crate::cache::SampleCache;
use crate::config::CaptureParams;
use crate::hid::{HidHandle, HidTransport};
use crate::keepalive::KeepAlive;
use crate::protocol::{self, READ_SIZE, REPORT_BUFFER_SIZE};
use crate::types::{CaptureState, EnvScale};
use crate::{Result, SensorError};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Handle to the background capture thread.
///
/// The thread moves Idle -> Running -> Stopped exactly once. Dropping the
/// stop sender is the cancellation signal; the thread notices it between two
/// reads, so `stop` returns within one read timeout plus decode time.
pub struct CaptureLoop {
    stop_tx: Option<Sender<()>>,
    state: Arc<AtomicU8>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl CaptureLoop {
    /// Spawn the capture thread on an already streaming transport.
    pub(crate) fn start<H: HidHandle + 'static>(
        transport: Arc<HidTransport<H>>,
        cache: Arc<SampleCache>,
        params: &CaptureParams,
    ) -> Result<CaptureLoop> {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let state = Arc::new(AtomicU8::new(CaptureState::Idle as u8));
        let state_clone = state.clone();
        let worker = CaptureWorker::new(transport, cache, params);

        let thread = std::thread::Builder::new()
            .name("zed-sensors-capture".into())
            .spawn(move || worker.run(stop_rx, state_clone))
            .map_err(|e| SensorError::Spawn(e.to_string()))?;

        Ok(CaptureLoop {
            stop_tx: Some(stop_tx),
            state,
            thread: Some(thread),
        })
    }

    pub fn state(&self) -> CaptureState {
        CaptureState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.state() == CaptureState::Running
    }

    /// Signal the thread and wait for it to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        drop(self.stop_tx.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Sensor capture thread panicked");
            }
        }
        self.state.store(CaptureState::Stopped as u8, Ordering::Release);
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// What a single loop iteration did with the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// A data report was decoded and published.
    Published,
    /// Something arrived but was not a complete data report.
    Discarded,
    /// Read timed out or failed.
    NoData,
}

pub(crate) struct CaptureWorker<H: HidHandle> {
    transport: Arc<HidTransport<H>>,
    cache: Arc<SampleCache>,
    keepalive: KeepAlive,
    read_timeout_ms: i32,
    env_scale: EnvScale,
    buf: [u8; REPORT_BUFFER_SIZE],
}

impl<H: HidHandle> CaptureWorker<H> {
    pub fn new(
        transport: Arc<HidTransport<H>>,
        cache: Arc<SampleCache>,
        params: &CaptureParams,
    ) -> Self {
        Self {
            transport,
            cache,
            keepalive: KeepAlive::new(params.keepalive),
            read_timeout_ms: params.read_timeout_ms,
            env_scale: params.env_scale,
            buf: [0u8; REPORT_BUFFER_SIZE],
        }
    }

    /// One iteration: keepalive bookkeeping, one timed read, decode, publish.
    pub fn step(&mut self) -> Step {
        if self.keepalive.tick() {
            // best effort, failures are logged by the transport
            self.transport.send_ping();
        }

        let len = match self
            .transport
            .read_report(&mut self.buf[..READ_SIZE], self.read_timeout_ms)
        {
            Ok(0) => return Step::NoData,
            Ok(n) => n.min(READ_SIZE),
            Err(e) => {
                log::debug!("Sensor read error: {}", e);
                return Step::NoData;
            }
        };

        match protocol::decode_sensor_report(&self.buf[..len], self.env_scale) {
            Ok(frame) => {
                self.cache.publish(&frame);
                Step::Published
            }
            Err(e) => {
                log::trace!("Discarding report: {}", e);
                Step::Discarded
            }
        }
    }

    fn run(mut self, stop: Receiver<()>, state: Arc<AtomicU8>) {
        state.store(CaptureState::Running as u8, Ordering::Release);
        log::info!("Sensor capture started");

        loop {
            match stop.try_recv() {
                Err(TryRecvError::Empty) => {}
                Ok(()) | Err(TryRecvError::Disconnected) => {
                    log::info!("Sensor capture stopping (stop requested)");
                    break;
                }
            }
            self.step();
        }

        state.store(CaptureState::Stopped as u8, Ordering::Release);
    }
}
