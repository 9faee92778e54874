//! Free-running acquisition task for one instrument.
//!
//! The control layer never touches the [`Instrument`] while its worker runs.
//! It sends [`WorkerCommand`]s, which are applied at the top of the next
//! acquisition cycle, and reads [`WorkerEvent`]s from a channel shared by all
//! workers.

use crate::correction::DarkReference;
use crate::derived::Spectrum;
use crate::error::SpectroError;
use crate::instrument::Instrument;
use crate::settings::AcquisitionSettings;
use crate::transport::BulkPipe;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Pause after a failed cycle before trying again.
const ERROR_BACKOFF: Duration = Duration::from_millis(250);
/// Pause when the device was busy with another exchange.
const BUSY_BACKOFF: Duration = Duration::from_millis(2);
const COMMAND_QUEUE: usize = 16;

#[derive(Debug, Clone)]
pub enum WorkerCommand {
    ApplySettings(AcquisitionSettings),
    TakeDarkReference,
    SetDarkReference(DarkReference),
    ClearDarkReference,
    TakeLightReference,
    ClearLightReference,
    /// Stop after the current cycle.
    Shutdown,
}

#[derive(Debug)]
pub enum WorkerEvent {
    Spectrum { device: usize, spectrum: Spectrum },
    /// The cycle failed; the worker keeps going.
    Error { device: usize, error: SpectroError },
    Stopped { device: usize },
}

/// Owner side of a running worker.
pub struct WorkerHandle<P: BulkPipe> {
    device: usize,
    name: String,
    commands: mpsc::Sender<WorkerCommand>,
    stop: watch::Sender<bool>,
    task: JoinHandle<Instrument<P>>,
}

impl<P: BulkPipe> WorkerHandle<P> {
    pub fn device(&self) -> usize {
        self.device
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a command for the next cycle. `false` if the worker has exited.
    pub async fn send(&self, command: WorkerCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }

    /// Cancel the cycle in progress and wait for the worker to hand the
    /// instrument back.
    pub async fn stop(self) -> Result<Instrument<P>, SpectroError> {
        let _ = self.stop.send(true);
        self.task
            .await
            .map_err(|e| SpectroError::Protocol(format!("worker task failed: {}", e)))
    }
}

/// Start a worker task that acquires from `instrument` until stopped.
pub fn spawn<P: BulkPipe>(
    device: usize,
    instrument: Instrument<P>,
    events: mpsc::Sender<WorkerEvent>,
) -> WorkerHandle<P> {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);
    let (stop_tx, stop_rx) = watch::channel(false);
    let name = instrument.name();
    let worker = DeviceWorker {
        device,
        instrument,
        commands: command_rx,
        events,
        stop: stop_rx,
    };
    WorkerHandle {
        device,
        name,
        commands: command_tx,
        stop: stop_tx,
        task: tokio::spawn(worker.run()),
    }
}

struct DeviceWorker<P: BulkPipe> {
    device: usize,
    instrument: Instrument<P>,
    commands: mpsc::Receiver<WorkerCommand>,
    events: mpsc::Sender<WorkerEvent>,
    stop: watch::Receiver<bool>,
}

impl<P: BulkPipe> DeviceWorker<P> {
    async fn run(mut self) -> Instrument<P> {
        info!(device = self.device, name = %self.instrument.name(), "Worker started");
        loop {
            if *self.stop.borrow() {
                break;
            }
            match self.apply_pending().await {
                Ok(true) => {}
                Ok(false) => break,
                Err(error) => {
                    if !self.report(error).await {
                        break;
                    }
                    continue;
                }
            }

            let rt = self.instrument.settings().plot_mode.is_reflectance();
            match self.instrument.acquire_until(rt, &mut self.stop).await {
                Ok(Some(spectrum)) => {
                    let event = WorkerEvent::Spectrum {
                        device: self.device,
                        spectrum,
                    };
                    if self.events.send(event).await.is_err() {
                        debug!(device = self.device, "Result consumer gone");
                        break;
                    }
                }
                Ok(None) => break,
                Err(SpectroError::Busy) => tokio::time::sleep(BUSY_BACKOFF).await,
                Err(error) => {
                    if !self.report(error).await {
                        break;
                    }
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }
        let _ = self.events.send(WorkerEvent::Stopped { device: self.device }).await;
        info!(device = self.device, "Worker stopped");
        self.instrument
    }

    async fn report(&self, error: SpectroError) -> bool {
        warn!(device = self.device, error = %error, "Acquisition cycle failed");
        self.events
            .send(WorkerEvent::Error {
                device: self.device,
                error,
            })
            .await
            .is_ok()
    }

    /// Apply every queued command. `false` on shutdown.
    async fn apply_pending(&mut self) -> Result<bool, SpectroError> {
        while let Ok(command) = self.commands.try_recv() {
            debug!(device = self.device, ?command, "Applying command");
            match command {
                WorkerCommand::ApplySettings(settings) => self.instrument.apply_settings(settings).await?,
                WorkerCommand::TakeDarkReference => self.instrument.take_dark_reference().await?,
                WorkerCommand::SetDarkReference(reference) => self.instrument.set_dark_reference(reference),
                WorkerCommand::ClearDarkReference => self.instrument.clear_dark_reference(),
                WorkerCommand::TakeLightReference => self.instrument.take_light_reference().await?,
                WorkerCommand::ClearLightReference => self.instrument.clear_light_reference(),
                WorkerCommand::Shutdown => return Ok(false),
            }
        }
        Ok(true)
    }
}
