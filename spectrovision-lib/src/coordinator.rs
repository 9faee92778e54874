//! Near-simultaneous acquisition across several heads.
//!
//! Every head is triggered first, then all of them are waited on together,
//! then each is read in turn. Heads found busy are skipped and retried on the
//! next polling round instead of blocking the others.

use crate::acquisition::{AcquisitionState, wait_settled};
use crate::derived::{Spectrum, merge};
use crate::error::SpectroError;
use crate::geometry::SensorFamily;
use crate::instrument::Instrument;
use crate::transport::BulkPipe;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

const BUSY_POLL_ROUNDS: usize = 50;
const BUSY_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Result for one head, or for a merged VIS+NIR pair.
#[derive(Debug)]
pub struct Measurement {
    /// Indices of the instruments that contributed.
    pub devices: Vec<usize>,
    pub name: String,
    pub result: Result<Spectrum, SpectroError>,
}

pub struct Coordinator<P: BulkPipe> {
    instruments: Vec<Instrument<P>>,
    pair: Option<(usize, usize)>,
}

/// Run `op` on every index in `pending`, retrying the ones that report busy
/// each round until none remain or the rounds run out.
async fn poll_round_robin<T, F, Fut>(pending: Vec<usize>, mut op: F) -> Vec<(usize, Result<T, SpectroError>)>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, SpectroError>>,
{
    let mut done = Vec::with_capacity(pending.len());
    let mut pending = pending;
    for round in 0..=BUSY_POLL_ROUNDS {
        let mut busy = Vec::new();
        for index in pending {
            match op(index).await {
                Err(SpectroError::Busy) if round < BUSY_POLL_ROUNDS => busy.push(index),
                result => done.push((index, result)),
            }
        }
        if busy.is_empty() {
            break;
        }
        trace!(round, busy = busy.len(), "Heads busy, polling again");
        pending = busy;
        tokio::time::sleep(BUSY_POLL_INTERVAL).await;
    }
    done.sort_by_key(|(index, _)| *index);
    done
}

impl<P: BulkPipe> Coordinator<P> {
    pub fn new(instruments: Vec<Instrument<P>>) -> Self {
        Self {
            instruments,
            pair: None,
        }
    }

    pub fn instruments(&self) -> &[Instrument<P>] {
        &self.instruments
    }

    pub fn instruments_mut(&mut self) -> &mut [Instrument<P>] {
        &mut self.instruments
    }

    pub fn into_instruments(self) -> Vec<Instrument<P>> {
        self.instruments
    }

    pub fn pairing(&self) -> Option<(usize, usize)> {
        self.pair
    }

    /// Merge a VIS head and a NIR head into one 340-1100 nm spectrum.
    pub fn pair(&mut self, first: usize, second: usize) -> Result<(), SpectroError> {
        let family = |index: usize| {
            self.instruments
                .get(index)
                .map(Instrument::family)
                .ok_or_else(|| SpectroError::InvalidSetting(format!("no instrument at index {}", index)))
        };
        let families = (family(first)?, family(second)?);
        if !matches!(
            families,
            (SensorFamily::Vis, SensorFamily::Nir) | (SensorFamily::Nir, SensorFamily::Vis)
        ) {
            return Err(SpectroError::InvalidSetting(format!(
                "pairing needs one VIS and one NIR head, got {} and {}",
                families.0, families.1
            )));
        }
        info!(first, second, "Heads paired");
        self.pair = Some((first, second));
        Ok(())
    }

    pub fn unpair(&mut self) {
        self.pair = None;
    }

    /// Longest settle time across all heads.
    pub fn settle_duration(&self) -> Duration {
        self.instruments
            .iter()
            .map(Instrument::settle_duration)
            .max()
            .unwrap_or_default()
    }

    /// One synchronised cycle over every head. `None` if `stop` was raised
    /// between the trigger and collect phases.
    pub async fn acquire_all(&mut self, stop: &mut watch::Receiver<bool>) -> Option<Vec<Measurement>> {
        let links: Vec<_> = self.instruments.iter().map(|i| i.link().clone()).collect();
        let mut outcomes: Vec<Option<Result<Vec<u16>, SpectroError>>> =
            (0..self.instruments.len()).map(|_| None).collect();

        // trigger
        let all: Vec<usize> = (0..links.len()).collect();
        let mut triggered = Vec::with_capacity(all.len());
        for (index, result) in poll_round_robin(all, |i| links[i].start_measurement()).await {
            match result {
                Ok(()) => {
                    self.instruments[index].set_state(AcquisitionState::Requested);
                    triggered.push(index);
                }
                Err(error) => outcomes[index] = Some(Err(error)),
            }
        }
        debug!(triggered = triggered.len(), "Trigger phase complete");

        let timeouts: Vec<Duration> = self.instruments.iter().map(Instrument::integration).collect();
        if !wait_settled(self.settle_duration(), stop).await {
            info!("Acquisition cancelled before collecting");
            for index in triggered {
                self.instruments[index].set_state(AcquisitionState::Idle);
                if let Err(error) = links[index].discard_measurement(timeouts[index]).await {
                    warn!(device = index, error = %error, "Could not discard triggered scan");
                }
            }
            return None;
        }

        // collect
        for (index, result) in
            poll_round_robin(triggered, |i| links[i].acquire_measurement(timeouts[i])).await
        {
            outcomes[index] = Some(result);
        }

        // per-head auto-integration and correction
        let mut spectra: Vec<Option<Result<Spectrum, SpectroError>>> = Vec::with_capacity(outcomes.len());
        for (index, outcome) in outcomes.into_iter().enumerate() {
            let instrument = &mut self.instruments[index];
            let result = match outcome.unwrap_or(Err(SpectroError::Busy)) {
                Ok(counts) => Self::settle_and_correct(instrument, counts, stop).await,
                Err(error) => Err(error),
            };
            match result {
                Ok(None) => return None,
                Ok(Some(spectrum)) => spectra.push(Some(Ok(spectrum))),
                Err(error) => {
                    warn!(device = index, error = %error, "Acquisition failed");
                    instrument.set_state(AcquisitionState::Idle);
                    spectra.push(Some(Err(error)));
                }
            }
        }

        Some(self.assemble(spectra))
    }

    async fn settle_and_correct(
        instrument: &mut Instrument<P>,
        counts: Vec<u16>,
        stop: &mut watch::Receiver<bool>,
    ) -> Result<Option<Spectrum>, SpectroError> {
        let counts = if instrument.auto_integration() {
            match instrument.auto_adjust(counts, stop).await? {
                Some(settled) => settled,
                None => return Ok(None),
            }
        } else {
            counts
        };
        let rt = instrument.settings().plot_mode.is_reflectance();
        instrument.correct_counts(&counts, rt).await.map(Some)
    }

    /// Finish totals, merging the paired heads before their totals are computed.
    fn assemble(&mut self, mut spectra: Vec<Option<Result<Spectrum, SpectroError>>>) -> Vec<Measurement> {
        let mut measurements = Vec::with_capacity(spectra.len());

        if let Some((a, b)) = self.pair {
            let first = spectra[a].take();
            let second = spectra[b].take();
            let name = format!("{} + {}", self.instruments[a].name(), self.instruments[b].name());
            let result = match (first, second) {
                (Some(Ok(first)), Some(Ok(second))) => {
                    let merged = merge(&first, &second).finish(self.instruments[a].settings());
                    self.instruments[a].store(merged.clone());
                    self.instruments[b].store(merged.clone());
                    Ok(merged)
                }
                (Some(Err(error)), _) | (_, Some(Err(error))) => Err(error),
                _ => Err(SpectroError::Busy),
            };
            measurements.push(Measurement {
                devices: vec![a, b],
                name,
                result,
            });
        }

        for (index, slot) in spectra.into_iter().enumerate() {
            let Some(result) = slot else {
                continue;
            };
            let instrument = &mut self.instruments[index];
            let result = result.map(|spectrum| {
                let finished = spectrum.finish(instrument.settings());
                instrument.store(finished.clone());
                finished
            });
            measurements.push(Measurement {
                devices: vec![index],
                name: instrument.name(),
                result,
            });
        }
        measurements
    }
}
