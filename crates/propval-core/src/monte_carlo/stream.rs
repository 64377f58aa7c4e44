use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::PropValError;
use crate::types::{Money, Rate};
use crate::PropValResult;

use super::config::MonteCarloInput;
use super::engine::PreparedSimulation;
use super::statistics::{summarize, MonteCarloSummary};

/// Cooperative cancellation flag shared between a caller and a running simulation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Intermediate progress update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Integer percent complete (0..=100)
    pub progress: u8,
    pub completed: u32,
    pub total: u32,
}

/// Terminal event carrying the full results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteEvent {
    pub progress: u8,
    pub done: bool,
    pub total: u32,
    pub npvs: Vec<Money>,
    pub irrs: Vec<Option<Rate>>,
    pub summary: MonteCarloSummary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// One event of a streamed simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SimulationEvent {
    Complete(Box<CompleteEvent>),
    Progress(ProgressEvent),
}

impl SimulationEvent {
    pub fn progress(&self) -> u8 {
        match self {
            SimulationEvent::Complete(event) => event.progress,
            SimulationEvent::Progress(event) => event.progress,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, SimulationEvent::Complete(_))
    }
}

/// Frame an event for a Server-Sent Events response: `data: <json>\n\n`.
pub fn to_sse_frame(event: &SimulationEvent) -> PropValResult<String> {
    Ok(format!("data: {}\n\n", serde_json::to_string(event)?))
}

fn percent(completed: u32, total: u32) -> u8 {
    (u64::from(completed) * 100 / u64::from(total.max(1))).min(100) as u8
}

fn stream_prepared(
    prepared: &PreparedSimulation,
    events: &Sender<SimulationEvent>,
    cancel: &CancellationToken,
) -> PropValResult<()> {
    let mut last_progress: Option<u8> = None;
    let results = prepared.run(cancel, |completed, total| {
        let progress = percent(completed, total);
        if last_progress.is_some_and(|last| progress <= last) {
            return true;
        }
        last_progress = Some(progress);
        events
            .send(SimulationEvent::Progress(ProgressEvent {
                progress,
                completed,
                total,
            }))
            .is_ok()
    })?;

    let npvs = results.npvs();
    let irrs = results.irrs();
    let summary = summarize(&npvs, &irrs)?;
    let total = prepared.num_simulations();
    let warnings = prepared.run_warnings(&results);

    events
        .send(SimulationEvent::Complete(Box::new(CompleteEvent {
            progress: 100,
            done: true,
            total,
            npvs,
            irrs,
            summary,
            warnings,
        })))
        .map_err(|_| {
            cancel.cancel();
            PropValError::Cancelled {
                completed: total,
                requested: total,
            }
        })
}

/// Run a simulation on the calling thread, sending progress events and one
/// final event on `events`.
///
/// A dropped receiver cancels the run. Nothing is sent when the token is
/// already cancelled or the configuration is invalid.
pub fn run_monte_carlo_streaming(
    input: &MonteCarloInput,
    events: &Sender<SimulationEvent>,
    cancel: &CancellationToken,
) -> PropValResult<()> {
    if cancel.is_cancelled() {
        return Err(PropValError::Cancelled {
            completed: 0,
            requested: input.num_simulations,
        });
    }
    let prepared = PreparedSimulation::new(input)?;
    stream_prepared(&prepared, events, cancel)
}

/// Events of a simulation running on a background thread.
///
/// Iterating yields events until the run ends. Dropping the stream cancels
/// the run.
#[derive(Debug)]
pub struct SimulationStream {
    events: Receiver<SimulationEvent>,
    cancel: CancellationToken,
    worker: Option<JoinHandle<PropValResult<()>>>,
}

impl SimulationStream {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the worker and return how the run ended.
    pub fn finish(mut self) -> PropValResult<()> {
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .map_err(|_| PropValError::WorkerFailed("simulation thread panicked".into()))?,
            None => Ok(()),
        }
    }
}

impl Iterator for SimulationStream {
    type Item = SimulationEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.events.recv().ok()
    }
}

impl Drop for SimulationStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Validate `input` and start the simulation on a background thread.
pub fn spawn_monte_carlo(input: MonteCarloInput) -> PropValResult<SimulationStream> {
    let prepared = PreparedSimulation::new(&input)?;
    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel();

    let worker_cancel = cancel.clone();
    let worker = thread::Builder::new()
        .name("propval-monte-carlo".into())
        .spawn(move || stream_prepared(&prepared, &tx, &worker_cancel))
        .map_err(|e| PropValError::WorkerFailed(e.to_string()))?;

    Ok(SimulationStream {
        events: rx,
        cancel,
        worker: Some(worker),
    })
}
