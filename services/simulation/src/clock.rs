use crate::error::SimulationError;
use crate::pipeline::{TickPipeline, TickReport};
use shared::config::scaled_interval_ms;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

struct Timer {
    interval_ms: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives [`TickPipeline::tick`] on a repeating timer.
///
/// At most one timer exists at any time. Replacing it cancels the old loop
/// and waits for it to exit before the new one starts; a tick that has
/// already begun always finishes.
pub struct SimulationClock {
    pipeline: Arc<TickPipeline>,
    base_interval_ms: u64,
    interval_ms: AtomicU64,
    timer: Mutex<Option<Timer>>,
}

impl SimulationClock {
    pub fn new(pipeline: Arc<TickPipeline>, base_interval_ms: u64, speed_multiplier: f64) -> Self {
        let base_interval_ms = base_interval_ms.max(1);
        Self {
            pipeline,
            base_interval_ms,
            interval_ms: AtomicU64::new(scaled_interval_ms(base_interval_ms, speed_multiplier)),
            timer: Mutex::new(None),
        }
    }

    pub fn pipeline(&self) -> &Arc<TickPipeline> {
        &self.pipeline
    }

    /// Starts ticking at the configured interval. No-op when running.
    pub async fn start(&self) {
        let mut timer = self.timer.lock().await;
        if timer.is_some() {
            return;
        }
        *timer = Some(self.spawn_timer(self.interval_ms.load(Ordering::SeqCst)));
    }

    pub async fn stop(&self) {
        let mut timer = self.timer.lock().await;
        if let Some(old) = timer.take() {
            shutdown(old).await;
            tracing::info!("Simulation stopped");
        }
    }

    /// Replaces the timer with one firing every `ms` milliseconds and
    /// leaves the clock running. A zero interval is rejected and the current
    /// schedule is kept.
    pub async fn set_interval(&self, ms: u64) -> Result<(), SimulationError> {
        if ms == 0 {
            tracing::error!(interval_ms = ms, "Rejected tick interval");
            return Err(SimulationError::InvalidInterval(
                "interval must be greater than zero".to_string(),
            ));
        }

        let mut timer = self.timer.lock().await;
        if let Some(old) = timer.take() {
            shutdown(old).await;
        }
        self.interval_ms.store(ms, Ordering::SeqCst);
        *timer = Some(self.spawn_timer(ms));
        tracing::info!(interval_ms = ms, "Simulation step interval set");
        Ok(())
    }

    /// Speeds the simulation up or down by scaling the base interval.
    pub async fn set_speed(&self, multiplier: f64) -> Result<u64, SimulationError> {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            tracing::error!(multiplier, "Rejected speed multiplier");
            return Err(SimulationError::InvalidSpeed(multiplier));
        }
        let ms = scaled_interval_ms(self.base_interval_ms, multiplier);
        self.set_interval(ms).await?;
        Ok(ms)
    }

    /// Current tick interval, or `None` while stopped.
    pub async fn interval(&self) -> Option<u64> {
        self.timer.lock().await.as_ref().map(|t| t.interval_ms)
    }

    pub async fn is_running(&self) -> bool {
        self.timer.lock().await.is_some()
    }

    /// Configured interval, whether or not the clock runs.
    pub fn configured_interval(&self) -> u64 {
        self.interval_ms.load(Ordering::SeqCst)
    }

    pub fn tick(&self) -> TickReport {
        self.pipeline.tick()
    }

    pub fn tick_count(&self) -> u64 {
        self.pipeline.tick_count()
    }

    fn spawn_timer(&self, interval_ms: u64) -> Timer {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(
            self.pipeline.clone(),
            Duration::from_millis(interval_ms),
            cancel.clone(),
        ));
        tracing::info!(interval_ms, "Simulation started");
        Timer {
            interval_ms,
            cancel,
            handle,
        }
    }
}

async fn shutdown(timer: Timer) {
    timer.cancel.cancel();
    if let Err(e) = timer.handle.await {
        tracing::warn!(error = %e, "Simulation loop ended abnormally");
    }
}

async fn run(pipeline: Arc<TickPipeline>, period: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick of an interval completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        pipeline.tick();
    }
}
