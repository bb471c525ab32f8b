// Detection-driven control loop
// One tick per detector frame: locate the target, estimate its velocity, recompute every motor,
// then hand the new commands to the sinks. A stop request is only honoured between ticks.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use zenoh::Wait;
use zenoh::pubsub::Publisher;

// local imports
use crate::calibration::{self, CalibrationError};
use crate::config::{ConfigError, SculptureConfig, TOPIC_DETECTIONS, TOPIC_HEALTH, TOPIC_MOTOR_STATE};
use crate::detection::{DetectionError, DetectionSource, ReplaySource, ZenohDetectionSource};
use crate::messages::{FrameReport, RuntimeHealth, SculptureState};
use crate::motor::protocol::{CommandSink, NullSink, SerialLink, TransportError};
use crate::motor::MotorArray;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error(transparent)]
    Detection(#[from] DetectionError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Zenoh error: {0}")]
    Zenoh(String),
}

/// Why a tick left the motors untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleReason {
    NoDetection,
    OtherClass,
    LowConfidence,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Motors were recomputed for a target at `norm_x` moving by `diff_x` since the last one
    Tracked { norm_x: f64, diff_x: f64 },
    Idle(IdleReason),
}

/// State carried from one tick to the next
#[derive(Debug, Clone, PartialEq)]
pub struct ControlLoopState {
    /// Last tracked position in [0, 1], unset until the first detection
    pub previous_normalized_x: Option<f64>,
    pub health: RuntimeHealth,
}

impl Default for ControlLoopState {
    fn default() -> Self {
        Self {
            previous_normalized_x: None,
            health: RuntimeHealth::Idle, // Idle until first detection
        }
    }
}

pub struct ControlLoop {
    motors: MotorArray,
    state: ControlLoopState,
    frame_width: f64,
    confidence_threshold: f64,
    tracked_class: String,
}

impl ControlLoop {
    /// Build the loop from a validated config and one calibrated position per motor
    pub fn new(config: &SculptureConfig, positions: &[i32]) -> Result<Self, RuntimeError> {
        config.validate()?;
        calibration::check_len(positions, config.num_motors)?;

        Ok(Self {
            motors: MotorArray::new(positions, config.curve(), config.bounds(), config.frame_width),
            state: ControlLoopState::default(),
            frame_width: config.frame_width as f64,
            confidence_threshold: config.confidence_threshold,
            tracked_class: config.tracked_class.clone(),
        })
    }

    pub fn motors(&self) -> &MotorArray {
        &self.motors
    }

    pub fn state(&self) -> &ControlLoopState {
        &self.state
    }

    /// Run one tick for the detector's report on the current frame
    pub fn tick(&mut self, report: &FrameReport) -> TickOutcome {
        let outcome = match &report.detection {
            None => TickOutcome::Idle(IdleReason::NoDetection),
            Some(d) if !d.label.eq_ignore_ascii_case(&self.tracked_class) => {
                TickOutcome::Idle(IdleReason::OtherClass)
            }
            Some(d) if d.confidence <= self.confidence_threshold => {
                TickOutcome::Idle(IdleReason::LowConfidence)
            }
            Some(d) => {
                let avg_x = d.bbox.center_x();
                let norm_x = avg_x / self.frame_width;
                // First sighting has no history: treat the target as stationary
                let diff_x = norm_x - self.state.previous_normalized_x.unwrap_or(norm_x);

                self.motors.update(avg_x, diff_x);
                self.state.previous_normalized_x = Some(norm_x);

                TickOutcome::Tracked { norm_x, diff_x }
            }
        };

        self.state.health = match outcome {
            TickOutcome::Tracked { .. } => RuntimeHealth::Tracking,
            TickOutcome::Idle(_) => RuntimeHealth::Idle,
        };
        outcome
    }

    /// Snapshot handed to the sinks after a tracked tick
    pub fn snapshot(&self, norm_x: f64, diff_x: f64) -> SculptureState {
        SculptureState {
            target_x: norm_x,
            velocity: diff_x,
            commands: self.motors.commands(),
        }
    }
}

/// Counters reported when the loop exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub tracked_ticks: u64,
}

/// Drive the control loop until the source runs dry or `stop` turns true
pub async fn run_loop<S: DetectionSource>(
    control: &mut ControlLoop,
    source: &mut S,
    sinks: &mut [Box<dyn CommandSink>],
    stop: &mut watch::Receiver<bool>,
) -> Result<RunSummary, RuntimeError> {
    let mut summary = RunSummary::default();

    for sink in sinks.iter_mut() {
        sink.health(control.state().health)?;
    }

    loop {
        // 1. Wait for the next frame, or leave between ticks on request
        let report = tokio::select! {
            biased;
            _ = stop.wait_for(|&stopped| stopped) => {
                info!("Stop requested, leaving control loop");
                break;
            }
            frame = source.next_frame() => match frame? {
                Some(report) => report,
                None => {
                    info!("Detection source exhausted");
                    break;
                }
            },
        };

        // 2. Update motors (never interrupted)
        let previous_health = control.state().health;
        let outcome = control.tick(&report);
        summary.ticks += 1;

        let health = control.state().health;
        if health != previous_health {
            match health {
                RuntimeHealth::Tracking => info!("Target acquired"),
                RuntimeHealth::Idle => warn!("Target lost ({:?}), holding motors", outcome),
            }
            for sink in sinks.iter_mut() {
                sink.health(health)?;
            }
        }

        // 3. Hand off commands
        match outcome {
            TickOutcome::Tracked { norm_x, diff_x } => {
                summary.tracked_ticks += 1;
                debug!(
                    "Tick {}: x={:.3} dx={:+.4} speeds={:?}",
                    summary.ticks,
                    norm_x,
                    diff_x,
                    control.motors().speeds()
                );
                let state = control.snapshot(norm_x, diff_x);
                for sink in sinks.iter_mut() {
                    sink.send(&state)?;
                }
            }
            TickOutcome::Idle(reason) => debug!("Tick {}: idle ({:?})", summary.ticks, reason),
        }
    }

    Ok(summary)
}

/// Publishes motor state and health over zenoh
pub struct StatePublisher {
    state: Publisher<'static>,
    health: Publisher<'static>,
}

impl StatePublisher {
    pub async fn declare(session: &zenoh::Session) -> Result<Self, RuntimeError> {
        let state = session
            .declare_publisher(TOPIC_MOTOR_STATE)
            .await
            .map_err(|e| RuntimeError::Zenoh(e.to_string()))?;
        let health = session
            .declare_publisher(TOPIC_HEALTH)
            .await
            .map_err(|e| RuntimeError::Zenoh(e.to_string()))?;
        info!("Publishing to: {}, {}", TOPIC_MOTOR_STATE, TOPIC_HEALTH);
        Ok(Self { state, health })
    }
}

impl CommandSink for StatePublisher {
    fn send(&mut self, state: &SculptureState) -> Result<(), TransportError> {
        let state_json = serde_json::to_string(state)?;
        self.state
            .put(state_json)
            .wait()
            .map_err(|e| TransportError::Zenoh(e.to_string()))
    }

    fn health(&mut self, health: RuntimeHealth) -> Result<(), TransportError> {
        let health_json = serde_json::to_string(&health)?;
        self.health
            .put(health_json)
            .wait()
            .map_err(|e| TransportError::Zenoh(e.to_string()))
    }
}

/// Launcher-resolved options for one run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config: SculptureConfig,
    pub calibration_path: PathBuf,
    /// Replay recorded frame reports instead of subscribing to the detector
    pub replay: Option<PathBuf>,
    pub replay_interval: Option<Duration>,
    /// Motor controller serial device; dry run when absent
    pub serial_port: Option<String>,
    pub baud_rate: u32,
    pub publish_state: bool,
    /// Stop on `q` typed in the terminal
    pub keyboard: bool,
}

pub async fn run(options: RunOptions) -> Result<RunSummary, RuntimeError> {
    let config = &options.config;
    config.validate()?;
    let positions = calibration::load(&options.calibration_path, config.num_motors)?;
    let mut control = ControlLoop::new(config, &positions)?;

    info!(
        "Sculpture ready: {} motors, rise speed {}, speeds {:?}",
        control.motors().len(),
        control.motors().rise_speed(),
        config.bounds()
    );

    let session = if options.replay.is_none() || options.publish_state {
        info!("Opening Zenoh session...");
        Some(
            zenoh::open(zenoh::Config::default())
                .await
                .map_err(|e| RuntimeError::Zenoh(e.to_string()))?,
        )
    } else {
        None
    };

    // Sinks
    let mut sinks: Vec<Box<dyn CommandSink>> = Vec::new();
    match &options.serial_port {
        Some(port) => sinks.push(Box::new(SerialLink::open_with_baudrate(
            port,
            options.baud_rate,
            config.num_motors,
        )?)),
        None => {
            info!("No serial port given, dry run");
            sinks.push(Box::new(NullSink));
        }
    }
    if let (true, Some(session)) = (options.publish_state, &session) {
        sinks.push(Box::new(StatePublisher::declare(session).await?));
    }

    // Stop signal
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let stop_tx = Arc::new(stop_tx);
    let ctrl_c = {
        let stop_tx = Arc::clone(&stop_tx);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received");
                stop_tx.send_replace(true);
            }
        })
    };
    let keys = options
        .keyboard
        .then(|| tokio::task::spawn_blocking(watch_quit_key(Arc::clone(&stop_tx))));

    info!("Control loop started");
    let result = drive(&options, session, &mut control, &mut sinks, &mut stop_rx).await;

    // Release the terminal and signal handler whatever the outcome
    stop_tx.send_replace(true);
    ctrl_c.abort();
    if let Some(keys) = keys {
        if let Err(e) = keys.await {
            warn!("Key watcher failed: {}", e);
        }
    }

    let summary = result?;
    info!(
        "Control loop finished: {} ticks, {} tracked",
        summary.ticks, summary.tracked_ticks
    );
    Ok(summary)
}

/// Pick the detection source and run the loop on it
async fn drive(
    options: &RunOptions,
    session: Option<zenoh::Session>,
    control: &mut ControlLoop,
    sinks: &mut [Box<dyn CommandSink>],
    stop: &mut watch::Receiver<bool>,
) -> Result<RunSummary, RuntimeError> {
    if let Some(path) = &options.replay {
        let mut source = ReplaySource::open(path)?;
        if let Some(interval) = options.replay_interval {
            source = source.with_interval(interval);
        }
        return run_loop(control, &mut source, sinks, stop).await;
    }

    let session =
        session.ok_or_else(|| RuntimeError::Zenoh("no session for live detections".into()))?;
    let mut source = ZenohDetectionSource::subscribe(session, TOPIC_DETECTIONS).await?;
    run_loop(control, &mut source, sinks, stop).await
}

/// Poll the terminal for `q` (or Ctrl-C, which raw mode swallows) until a stop is requested
fn watch_quit_key(stop_tx: Arc<watch::Sender<bool>>) -> impl FnOnce() + Send + 'static {
    move || {
        if let Err(e) = enable_raw_mode() {
            warn!("Keyboard stop unavailable: {}", e);
            return;
        }
        info!("Press q to stop");

        while !*stop_tx.borrow() {
            match event::poll(Duration::from_millis(100)) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!("Keyboard polling failed: {}", e);
                    break;
                }
            }
            if let Ok(Event::Key(KeyEvent {
                code,
                kind: KeyEventKind::Press,
                modifiers,
                ..
            })) = event::read()
            {
                let quit = matches!(code, KeyCode::Char('q') | KeyCode::Esc)
                    || (code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL));
                if quit {
                    stop_tx.send_replace(true);
                }
            }
        }

        if let Err(e) = disable_raw_mode() {
            warn!("Failed to restore terminal: {}", e);
        }
    }
}
