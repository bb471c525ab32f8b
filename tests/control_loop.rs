// End-to-end runs of the control loop over replayed detector output

use std::sync::{Arc, Mutex};

use sculpture_runtime::config::SculptureConfig;
use sculpture_runtime::detection::{DetectionError, DetectionSource, ReplaySource};
use sculpture_runtime::messages::{BoundingBox, Detection, FrameReport, RuntimeHealth, SculptureState};
use sculpture_runtime::motor::protocol::TransportError;
use sculpture_runtime::motor::{decode_frame, encode_frame, CommandSink};
use sculpture_runtime::runtime::{run_loop, ControlLoop, RunSummary, RuntimeError};
use tokio::sync::watch;

const POSITIONS: [i32; 8] = [0, 40, 80, 120, 160, 200, 240, 280];

#[derive(Default)]
struct Recorded {
    frames: Vec<String>,
    states: Vec<SculptureState>,
    health: Vec<RuntimeHealth>,
}

/// Keeps everything it is sent; shares it with the test through an Arc
struct RecordingSink(Arc<Mutex<Recorded>>);

impl CommandSink for RecordingSink {
    fn send(&mut self, state: &SculptureState) -> Result<(), TransportError> {
        let mut recorded = self.0.lock().unwrap();
        recorded.frames.push(encode_frame(&state.commands));
        recorded.states.push(state.clone());
        Ok(())
    }

    fn health(&mut self, health: RuntimeHealth) -> Result<(), TransportError> {
        self.0.lock().unwrap().health.push(health);
        Ok(())
    }
}

/// Fails every send, like a serial port that was unplugged
struct BrokenSink;

impl CommandSink for BrokenSink {
    fn send(&mut self, _state: &SculptureState) -> Result<(), TransportError> {
        Err(TransportError::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "unplugged",
        )))
    }
}

/// Delivers a few frames, then loses its connection to the detector
struct DroppedDetector {
    remaining: Vec<FrameReport>,
}

impl DetectionSource for DroppedDetector {
    async fn next_frame(&mut self) -> Result<Option<FrameReport>, DetectionError> {
        if self.remaining.is_empty() {
            return Err(DetectionError::Zenoh("detection stream closed".into()));
        }
        Ok(Some(self.remaining.remove(0)))
    }
}

fn person_at(center_x: f64) -> FrameReport {
    FrameReport::with_detection(Detection {
        label: "person".into(),
        confidence: 0.8,
        bbox: BoundingBox::new(center_x - 15.0, 20.0, center_x + 15.0, 260.0),
    })
}

fn control() -> ControlLoop {
    let config = SculptureConfig {
        rise_speed: 10.0,
        ..Default::default()
    };
    ControlLoop::new(&config, &POSITIONS).unwrap()
}

async fn replay(
    control: &mut ControlLoop,
    reports: Vec<FrameReport>,
) -> (RunSummary, Arc<Mutex<Recorded>>) {
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    let mut sinks: Vec<Box<dyn CommandSink>> = vec![Box::new(RecordingSink(Arc::clone(&recorded)))];
    let mut source = ReplaySource::from_reports(reports);
    let (_stop_tx, mut stop_rx) = watch::channel(false);

    let summary = run_loop(control, &mut source, &mut sinks, &mut stop_rx)
        .await
        .unwrap();
    (summary, recorded)
}

#[tokio::test]
async fn test_tracked_ticks_emit_decodable_frames() {
    let mut control = control();
    let (summary, recorded) = replay(
        &mut control,
        vec![person_at(150.0), person_at(160.0), person_at(170.0)],
    )
    .await;

    assert_eq!(summary, RunSummary { ticks: 3, tracked_ticks: 3 });

    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.frames.len(), 3);
    for (frame, state) in recorded.frames.iter().zip(&recorded.states) {
        let decoded = decode_frame(frame).unwrap();
        assert_eq!(decoded.len(), POSITIONS.len());
        assert_eq!(decoded, state.commands);
    }
    assert_eq!(recorded.states[2].commands, control.motors().commands());
    assert!(recorded.states[1].velocity > 0.0);
}

#[tokio::test]
async fn test_missing_detections_hold_motors() {
    let mut control = control();
    let mut reports = vec![person_at(100.0)];
    reports.extend(std::iter::repeat_n(FrameReport::empty(), 10));

    let (summary, recorded) = replay(&mut control, reports).await;
    assert_eq!(summary, RunSummary { ticks: 11, tracked_ticks: 1 });

    let recorded = recorded.lock().unwrap();
    // Only the tracked tick produced a command frame
    assert_eq!(recorded.states.len(), 1);
    assert_eq!(recorded.states[0].commands, control.motors().commands());
    assert_eq!(control.state().previous_normalized_x, Some(100.0 / 300.0));
    assert_eq!(
        recorded.health,
        vec![RuntimeHealth::Idle, RuntimeHealth::Tracking, RuntimeHealth::Idle]
    );
}

#[tokio::test]
async fn test_transport_failure_ends_run() {
    let mut control = control();
    let mut sinks: Vec<Box<dyn CommandSink>> = vec![Box::new(BrokenSink)];
    let mut source = ReplaySource::from_reports(vec![person_at(150.0), person_at(151.0)]);
    let (_stop_tx, mut stop_rx) = watch::channel(false);

    let result = run_loop(&mut control, &mut source, &mut sinks, &mut stop_rx).await;
    assert!(result.is_err());
    // The failing tick is the last one: the second frame is never consumed
    assert_eq!(source.len(), 1);
}

#[tokio::test]
async fn test_detection_failure_ends_run() {
    let mut control = control();
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    let mut sinks: Vec<Box<dyn CommandSink>> = vec![Box::new(RecordingSink(Arc::clone(&recorded)))];
    let mut source = DroppedDetector {
        remaining: vec![person_at(150.0)],
    };
    let (_stop_tx, mut stop_rx) = watch::channel(false);

    let result = run_loop(&mut control, &mut source, &mut sinks, &mut stop_rx).await;
    assert!(matches!(result, Err(RuntimeError::Detection(DetectionError::Zenoh(_)))));
    assert_eq!(recorded.lock().unwrap().frames.len(), 1);
}
