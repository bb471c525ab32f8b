// Fake detector: publishes a synthetic person so the runtime can run without a camera
//
// Keys: A/D nudge the target, S toggles auto sweep, H hides the target, Q quits.
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use sculpture_runtime::config::{FRAME_WIDTH, TOPIC_DETECTIONS, TRACKED_CLASS};
use sculpture_runtime::messages::{BoundingBox, Detection, FrameReport};
use std::time::Duration;
use tracing::info;

const FRAME_PERIOD_MS: u64 = 50; // ~20 fps, like the detector on a laptop camera
const BOX_HALF_WIDTH: f64 = 25.0;
const NUDGE: f64 = 10.0;
const SWEEP_STEP: f64 = 2.0;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_DETECTIONS).await?;

    info!("Controls: A/D=move, S=sweep, H=hide, Q=quit");

    enable_raw_mode()?;
    let result = run_detector(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn run_detector(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let width = FRAME_WIDTH as f64;
    let mut center_x = width / 2.0;
    let mut direction = 1.0;
    let mut sweeping = true;
    let mut visible = true;

    loop {
        if event::poll(Duration::from_millis(FRAME_PERIOD_MS))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                match code {
                    KeyCode::Char('a') if pressed => center_x -= NUDGE,
                    KeyCode::Char('d') if pressed => center_x += NUDGE,
                    KeyCode::Char('s') if pressed => sweeping = !sweeping,
                    KeyCode::Char('h') if pressed => visible = !visible,
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,
                    _ => {}
                }
            }
        }

        if sweeping {
            center_x += direction * SWEEP_STEP;
            if center_x <= 0.0 || center_x >= width {
                direction = -direction;
            }
        }
        center_x = center_x.clamp(0.0, width);

        let report = if visible {
            FrameReport::with_detection(Detection {
                label: TRACKED_CLASS.to_string(),
                confidence: 0.9,
                bbox: BoundingBox::new(center_x - BOX_HALF_WIDTH, 40.0, center_x + BOX_HALF_WIDTH, 280.0),
            })
        } else {
            FrameReport::empty()
        };
        publisher.put(serde_json::to_string(&report)?).await?;
    }

    Ok(())
}
