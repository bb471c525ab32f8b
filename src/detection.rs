// Detection sources: where the runtime pulls one frame's detection result from
//
// The detector itself (camera + network) runs in another process and publishes a
// `FrameReport` per processed frame. The runtime only ever asks for the next one.

use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, warn};
use zenoh::handlers::FifoChannelHandler;
use zenoh::pubsub::Subscriber;
use zenoh::sample::Sample;

use crate::messages::FrameReport;

#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid frame report on line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },

    #[error("Zenoh error: {0}")]
    Zenoh(String),
}

/// Pull-based supplier of per-frame detection results
#[allow(async_fn_in_trait)]
pub trait DetectionSource {
    /// Wait for the next frame; `Ok(None)` once a finite source is exhausted
    async fn next_frame(&mut self) -> Result<Option<FrameReport>, DetectionError>;
}

/// Frame reports published by the vision process over zenoh
pub struct ZenohDetectionSource {
    // Keeps the session open for as long as the subscriber lives
    _session: zenoh::Session,
    subscriber: Subscriber<FifoChannelHandler<Sample>>,
}

impl ZenohDetectionSource {
    pub async fn subscribe(session: zenoh::Session, topic: &str) -> Result<Self, DetectionError> {
        let subscriber = session
            .declare_subscriber(topic.to_string())
            .await
            .map_err(|e| DetectionError::Zenoh(e.to_string()))?;
        info!("Subscribed to: {}", topic);

        Ok(Self {
            _session: session,
            subscriber,
        })
    }
}

impl DetectionSource for ZenohDetectionSource {
    async fn next_frame(&mut self) -> Result<Option<FrameReport>, DetectionError> {
        let received = self
            .subscriber
            .recv_async()
            .await
            .map(|sample| sample.payload().to_bytes().into_owned());
        report_from_payload(received).map(Some)
    }
}

/// Turn one received payload into a frame report
///
/// A closed channel is an error: a live detector has no end of stream.
fn report_from_payload<E: std::fmt::Display>(
    received: Result<Vec<u8>, E>,
) -> Result<FrameReport, DetectionError> {
    let payload = received
        .map_err(|e| DetectionError::Zenoh(format!("detection stream closed: {}", e)))?;

    match serde_json::from_slice::<FrameReport>(&payload) {
        Ok(report) => Ok(report),
        Err(e) => {
            // A garbled frame is a frame without a usable detection
            warn!("Failed to parse frame report: {}", e);
            Ok(FrameReport::empty())
        }
    }
}

/// Recorded frame reports, one JSON object per line
pub struct ReplaySource {
    frames: VecDeque<FrameReport>,
    interval: Option<Duration>,
}

impl ReplaySource {
    pub fn from_reports(reports: impl IntoIterator<Item = FrameReport>) -> Self {
        Self {
            frames: reports.into_iter().collect(),
            interval: None,
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, DetectionError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let source = Self::parse(&text)?;
        info!("Replaying {} frames from {}", source.len(), path.display());
        Ok(source)
    }

    pub fn parse(text: &str) -> Result<Self, DetectionError> {
        let mut frames = VecDeque::new();
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let report: FrameReport = serde_json::from_str(line)
                .map_err(|source| DetectionError::Parse { line: i + 1, source })?;
            frames.push_back(report);
        }
        Ok(Self {
            frames,
            interval: None,
        })
    }

    /// Pace playback like a live camera
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl DetectionSource for ReplaySource {
    async fn next_frame(&mut self) -> Result<Option<FrameReport>, DetectionError> {
        if let Some(interval) = self.interval {
            tokio::time::sleep(interval).await;
        }
        let frame = self.frames.pop_front();
        if frame.is_none() {
            debug!("Replay exhausted");
        }
        Ok(frame)
    }
}
