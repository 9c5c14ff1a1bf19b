// src/tracking.rs - Landmark ingestion: latest frame in, debounced mode out
use image::DynamicImage;
use serde::Deserialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::classifier::{FrameReport, GestureClassifier, GestureConfig, ModeTransition};
use crate::detector::{DetectorError, HandDetector};
use crate::landmarks::DetectionFrame;
use crate::mode::{Mode, ModeChannel};

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackingConfig {
    /// Minimum spacing between detector calls.
    pub min_interval_ms: u64,
    pub initial_mode: Mode,
    /// Consecutive detector failures before the status reports degraded.
    pub degraded_after_errors: u32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 33,
            initial_mode: Mode::Formed,
            degraded_after_errors: 10,
        }
    }
}

/// Cleared when the owning scene is torn down. Work in flight checks it
/// before touching shared state.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn shutdown(&self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerStatus {
    Initializing,
    Ready,
    /// Running, but the detector keeps failing.
    Degraded(String),
    Unavailable(String),
    Stopped,
}

impl fmt::Display for TrackerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerStatus::Initializing => f.write_str("Starting hand detector..."),
            TrackerStatus::Ready => f.write_str("Hand tracking active"),
            TrackerStatus::Degraded(reason) => write!(f, "Hand tracking degraded: {}", reason),
            TrackerStatus::Unavailable(reason) => write!(f, "Hand tracking unavailable: {}", reason),
            TrackerStatus::Stopped => f.write_str("Hand tracking stopped"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PerformanceMetrics {
    pub avg_processing_ms: f32,
    pub detection_rate: f32,
    pub frames_processed: u64,
    pub frames_dropped: u64,
    pub detector_errors: u64,
    frame_times: VecDeque<f32>,
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self {
            avg_processing_ms: 0.0,
            detection_rate: 0.0,
            frames_processed: 0,
            frames_dropped: 0,
            detector_errors: 0,
            frame_times: VecDeque::with_capacity(30),
        }
    }

    fn record(&mut self, elapsed: Duration) {
        self.frame_times.push_front(elapsed.as_secs_f32());
        if self.frame_times.len() > 30 {
            self.frame_times.pop_back();
        }
        let avg = self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32;
        self.avg_processing_ms = avg * 1000.0;
        self.detection_rate = if avg > 0.0 { 1.0 / avg } else { 0.0 };
        self.frames_processed += 1;
    }
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the detector and the classifier and publishes every result into a
/// [`ModeChannel`].
///
/// Frames are not queued: [`HandTracker::submit_frame`] overwrites any frame
/// that has not been processed yet, so a slow detector always sees the newest
/// image.
pub struct HandTracker {
    detector: Option<Box<dyn HandDetector>>,
    status: TrackerStatus,
    classifier: GestureClassifier,
    channel: ModeChannel,
    liveness: Liveness,
    pending: Option<DynamicImage>,
    min_interval: Duration,
    last_run: Option<Instant>,
    metrics: PerformanceMetrics,
    last_report: Option<FrameReport>,
    consecutive_errors: u32,
    degraded_after: u32,
}

impl HandTracker {
    pub fn new(
        gesture: GestureConfig,
        tracking: &TrackingConfig,
        channel: ModeChannel,
        liveness: Liveness,
    ) -> Self {
        let classifier = GestureClassifier::new(gesture, channel.mode());
        Self {
            detector: None,
            status: TrackerStatus::Initializing,
            classifier,
            channel,
            liveness,
            pending: None,
            min_interval: Duration::from_millis(tracking.min_interval_ms),
            last_run: None,
            metrics: PerformanceMetrics::new(),
            last_report: None,
            consecutive_errors: 0,
            degraded_after: tracking.degraded_after_errors.max(1),
        }
    }

    /// Bring up the detector. Failure is not fatal: the tracker stays in
    /// "no hand" and the mode stays where it is.
    pub fn initialize<F>(&mut self, init: F)
    where
        F: FnOnce() -> Result<Box<dyn HandDetector>, DetectorError>,
    {
        if self.detector.is_some() {
            debug!("hand detector already initialized");
            return;
        }

        match init() {
            Ok(detector) => {
                info!("hand detector ready");
                self.detector = Some(detector);
                self.status = TrackerStatus::Ready;
            }
            Err(e) => {
                warn!(error = %e, "hand detector failed to initialize");
                self.status = TrackerStatus::Unavailable(e.to_string());
            }
        }
    }

    pub fn shutdown(&mut self) {
        self.liveness.shutdown();
        self.detector = None;
        self.pending = None;
        self.status = TrackerStatus::Stopped;
        info!("hand tracker shut down");
    }

    pub fn status(&self) -> &TrackerStatus {
        &self.status
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    pub fn last_report(&self) -> Option<&FrameReport> {
        self.last_report.as_ref()
    }

    pub fn classifier(&self) -> &GestureClassifier {
        &self.classifier
    }

    pub fn channel(&self) -> &ModeChannel {
        &self.channel
    }

    pub fn has_pending_frame(&self) -> bool {
        self.pending.is_some()
    }

    /// Offer the newest captured frame. Any frame still waiting is dropped.
    pub fn submit_frame(&mut self, frame: DynamicImage) {
        if self.pending.replace(frame).is_some() {
            self.metrics.frames_dropped += 1;
        }
    }

    /// Run one ingestion cycle if a frame is waiting and the rate limit
    /// allows it.
    pub fn poll(&mut self, now: Instant) -> Option<FrameReport> {
        if !self.liveness.is_alive() {
            return None;
        }
        if let Some(last) = self.last_run {
            if now.saturating_duration_since(last) < self.min_interval {
                return None;
            }
        }
        let frame = self.pending.take()?;
        self.last_run = Some(now);
        self.process(&frame)
    }

    /// Detect, classify and publish a single frame. Returns `None` when the
    /// tracker was torn down while the detector was running.
    pub fn process(&mut self, frame: &DynamicImage) -> Option<FrameReport> {
        let start = Instant::now();
        let detection = self.detect(frame);

        if !self.liveness.is_alive() {
            debug!("tracker torn down during detection; discarding result");
            return None;
        }

        let report = self.classifier.step(&detection);
        self.metrics.record(start.elapsed());
        self.channel.publish(report.snapshot());
        self.last_report = Some(report);
        Some(report)
    }

    /// Set the mode directly, bypassing gestures.
    pub fn override_mode(&mut self, mode: Mode) -> Option<ModeTransition> {
        let transition = self.classifier.override_mode(mode);
        let mut snapshot = self.channel.snapshot();
        snapshot.mode = mode;
        self.channel.publish(snapshot);
        transition
    }

    fn detect(&mut self, frame: &DynamicImage) -> DetectionFrame {
        let Some(detector) = self.detector.as_mut() else {
            return DetectionFrame::empty();
        };
        match detector.detect(frame) {
            Ok(detection) => {
                if self.consecutive_errors > 0 {
                    self.consecutive_errors = 0;
                    if matches!(self.status, TrackerStatus::Degraded(_)) {
                        info!("hand detection recovered");
                        self.status = TrackerStatus::Ready;
                    }
                }
                detection
            }
            Err(e) => {
                self.metrics.detector_errors += 1;
                self.consecutive_errors = self.consecutive_errors.saturating_add(1);
                warn!(error = %e, "hand detection failed; treating frame as empty");
                if self.consecutive_errors == self.degraded_after {
                    warn!(errors = self.consecutive_errors, "hand detection degraded");
                    self.status = TrackerStatus::Degraded(e.to_string());
                }
                DetectionFrame::empty()
            }
        }
    }
}
