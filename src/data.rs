// src/data.rs - Per-frame session log with CSV export
use anyhow::{Context, Result};
use chrono::Local;
use csv::Writer;
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::classifier::{FrameReport, ModeTransition};
use crate::layout::GroupKind;
use crate::mode::{Mode, ModeSnapshot};
use crate::morph::MorphEngine;

/// Observation label of rows written by [`SessionRecorder::record_override`].
pub const OVERRIDE_OBSERVATION: &str = "override";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionRecord {
    pub timestamp: f64,
    pub frame: u64,
    pub hands: usize,
    pub two_hands: bool,
    pub fingers: Option<u8>,
    pub observation: &'static str,
    pub open_run: u32,
    pub closed_run: u32,
    pub mode: Mode,
    pub transition: Option<String>,
    pub hand_x: Option<f64>,
    pub hand_y: Option<f64>,
    pub foliage_progress: Option<f32>,
    pub ornaments_progress: Option<f32>,
    pub lights_progress: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    /// Ingestion cycles. Override rows are not frames.
    pub frames: usize,
    pub hand_visible_ratio: f64,
    pub transitions: usize,
    pub overrides: usize,
    pub scattered_frames: usize,
    pub formed_frames: usize,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Frames:         {}", self.frames)?;
        writeln!(f, "Hand visible:   {:.1}%", self.hand_visible_ratio * 100.0)?;
        writeln!(f, "Transitions:    {} ({} forced)", self.transitions, self.overrides)?;
        writeln!(f, "Scattered:      {} frames", self.scattered_frames)?;
        write!(f, "Formed:         {} frames", self.formed_frames)
    }
}

pub fn default_output_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.document_dir().map(|p| p.join("MorphTree")))
        .unwrap_or_else(|| PathBuf::from("./output"))
}

/// Collects one [`SessionRecord`] per ingestion cycle.
pub struct SessionRecorder {
    output_dir: PathBuf,
    session_name: String,
    records: Vec<SessionRecord>,
}

impl SessionRecorder {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name.unwrap_or_else(timestamped_name);

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
            records: Vec::new(),
        }
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn set_output_dir(&mut self, dir: impl AsRef<Path>) {
        self.output_dir = dir.as_ref().to_path_buf();
    }

    pub fn records(&self) -> &[SessionRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop everything recorded so far and continue under a new session
    /// name, timestamped now unless one is given.
    pub fn start_new_session(&mut self, session_name: Option<String>) {
        self.session_name = session_name.unwrap_or_else(timestamped_name);
        self.records.clear();
        info!(session = %self.session_name, "session started");
    }

    pub fn record(&mut self, report: &FrameReport, timestamp: f64, engine: Option<&MorphEngine>) {
        let progress = |kind| engine.and_then(|e| e.group(kind)).map(|g| g.progress());
        self.records.push(SessionRecord {
            timestamp,
            frame: self.records.len() as u64,
            hands: report.hand_count,
            two_hands: report.two_hands,
            fingers: report.feature.map(|f| f.extended_finger_count),
            observation: report.observation.as_str(),
            open_run: report.counters.open_run,
            closed_run: report.counters.closed_run,
            mode: report.mode,
            transition: report.transition.map(|t| format!("{}->{}", t.from, t.to)),
            hand_x: report.hand_position.map(|p| p.x),
            hand_y: report.hand_position.map(|p| p.y),
            foliage_progress: progress(GroupKind::Foliage),
            ornaments_progress: progress(GroupKind::Ornaments),
            lights_progress: progress(GroupKind::Lights),
        });
    }

    /// Log a mode forced from outside the classifier. The row carries the
    /// transition label but no finger count or counter state, since the
    /// override clears both runs.
    pub fn record_override(
        &mut self,
        transition: ModeTransition,
        snapshot: &ModeSnapshot,
        timestamp: f64,
        engine: Option<&MorphEngine>,
    ) {
        let progress = |kind| engine.and_then(|e| e.group(kind)).map(|g| g.progress());
        let hands = match (snapshot.hand_position, snapshot.two_hands) {
            (None, _) => 0,
            (Some(_), false) => 1,
            (Some(_), true) => 2,
        };
        self.records.push(SessionRecord {
            timestamp,
            frame: self.records.len() as u64,
            hands,
            two_hands: snapshot.two_hands,
            fingers: None,
            observation: OVERRIDE_OBSERVATION,
            open_run: 0,
            closed_run: 0,
            mode: transition.to,
            transition: Some(format!("{}->{}", transition.from, transition.to)),
            hand_x: snapshot.hand_position.map(|p| p.x),
            hand_y: snapshot.hand_position.map(|p| p.y),
            foliage_progress: progress(GroupKind::Foliage),
            ornaments_progress: progress(GroupKind::Ornaments),
            lights_progress: progress(GroupKind::Lights),
        });
    }

    pub fn summary(&self) -> SessionSummary {
        let frames: Vec<&SessionRecord> = self
            .records
            .iter()
            .filter(|r| r.observation != OVERRIDE_OBSERVATION)
            .collect();
        let total = frames.len();
        let visible = frames.iter().filter(|r| r.hands > 0).count();
        let formed_frames = frames.iter().filter(|r| r.mode == Mode::Formed).count();
        SessionSummary {
            frames: total,
            hand_visible_ratio: if total == 0 { 0.0 } else { visible as f64 / total as f64 },
            transitions: self.records.iter().filter(|r| r.transition.is_some()).count(),
            overrides: self.records.len() - total,
            scattered_frames: total - formed_frames,
            formed_frames,
        }
    }

    pub fn export_csv(&self) -> Result<PathBuf> {
        let csv_path = self.session_dir().join("mode_log.csv");
        if let Some(parent) = csv_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let file = File::create(&csv_path).with_context(|| format!("creating {}", csv_path.display()))?;
        let mut writer = Writer::from_writer(file);
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;

        info!(path = %csv_path.display(), frames = self.records.len(), "session exported");
        Ok(csv_path)
    }

    pub fn write_summary(&self) -> Result<PathBuf> {
        let path = self.session_dir().join("summary.txt");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = format!("Session: {}\n{}\n", self.session_name, self.summary());
        std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    fn session_dir(&self) -> PathBuf {
        self.output_dir.join(&self.session_name)
    }
}

fn timestamped_name() -> String {
    format!("session_{}", Local::now().format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{GestureClassifier, GestureConfig};
    use crate::detector::{synthesize_hand, HandPose};
    use crate::landmarks::DetectionFrame;
    use nalgebra::Vector2;

    fn run(frames: &[Option<u8>]) -> SessionRecorder {
        let mut classifier = GestureClassifier::new(GestureConfig::default(), Mode::Formed);
        let mut recorder = SessionRecorder::new("unused", Some("test".to_string()));
        for (i, fingers) in frames.iter().enumerate() {
            let frame = match fingers {
                Some(n) => DetectionFrame::with_hands(vec![synthesize_hand(&HandPose::with_fingers(0.5, 0.5, *n))]),
                None => DetectionFrame::empty(),
            };
            let report = classifier.step(&frame);
            recorder.record(&report, i as f64 / 30.0, None);
        }
        recorder
    }

    #[test]
    fn summary_counts_visibility_and_transitions() {
        let mut frames = vec![None, None];
        frames.extend(std::iter::repeat(Some(4)).take(8));
        let summary = run(&frames).summary();
        assert_eq!(summary.frames, 10);
        assert!((summary.hand_visible_ratio - 0.8).abs() < 1e-12);
        assert_eq!(summary.transitions, 1);
        // Open run exceeds 5 on the sixth open frame (index 7).
        assert_eq!(summary.formed_frames, 7);
        assert_eq!(summary.scattered_frames, 3);
    }

    #[test]
    fn empty_session_summary() {
        let summary = SessionRecorder::new("unused", None).summary();
        assert_eq!(summary.frames, 0);
        assert_eq!(summary.hand_visible_ratio, 0.0);
    }

    #[test]
    fn records_transition_label() {
        let recorder = run(&[Some(4); 6]);
        let last = recorder.records().last().expect("records");
        assert_eq!(last.transition.as_deref(), Some("formed->scattered"));
        assert_eq!(last.fingers, Some(4));
        assert_eq!(last.foliage_progress, None);
    }

    #[test]
    fn overrides_are_logged_as_transitions_not_frames() {
        let mut recorder = run(&[Some(2), Some(2)]);
        let snapshot = ModeSnapshot {
            mode: Mode::Scattered,
            hand_position: Some(Vector2::new(0.25, 0.75)),
            two_hands: false,
        };
        let transition = ModeTransition {
            from: Mode::Formed,
            to: Mode::Scattered,
        };
        recorder.record_override(transition, &snapshot, 0.1, None);

        let row = recorder.records().last().expect("override row");
        assert_eq!(row.observation, "override");
        assert_eq!(row.mode, Mode::Scattered);
        assert_eq!(row.transition.as_deref(), Some("formed->scattered"));
        assert_eq!(row.hands, 1);
        assert_eq!(row.hand_x, Some(0.25));
        assert_eq!((row.open_run, row.closed_run), (0, 0));

        let summary = recorder.summary();
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.transitions, 1);
        assert_eq!(summary.overrides, 1);
        assert_eq!(summary.formed_frames, 2);
        assert!(summary.to_string().contains("Transitions:    1 (1 forced)"));
    }

    #[test]
    fn new_session_clears_records_and_renames() {
        let mut recorder = run(&[Some(4), None]);
        assert_eq!(recorder.records().len(), 2);

        recorder.start_new_session(Some("second".to_string()));
        assert!(recorder.is_empty());
        assert_eq!(recorder.session_name(), "second");

        recorder.start_new_session(None);
        assert!(recorder.session_name().starts_with("session_"));
    }

    #[test]
    fn exports_csv_and_summary() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut recorder = run(&[Some(0), None, Some(4)]);
        recorder.set_output_dir(dir.path());

        let csv_path = recorder.export_csv().expect("export");
        let text = std::fs::read_to_string(&csv_path).expect("read csv");
        let mut lines = text.lines();
        let header = lines.next().expect("header");
        assert!(header.starts_with("timestamp,frame,hands,two_hands,fingers,observation"));
        assert_eq!(lines.count(), 3);
        assert!(text.contains("no_hand"));

        let summary_path = recorder.write_summary().expect("summary");
        let summary = std::fs::read_to_string(summary_path).expect("read summary");
        assert!(summary.starts_with("Session: test"));
    }
}
