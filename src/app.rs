// src/app.rs
use crate::ui::{ProjectionSink, UIComponents};

use anyhow::{Context, Result};
use eframe::egui;
use image::DynamicImage;
use nalgebra::Vector3;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use morph_tree::config::MorphConfig;
use morph_tree::data::{default_output_dir, SessionRecorder};
use morph_tree::detector::{HandDetector, HandPose, SimControl, SimulatedDetector};
use morph_tree::layout::Layout;
use morph_tree::mode::{Mode, ModeChannel};
use morph_tree::morph::MorphEngine;
use morph_tree::tracking::{HandTracker, Liveness};

/// What the keyboard-driven simulated hand is currently doing.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SimHand {
    fingers: Option<u8>,
    center: (f64, f64),
    second_hand: bool,
}

impl SimHand {
    fn poses(&self) -> Vec<HandPose> {
        let Some(fingers) = self.fingers else {
            return Vec::new();
        };
        let (x, y) = self.center;
        let mut poses = vec![HandPose::with_fingers(x, y, fingers)];
        if self.second_hand {
            poses.push(HandPose::closed(1.0 - x, y));
        }
        poses
    }
}

pub struct MorphTreeApp {
    config: MorphConfig,
    tracker: HandTracker,
    channel: ModeChannel,
    sim: SimControl,
    sim_hand: SimHand,
    engine: MorphEngine,
    sink: ProjectionSink,
    recorder: SessionRecorder,
    is_recording: bool,
    recording_start: Option<Instant>,
    ui_components: UIComponents,
    camera_frame: DynamicImage,
    focus: Vector3<f32>,
    extent: f32,
    started: Instant,
    last_frame: Instant,
    status_message: Option<String>,
}

impl MorphTreeApp {
    pub fn new(config: MorphConfig) -> Result<Self> {
        let layout = Layout::build(&config.layout).context("building layouts")?;
        info!(elements = layout.element_count(), "layouts generated");

        let initial = config.tracking.initial_mode;
        let channel = ModeChannel::new(initial);
        let mut tracker = HandTracker::new(
            config.gesture.clone(),
            &config.tracking,
            channel.clone(),
            Liveness::new(),
        );
        let (detector, sim) = SimulatedDetector::new();
        tracker.initialize(move || Ok(Box::new(detector) as Box<dyn HandDetector>));

        let focus = Vector3::new(0.0, config.layout.focal_height, 0.0);
        let extent = config.layout.scatter_radius.max(config.layout.cone_height * 0.5) * 1.05;
        let engine = MorphEngine::new(layout, config.animation.clone(), initial);
        let now = Instant::now();

        Ok(Self {
            config,
            tracker,
            channel,
            sim,
            sim_hand: SimHand {
                fingers: None,
                center: (0.5, 0.5),
                second_hand: false,
            },
            engine,
            sink: ProjectionSink::new(),
            recorder: SessionRecorder::new(default_output_dir(), None),
            is_recording: false,
            recording_start: None,
            ui_components: UIComponents::new(),
            camera_frame: DynamicImage::new_rgb8(1, 1),
            focus,
            extent,
            started: now,
            last_frame: now,
            status_message: None,
        })
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        let pressed = |key| ctx.input(|i| i.key_pressed(key));

        if pressed(egui::Key::O) {
            self.sim_hand.fingers = Some(4);
        }
        if pressed(egui::Key::C) {
            self.sim_hand.fingers = Some(0);
        }
        if pressed(egui::Key::Num2) {
            self.sim_hand.fingers = Some(2);
        }
        if pressed(egui::Key::N) {
            self.sim_hand.fingers = None;
        }
        if pressed(egui::Key::T) {
            self.sim_hand.second_hand = !self.sim_hand.second_hand;
        }
        if pressed(egui::Key::X) {
            let failing = !self.sim.is_failing();
            self.sim.set_failing(failing);
            info!(failing, "simulated detector fault toggled");
        }
        if pressed(egui::Key::F) {
            self.force_mode(Mode::Formed);
        }
        if pressed(egui::Key::S) {
            self.force_mode(Mode::Scattered);
        }
        if pressed(egui::Key::R) {
            self.toggle_recording(Instant::now());
        }
    }

    fn force_mode(&mut self, mode: Mode) {
        let Some(transition) = self.tracker.override_mode(mode) else {
            return;
        };
        self.status_message = Some(format!("Forced {}", mode));
        if let Some(timestamp) = self.recording_time(Instant::now()) {
            let snapshot = self.channel.snapshot();
            self.recorder
                .record_override(transition, &snapshot, timestamp, Some(&self.engine));
        }
    }

    fn ingest(&mut self, now: Instant) {
        self.sim.set_hands(self.sim_hand.poses());
        self.tracker.submit_frame(self.camera_frame.clone());
        let Some(report) = self.tracker.poll(now) else {
            return;
        };
        if let Some(timestamp) = self.recording_time(now) {
            self.recorder.record(&report, timestamp, Some(&self.engine));
        }
    }

    /// Seconds into the current recording, or `None` while not recording.
    fn recording_time(&self, now: Instant) -> Option<f64> {
        if !self.is_recording {
            return None;
        }
        let start = self.recording_start.unwrap_or(self.started);
        Some(now.saturating_duration_since(start).as_secs_f64())
    }

    fn recording_duration(&self) -> Duration {
        self.recording_start
            .map(|start| start.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    fn toggle_recording(&mut self, now: Instant) {
        self.is_recording = !self.is_recording;

        if self.is_recording {
            self.recorder.start_new_session(None);
            self.recording_start = Some(now);
            info!(session = self.recorder.session_name(), "recording started");
        } else {
            self.recording_start = None;
            if self.recorder.is_empty() {
                self.status_message = Some("Nothing recorded".to_string());
            } else {
                self.export_session();
            }
            // Exported rows are released; the next recording gets a fresh name.
            self.recorder.start_new_session(None);
        }
    }

    fn export_session(&mut self) {
        let result = self
            .recorder
            .export_csv()
            .and_then(|csv| self.recorder.write_summary().map(|_| csv));
        self.status_message = Some(match result {
            Ok(path) => format!("Saved {}", path.display()),
            Err(e) => {
                warn!(error = %e, "session export failed");
                format!("Export failed: {:#}", e)
            }
        });
    }

    fn render_side_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("status").min_width(260.0).show(ctx, |ui| {
            ui.add_space(10.0);
            ui.heading("Gesture");
            ui.label(self.tracker.status().to_string());
            ui.add_space(6.0);

            let snapshot = self.channel.snapshot();
            self.ui_components
                .draw_mode_indicator(ui, snapshot.mode, self.engine.overall_progress());

            let threshold = self.config.gesture.confidence_frames;
            let counters = self.tracker.classifier().counters();
            self.ui_components
                .draw_confidence_bar(ui, "Open  ", counters.open_run, threshold);
            self.ui_components
                .draw_confidence_bar(ui, "Closed", counters.closed_run, threshold);

            if let Some(report) = self.tracker.last_report() {
                ui.label(format!("Observation: {}", report.observation.as_str()));
                if let Some(feature) = report.feature {
                    ui.label(format!("Extended fingers: {}", feature.extended_finger_count));
                }
            }

            ui.add_space(6.0);
            self.ui_components.draw_hand_marker(
                ui,
                snapshot.hand_position.map(|p| (p.x, p.y)),
                snapshot.two_hands,
            );
            if snapshot.two_hands {
                ui.colored_label(self.ui_components.theme.warning, "Two hands visible");
            }
            if self.sim.is_failing() {
                ui.colored_label(self.ui_components.theme.error, "Detector fault injected");
            }

            ui.separator();
            ui.heading("Override");
            ui.horizontal(|ui| {
                if ui.button("Form tree").clicked() {
                    self.force_mode(Mode::Formed);
                }
                if ui.button("Scatter").clicked() {
                    self.force_mode(Mode::Scattered);
                }
            });

            ui.separator();
            ui.heading("Groups");
            for group in self.engine.groups() {
                ui.label(format!("{:<10} {:>5.1}%", group.kind().as_str(), group.progress() * 100.0));
            }
            ui.label(format!("Rendered frames: {}", self.sink.frames()));
            let metrics = self.tracker.metrics();
            ui.label(format!(
                "Detection: {:.1} Hz, {:.2} ms, dropped {}, errors {}",
                metrics.detection_rate, metrics.avg_processing_ms, metrics.frames_dropped, metrics.detector_errors
            ));

            ui.separator();
            ui.horizontal(|ui| {
                if ui.button("Export session").clicked() {
                    self.export_session();
                }
                if ui.button("Folder...").clicked() {
                    if let Some(dir) = rfd::FileDialog::new()
                        .set_directory(self.recorder.output_dir())
                        .pick_folder()
                    {
                        self.recorder.set_output_dir(dir);
                    }
                }
            });
            ui.small(self.recorder.output_dir().display().to_string());
            if let Some(message) = &self.status_message {
                ui.label(message);
            }

            ui.separator();
            ui.small("O open · C closed · 2 ambiguous · N no hand");
            ui.small("T second hand · X detector fault · F/S force mode · R record");
        });
    }

    fn render_control_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("controls").show(ctx, |ui| {
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                let record_btn = if self.is_recording {
                    ui.add_sized(
                        [120.0, 32.0],
                        egui::Button::new("⏹ Stop").fill(self.ui_components.theme.error),
                    )
                } else {
                    ui.add_sized(
                        [120.0, 32.0],
                        egui::Button::new("⏺ Record").fill(self.ui_components.theme.success),
                    )
                };
                if record_btn.clicked() {
                    self.toggle_recording(Instant::now());
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if self.is_recording {
                        let secs = self.recording_duration().as_secs();
                        ui.label(
                            egui::RichText::new(format!(
                                "Recording: {:02}:{:02} · {} rows",
                                secs / 60,
                                secs % 60,
                                self.recorder.records().len()
                            ))
                            .color(self.ui_components.theme.error),
                        );
                    }
                });
            });
            ui.add_space(6.0);
        });
    }

    fn render_scene(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let (rect, response) = ui.allocate_exact_size(ui.available_size(), egui::Sense::hover());
            if let Some(pos) = response.hover_pos() {
                self.sim_hand.center = (
                    ((pos.x - rect.left()) / rect.width()) as f64,
                    ((pos.y - rect.top()) / rect.height()) as f64,
                );
            }
            let view = self.engine.parallax().rotation();
            self.sink
                .paint(ui.painter(), rect, self.focus, self.extent, view);
        });
    }
}

impl eframe::App for MorphTreeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.handle_keys(ctx);
        self.ingest(now);

        let snapshot = self.channel.snapshot();
        self.engine.frame(dt, &snapshot, &mut self.sink);

        self.render_control_panel(ctx);
        self.render_side_panel(ctx);
        self.render_scene(ctx);

        ctx.request_repaint();
    }
}

impl Drop for MorphTreeApp {
    fn drop(&mut self) {
        self.tracker.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(dir: &std::path::Path) -> MorphTreeApp {
        let mut config = MorphConfig::default();
        config.layout.foliage_count = 40;
        config.layout.ornament_count = 10;
        config.layout.light_count = 10;
        config.tracking.min_interval_ms = 0;
        let mut app = MorphTreeApp::new(config).expect("app");
        app.recorder.set_output_dir(dir);
        app.sim_hand.fingers = Some(4);
        app
    }

    fn exported_logs(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
        std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path().join("mode_log.csv"))
                    .filter(|p| p.exists())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn frames_are_recorded_only_while_recording() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut app = app(dir.path());
        let start = Instant::now();

        for i in 0..5 {
            app.ingest(start + Duration::from_millis(i * 40));
        }
        assert!(app.recorder.is_empty());
        assert!(app.tracker.metrics().frames_processed >= 5);

        app.toggle_recording(start + Duration::from_millis(200));
        for i in 0..4 {
            app.ingest(start + Duration::from_millis(240 + i * 40));
        }
        assert_eq!(app.recorder.records().len(), 4);
        let first = &app.recorder.records()[0];
        assert!((first.timestamp - 0.04).abs() < 1e-9);

        app.toggle_recording(start + Duration::from_millis(400));
        assert!(!app.is_recording);
        assert!(app.recorder.is_empty());
        let logs = exported_logs(dir.path());
        assert_eq!(logs.len(), 1);
        let text = std::fs::read_to_string(&logs[0]).expect("read csv");
        assert_eq!(text.lines().count(), 5);

        app.ingest(start + Duration::from_millis(440));
        assert!(app.recorder.is_empty());
    }

    #[test]
    fn stopping_an_empty_recording_writes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut app = app(dir.path());
        let now = Instant::now();
        app.toggle_recording(now);
        app.toggle_recording(now);
        assert!(exported_logs(dir.path()).is_empty());
        assert_eq!(app.status_message.as_deref(), Some("Nothing recorded"));
    }

    #[test]
    fn forced_modes_are_recorded_with_their_transition() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut app = app(dir.path());

        app.force_mode(Mode::Scattered);
        assert!(app.recorder.is_empty());

        app.toggle_recording(Instant::now());
        app.force_mode(Mode::Formed);
        app.force_mode(Mode::Formed);

        let rows = app.recorder.records();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].observation, "override");
        assert_eq!(rows[0].transition.as_deref(), Some("scattered->formed"));
        assert_eq!(app.recorder.summary().transitions, 1);
    }
}
