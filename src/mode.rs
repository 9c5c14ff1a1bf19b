// src/mode.rs - Committed mode and the snapshot shared with the animation side
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Committed layout the scene is heading toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Elements float freely through the surrounding sphere (open hand).
    Scattered,
    /// Elements assemble into the cone (closed hand).
    Formed,
}

impl Mode {
    /// Morph target: 1.0 means fully formed.
    pub fn target(self) -> f32 {
        match self {
            Mode::Scattered => 0.0,
            Mode::Formed => 1.0,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Mode::Scattered => Mode::Formed,
            Mode::Formed => Mode::Scattered,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Scattered => "scattered",
            Mode::Formed => "formed",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything consumers of the gesture side may read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeSnapshot {
    pub mode: Mode,
    /// Last palm centre, normalized frame space. `None` while no hand is visible.
    pub hand_position: Option<Vector2<f64>>,
    pub two_hands: bool,
}

impl ModeSnapshot {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            hand_position: None,
            two_hands: false,
        }
    }

    pub fn hand_valid(&self) -> bool {
        self.hand_position.is_some()
    }
}

/// Shared handle onto the latest [`ModeSnapshot`].
///
/// Writers replace the whole snapshot; readers copy it out. Cloning the
/// channel clones the handle, not the value.
#[derive(Debug, Clone)]
pub struct ModeChannel {
    inner: Arc<Mutex<ModeSnapshot>>,
}

impl ModeChannel {
    pub fn new(initial: Mode) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ModeSnapshot::new(initial))),
        }
    }

    pub fn publish(&self, snapshot: ModeSnapshot) {
        match self.inner.lock() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    pub fn snapshot(&self) -> ModeSnapshot {
        match self.inner.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.snapshot().mode
    }
}
