//! Keyboard state for the swim controls.
//!
//! Terminals deliver key presses and autorepeats but usually no releases,
//! so each control key arms a short hold window that repeats keep
//! extending. A key counts as held until its window lapses or an explicit
//! release arrives.

use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use minnow_core::ControlIntent;

/// How long a single press keeps its control asserted without a repeat.
pub const DEFAULT_HOLD_WINDOW: Duration = Duration::from_millis(220);

/// Tracks held swim keys and snapshots them into a [`ControlIntent`].
///
/// Space thrusts; `w`/`a`/`s`/`d` and the arrow keys steer.
#[derive(Debug)]
pub struct IntentTracker {
    hold_window: Duration,
    thrust_until: Option<Instant>,
    pitch_up_until: Option<Instant>,
    yaw_left_until: Option<Instant>,
    pitch_down_until: Option<Instant>,
    yaw_right_until: Option<Instant>,
}

impl IntentTracker {
    #[must_use]
    pub fn new(hold_window: Duration) -> Self {
        Self {
            hold_window,
            thrust_until: None,
            pitch_up_until: None,
            yaw_left_until: None,
            pitch_down_until: None,
            yaw_right_until: None,
        }
    }

    /// Route one key event into the tracker. Returns whether the event was
    /// a swim control; callers keep their own bindings away from those.
    pub fn observe(&mut self, key: &KeyEvent, now: Instant) -> bool {
        let slot = match key.code {
            KeyCode::Char(' ') => &mut self.thrust_until,
            KeyCode::Up => &mut self.pitch_up_until,
            KeyCode::Left => &mut self.yaw_left_until,
            KeyCode::Down => &mut self.pitch_down_until,
            KeyCode::Right => &mut self.yaw_right_until,
            KeyCode::Char(c) => match c.to_ascii_lowercase() {
                'w' => &mut self.pitch_up_until,
                'a' => &mut self.yaw_left_until,
                's' => &mut self.pitch_down_until,
                'd' => &mut self.yaw_right_until,
                _ => return false,
            },
            _ => return false,
        };

        match key.kind {
            KeyEventKind::Press | KeyEventKind::Repeat => *slot = Some(now + self.hold_window),
            KeyEventKind::Release => *slot = None,
        }
        true
    }

    /// Controls still held as of `now`. Reading disarms nothing.
    #[must_use]
    pub fn snapshot(&self, now: Instant) -> ControlIntent {
        ControlIntent {
            thrust: Self::armed(self.thrust_until, now),
            pitch_up: Self::armed(self.pitch_up_until, now),
            yaw_left: Self::armed(self.yaw_left_until, now),
            pitch_down: Self::armed(self.pitch_down_until, now),
            yaw_right: Self::armed(self.yaw_right_until, now),
        }
    }

    /// Drop every held control.
    pub fn clear(&mut self) {
        self.thrust_until = None;
        self.pitch_up_until = None;
        self.yaw_left_until = None;
        self.pitch_down_until = None;
        self.yaw_right_until = None;
    }

    fn armed(until: Option<Instant>, now: Instant) -> bool {
        until.is_some_and(|deadline| now <= deadline)
    }
}

impl Default for IntentTracker {
    fn default() -> Self {
        Self::new(DEFAULT_HOLD_WINDOW)
    }
}
