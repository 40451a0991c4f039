//! Pointer input, queued by the host and drained once per frame tick.

use std::collections::VecDeque;

/// Pointer events in canvas pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Button pressed; starts a drag.
    Press { x: f64, y: f64 },
    /// Button released; ends a drag and pans the window.
    Release { x: f64, y: f64 },
    /// Pointer left the canvas; cancels a drag.
    Leave,
    Move { x: f64, y: f64 },
    /// Click with modifiers: ctrl sets the window start, shift the end, both reset.
    Click { x: f64, ctrl: bool, shift: bool },
    /// Wheel notch; positive zooms in.
    Wheel { delta: f64 },
}

/// Canvas size in CSS-like pixels, used to map events into the sample domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
}

impl Canvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn contains_x(&self, x: f64) -> bool {
        x >= 0.0 && x < self.width
    }
}

/// Hover readout shown next to the canvas.
#[derive(Debug, Clone, PartialEq)]
pub enum HoverInfo {
    Inside { seconds: f64, hz: f64 },
    Outside,
}

impl HoverInfo {
    /// `T+1.25s 440 Hz`, or an empty string outside the canvas.
    pub fn label(&self) -> String {
        match self {
            HoverInfo::Inside { seconds, hz } => format!("T+{:.2}s {:.0} Hz", seconds, hz),
            HoverInfo::Outside => String::new(),
        }
    }
}

/// FIFO of pending input events.
#[derive(Debug, Default)]
pub struct InputQueue {
    events: VecDeque<InputEvent>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: InputEvent) {
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Take every queued event, oldest first.
    pub fn drain(&mut self) -> Vec<InputEvent> {
        self.events.drain(..).collect()
    }
}
