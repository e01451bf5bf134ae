//! Input handling for the viewer.
//!
//! Bridges winit window events to engine commands: left-drag orbits,
//! middle-drag and the wheel dolly, `G`/`L`/`B` switch backends and the arrow
//! keys nudge the parameter controls.

use flurry_common::BackendKind;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Pixels of trackpad scroll per dolly step.
const PIXELS_PER_DOLLY_STEP: f32 = 50.0;

/// Something the session should do in response to input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Rotate the camera by a pointer drag in pixels
    Orbit {
        /// Horizontal drag
        dx: f32,
        /// Vertical drag
        dy: f32,
    },
    /// Move the camera along its view axis; positive moves closer
    Dolly(f32),
    /// Re-bootstrap with a specific backend
    SelectBackend(BackendKind),
    /// Re-bootstrap with the other backend
    ToggleBackend,
    /// Step the particle count control
    NudgeParticleCount(i32),
    /// Step the fall speed control
    NudgeFallSpeed(i32),
    /// Close the window
    Quit,
}

/// Maps a key press to a command.
///
/// Backend switches ignore key repeat; control nudges accept it.
#[must_use]
pub fn command_for_key(key: KeyCode, repeat: bool) -> Option<Command> {
    let command = match key {
        KeyCode::KeyG => Command::SelectBackend(BackendKind::GpuCompute),
        KeyCode::KeyL => Command::SelectBackend(BackendKind::Legacy),
        KeyCode::KeyB => Command::ToggleBackend,
        KeyCode::Escape => Command::Quit,
        KeyCode::ArrowUp => return Some(Command::NudgeParticleCount(1)),
        KeyCode::ArrowDown => return Some(Command::NudgeParticleCount(-1)),
        KeyCode::ArrowRight => return Some(Command::NudgeFallSpeed(1)),
        KeyCode::ArrowLeft => return Some(Command::NudgeFallSpeed(-1)),
        _ => return None,
    };
    (!repeat).then_some(command)
}

/// Which drag gesture is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drag {
    Rotate,
    Dolly,
}

/// Tracks pointer state across events.
#[derive(Debug, Default)]
pub struct InputHandler {
    /// Last cursor position in physical pixels
    cursor: Option<(f32, f32)>,
    /// Active drag gesture
    drag: Option<Drag>,
}

impl InputHandler {
    /// Create a new input handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a winit window event. Returns the resulting command, if any.
    pub fn handle_event(&mut self, event: &WindowEvent) -> Option<Command> {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed {
                    return None;
                }
                match event.physical_key {
                    PhysicalKey::Code(key) => command_for_key(key, event.repeat),
                    PhysicalKey::Unidentified(_) => None,
                }
            },
            WindowEvent::MouseInput { state, button, .. } => {
                self.mouse_button(*button, *state == ElementState::Pressed);
                None
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor_moved(position.x as f32, position.y as f32)
            },
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                self.drag = None;
                None
            },
            WindowEvent::MouseWheel { delta, .. } => Some(Self::wheel(*delta)),
            _ => None,
        }
    }

    /// Starts or ends a drag.
    pub fn mouse_button(&mut self, button: MouseButton, pressed: bool) {
        let gesture = match button {
            MouseButton::Left => Drag::Rotate,
            MouseButton::Middle => Drag::Dolly,
            _ => return,
        };
        if pressed {
            self.drag = Some(gesture);
        } else if self.drag == Some(gesture) {
            self.drag = None;
        }
    }

    /// Records the cursor and returns the drag command it produces.
    pub fn cursor_moved(&mut self, x: f32, y: f32) -> Option<Command> {
        let previous = self.cursor.replace((x, y))?;
        let (dx, dy) = (x - previous.0, y - previous.1);

        match self.drag? {
            Drag::Rotate => Some(Command::Orbit { dx, dy }),
            Drag::Dolly if dy.abs() < f32::EPSILON => None,
            // Dragging down moves away from the target.
            Drag::Dolly => Some(Command::Dolly(-dy.signum())),
        }
    }

    /// Converts a wheel delta into dolly steps.
    #[must_use]
    pub fn wheel(delta: MouseScrollDelta) -> Command {
        match delta {
            MouseScrollDelta::LineDelta(_, y) => Command::Dolly(y),
            MouseScrollDelta::PixelDelta(p) => Command::Dolly(p.y as f32 / PIXELS_PER_DOLLY_STEP),
        }
    }

    /// Returns true while a drag is in progress.
    #[must_use]
    pub const fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalPosition;

    #[test]
    fn test_backend_keys() {
        assert_eq!(
            command_for_key(KeyCode::KeyG, false),
            Some(Command::SelectBackend(BackendKind::GpuCompute))
        );
        assert_eq!(
            command_for_key(KeyCode::KeyL, false),
            Some(Command::SelectBackend(BackendKind::Legacy))
        );
        assert_eq!(command_for_key(KeyCode::KeyB, false), Some(Command::ToggleBackend));
        assert_eq!(command_for_key(KeyCode::KeyB, true), None);
        assert_eq!(command_for_key(KeyCode::KeyQ, false), None);
    }

    #[test]
    fn test_arrow_keys_repeat() {
        assert_eq!(
            command_for_key(KeyCode::ArrowUp, true),
            Some(Command::NudgeParticleCount(1))
        );
        assert_eq!(
            command_for_key(KeyCode::ArrowLeft, false),
            Some(Command::NudgeFallSpeed(-1))
        );
    }

    #[test]
    fn test_left_drag_orbits() {
        let mut input = InputHandler::new();
        assert_eq!(input.cursor_moved(10.0, 10.0), None);
        input.mouse_button(MouseButton::Left, true);
        assert_eq!(
            input.cursor_moved(15.0, 8.0),
            Some(Command::Orbit { dx: 5.0, dy: -2.0 })
        );
        input.mouse_button(MouseButton::Left, false);
        assert!(!input.is_dragging());
        assert_eq!(input.cursor_moved(20.0, 8.0), None);
    }

    #[test]
    fn test_middle_drag_dollies() {
        let mut input = InputHandler::new();
        input.cursor_moved(0.0, 0.0);
        input.mouse_button(MouseButton::Middle, true);
        assert_eq!(input.cursor_moved(0.0, 12.0), Some(Command::Dolly(-1.0)));
        assert_eq!(input.cursor_moved(0.0, 4.0), Some(Command::Dolly(1.0)));
        assert_eq!(input.cursor_moved(3.0, 4.0), None);
    }

    #[test]
    fn test_release_of_other_button_keeps_drag() {
        let mut input = InputHandler::new();
        input.mouse_button(MouseButton::Left, true);
        input.mouse_button(MouseButton::Middle, false);
        assert!(input.is_dragging());
        input.mouse_button(MouseButton::Right, true);
        assert!(input.is_dragging());
    }

    #[test]
    fn test_wheel() {
        assert_eq!(
            InputHandler::wheel(MouseScrollDelta::LineDelta(0.0, 2.0)),
            Command::Dolly(2.0)
        );
        assert_eq!(
            InputHandler::wheel(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, -100.0))),
            Command::Dolly(-2.0)
        );
    }
}
