use super::error::{StateError, StateResult};
use super::{DragState, PointerEvent};

/// Pointer-drag phase: `Idle` until a press, `Dragging(start)` until release.
#[derive(Debug, Default)]
pub struct DragMachine {
    state: DragState,
}

impl DragMachine {
    pub fn new() -> Self {
        Self {
            state: DragState::Idle,
        }
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn can_transition(&self, event: PointerEvent) -> bool {
        self.next_state(event).is_some()
    }

    pub fn next_state(&self, event: PointerEvent) -> Option<DragState> {
        use PointerEvent::*;
        match (self.state, event) {
            (DragState::Idle, Down(start)) => Some(DragState::Dragging { start }),
            (DragState::Idle, Cancel) => Some(DragState::Idle),
            (state @ DragState::Dragging { .. }, Move(_)) => Some(state),
            (DragState::Dragging { .. }, Up(_)) => Some(DragState::Idle),
            (DragState::Dragging { .. }, Cancel) => Some(DragState::Idle),
            _ => None,
        }
    }

    pub fn transition(&mut self, event: PointerEvent) -> StateResult<DragState> {
        let next = self.next_state(event).ok_or_else(|| {
            let from = self.state;
            tracing::debug!(from = ?from, event = ?event, "ignoring pointer event");
            StateError::InvalidDragTransition { from, event }
        })?;

        self.state = next;
        Ok(self.state)
    }

    pub fn reset(&mut self) {
        self.state = DragState::Idle;
    }
}

impl std::fmt::Display for DragMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.state {
            DragState::Idle => write!(f, "DragState::Idle"),
            DragState::Dragging { start } => {
                write!(f, "DragState::Dragging({}, {})", start.x, start.y)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ImagePoint;

    const START: ImagePoint = ImagePoint::new(4.0, 5.0);
    const END: ImagePoint = ImagePoint::new(40.0, 50.0);

    #[test]
    fn can_transition_tracks_valid_and_invalid_events() {
        let mut machine = DragMachine::new();
        assert!(machine.can_transition(PointerEvent::Down(START)));
        assert!(machine.can_transition(PointerEvent::Cancel));
        assert!(!machine.can_transition(PointerEvent::Move(END)));
        assert!(!machine.can_transition(PointerEvent::Up(END)));

        machine
            .transition(PointerEvent::Down(START))
            .expect("idle -> dragging should transition");

        assert!(machine.can_transition(PointerEvent::Move(END)));
        assert!(machine.can_transition(PointerEvent::Up(END)));
        assert!(!machine.can_transition(PointerEvent::Down(END)));
    }

    #[test]
    fn drag_keeps_start_point_until_release() {
        let mut machine = DragMachine::new();
        machine.transition(PointerEvent::Down(START)).unwrap();
        let state = machine.transition(PointerEvent::Move(END)).unwrap();
        assert_eq!(state, DragState::Dragging { start: START });
        assert_eq!(state.start(), Some(START));

        let state = machine.transition(PointerEvent::Up(END)).unwrap();
        assert_eq!(state, DragState::Idle);
        assert!(!state.is_dragging());
    }

    #[test]
    fn invalid_transition_returns_error_without_mutating_state() {
        let mut machine = DragMachine::new();
        let err = machine
            .transition(PointerEvent::Up(END))
            .expect_err("idle -> up should fail");
        assert!(matches!(
            err,
            StateError::InvalidDragTransition {
                from: DragState::Idle,
                event: PointerEvent::Up(_)
            }
        ));
        assert_eq!(machine.state(), DragState::Idle);

        machine.transition(PointerEvent::Down(START)).unwrap();
        assert!(machine.transition(PointerEvent::Down(END)).is_err());
        assert_eq!(machine.state(), DragState::Dragging { start: START });
    }

    #[test]
    fn cancel_and_reset_return_to_idle() {
        let mut machine = DragMachine::new();
        machine.transition(PointerEvent::Down(START)).unwrap();
        machine.transition(PointerEvent::Cancel).unwrap();
        assert_eq!(machine.state(), DragState::Idle);

        machine.transition(PointerEvent::Down(START)).unwrap();
        machine.reset();
        assert_eq!(machine.state(), DragState::Idle);
        assert_eq!(machine.to_string(), "DragState::Idle");
    }
}
