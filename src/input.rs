use crossterm::event::{
    self, Event, KeyCode, KeyEventKind, KeyModifiers, MouseButton, MouseEventKind,
};
use std::time::Duration;

// Everything the core needs from the input device: parameter deltas,
// mode toggles, and mouse grab coordinates in terminal cells.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Action {
    Quit,
    TogglePause,
    ToggleHud,
    ToggleGravity,
    ToggleSprings,
    ToggleObstacle,
    CyclePreset,
    Reset,
    AdjustBalls(i32),
    AdjustStiffness(f32),
    AdjustViscosity(f32),
    AdjustRadius(f32),
    AdjustGlow(f32),
    AdjustScaling(f32),
    Grab(u16, u16),
    DragTo(u16, u16),
    Release,
}

pub(crate) fn collect_input_nonblocking(max_frame_time: Duration) -> anyhow::Result<Vec<Event>> {
    let mut out = Vec::new();
    let timeout = std::cmp::min(Duration::from_millis(1), max_frame_time);
    while event::poll(timeout)? {
        out.push(event::read()?);
        if out.len() >= 32 {
            break;
        }
    }
    Ok(out)
}

pub(crate) fn map_event_to_action(ev: &Event) -> Option<Action> {
    match ev {
        Event::Key(k) if k.kind == KeyEventKind::Press || k.kind == KeyEventKind::Repeat => {
            // held keys repeat, giving step-while-held on the parameter
            // bindings below
            let shift = k.modifiers.contains(KeyModifiers::SHIFT);
            let fine = |d: f32| if shift { d * 5.0 } else { d };
            match k.code {
                KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(Action::Quit),
                KeyCode::Char(' ') => Some(Action::TogglePause),
                KeyCode::Char('h') | KeyCode::Char('H') => Some(Action::ToggleHud),
                KeyCode::Char('g') | KeyCode::Char('G') => Some(Action::ToggleGravity),
                KeyCode::Char('v') | KeyCode::Char('V') => Some(Action::ToggleSprings),
                KeyCode::Char('o') | KeyCode::Char('O') => Some(Action::ToggleObstacle),
                KeyCode::Char('p') | KeyCode::Char('P') => Some(Action::CyclePreset),
                KeyCode::Char('r') | KeyCode::Char('R') => Some(Action::Reset),
                KeyCode::Char('[') => Some(Action::AdjustBalls(-1)),
                KeyCode::Char(']') => Some(Action::AdjustBalls(1)),
                KeyCode::Up => Some(Action::AdjustStiffness(fine(100.0))),
                KeyCode::Down => Some(Action::AdjustStiffness(fine(-100.0))),
                KeyCode::Right => Some(Action::AdjustViscosity(fine(0.1))),
                KeyCode::Left => Some(Action::AdjustViscosity(fine(-0.1))),
                KeyCode::Char('.') => Some(Action::AdjustRadius(fine(2.0))),
                KeyCode::Char(',') => Some(Action::AdjustRadius(fine(-2.0))),
                KeyCode::Char('=') | KeyCode::Char('+') => Some(Action::AdjustGlow(fine(0.05))),
                KeyCode::Char('-') => Some(Action::AdjustGlow(fine(-0.05))),
                KeyCode::Char('\'') => Some(Action::AdjustScaling(fine(0.05))),
                KeyCode::Char(';') => Some(Action::AdjustScaling(fine(-0.05))),
                _ => None,
            }
        }
        Event::Mouse(m) => match m.kind {
            MouseEventKind::Down(MouseButton::Left) => Some(Action::Grab(m.column, m.row)),
            MouseEventKind::Drag(MouseButton::Left) => Some(Action::DragTo(m.column, m.row)),
            MouseEventKind::Up(MouseButton::Left) => Some(Action::Release),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEvent, KeyEventState, MouseEvent};

    fn key(code: KeyCode, mods: KeyModifiers) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers: mods,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    #[test]
    fn gravity_toggle_and_quit_map() {
        assert_eq!(
            map_event_to_action(&key(KeyCode::Char('g'), KeyModifiers::NONE)),
            Some(Action::ToggleGravity)
        );
        assert_eq!(
            map_event_to_action(&key(KeyCode::Esc, KeyModifiers::NONE)),
            Some(Action::Quit)
        );
    }

    #[test]
    fn shift_scales_parameter_steps() {
        assert_eq!(
            map_event_to_action(&key(KeyCode::Up, KeyModifiers::NONE)),
            Some(Action::AdjustStiffness(100.0))
        );
        assert_eq!(
            map_event_to_action(&key(KeyCode::Up, KeyModifiers::SHIFT)),
            Some(Action::AdjustStiffness(500.0))
        );
    }

    #[test]
    fn repeat_events_keep_stepping() {
        let ev = Event::Key(KeyEvent {
            code: KeyCode::Char(']'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Repeat,
            state: KeyEventState::NONE,
        });
        assert_eq!(map_event_to_action(&ev), Some(Action::AdjustBalls(1)));
    }

    #[test]
    fn left_mouse_maps_to_grab_drag_release() {
        let down = Event::Mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 10,
            row: 4,
            modifiers: KeyModifiers::NONE,
        });
        assert_eq!(map_event_to_action(&down), Some(Action::Grab(10, 4)));
        let up = Event::Mouse(MouseEvent {
            kind: MouseEventKind::Up(MouseButton::Left),
            column: 10,
            row: 4,
            modifiers: KeyModifiers::NONE,
        });
        assert_eq!(map_event_to_action(&up), Some(Action::Release));
    }
}
