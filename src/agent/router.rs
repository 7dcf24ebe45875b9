//! Decides after each agent turn whether the run goes on.

use super::state::RunState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Continue,
    Halt,
}

/// Halt once a summary has been recorded; otherwise re-run the same agent.
pub fn route(state: &RunState) -> Route {
    if state.is_complete() {
        Route::Halt
    } else {
        Route::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_state_continues() {
        assert_eq!(route(&RunState::default()), Route::Continue);
    }

    #[test]
    fn files_alone_do_not_halt() {
        let mut state = RunState::default();
        state.merge_file("index.html".into(), "<p></p>".into());
        assert_eq!(route(&state), Route::Continue);
    }

    #[test]
    fn summary_halts() {
        let mut state = RunState::default();
        state.record_summary("<task_summary>done</task_summary>");
        assert_eq!(route(&state), Route::Halt);
    }
}
