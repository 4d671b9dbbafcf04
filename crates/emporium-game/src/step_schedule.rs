//! Step scheduler: deferred calls keyed by `(session, turn)`.
//!
//! Registering another call for the same `(session, in_step)` appends to
//! the existing record. The turn pipeline drains a step's record, runs the
//! calls in insertion order and deletes it.

use emporium_types::{Document, ScheduledCall, SessionId, StepSchedule, StepScheduleId};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::error::GameError;
use crate::game::Game;

impl Game {
    /// Append a call to run when `session` reaches `in_step`.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Scheduler`] for unknown symbols and
    /// [`GameError::Validation`] when `in_step` is already in the past.
    pub fn add_step_call(
        &mut self,
        session_id: &SessionId,
        in_step: u32,
        function_path: &str,
        kwargs: Map<String, Value>,
    ) -> Result<StepScheduleId, GameError> {
        self.require_symbol(function_path)?;
        let session = self.session(session_id)?;
        if in_step < session.step {
            return Err(GameError::Validation(format!(
                "step {in_step} is before the current step {}",
                session.step
            )));
        }

        let call = ScheduledCall {
            function_path: function_path.to_owned(),
            kwargs,
        };
        let existing: Option<StepSchedule> = self.store.find_one_typed(&json!({
            "session_id": session_id,
            "in_step": in_step,
        }))?;
        let record = match existing {
            Some(mut record) => {
                record.calls.push(call);
                record
            }
            None => StepSchedule {
                id: StepScheduleId(self.store.next_id(StepSchedule::TABLE)?),
                session_id: session_id.clone(),
                in_step,
                calls: vec![call],
            },
        };
        self.save(&record)?;
        debug!(session_id = %session_id, in_step, function = function_path, "step call added");
        Ok(record.id)
    }

    /// Calls registered for `(session, step)`, without removing them.
    pub fn step_calls(&self, session_id: &SessionId, step: u32) -> Result<Vec<ScheduledCall>, GameError> {
        let records: Vec<StepSchedule> = self.store.find_typed(&json!({
            "session_id": session_id,
            "in_step": step,
        }))?;
        Ok(records.into_iter().flat_map(|r| r.calls).collect())
    }

    /// Remove and return every call for `(session, step)`.
    pub(crate) fn drain_step_calls(
        &mut self,
        session_id: &SessionId,
        step: u32,
    ) -> Result<Vec<ScheduledCall>, GameError> {
        let calls = self.step_calls(session_id, step)?;
        self.store.delete(
            StepSchedule::TABLE,
            &json!({ "session_id": session_id, "in_step": step }),
        )?;
        Ok(calls)
    }

    /// Drain and run the calls for `(session, step)`. Failures are logged
    /// and do not stop the remaining calls. Returns how many succeeded.
    pub(crate) fn run_step_calls(&mut self, session_id: &SessionId, step: u32) -> Result<usize, GameError> {
        let calls = self.drain_step_calls(session_id, step)?;
        let mut ok = 0_usize;
        for call in calls {
            match self.run_symbol(&call.function_path, &call.kwargs) {
                Ok(()) => ok = ok.saturating_add(1),
                Err(e) => warn!(
                    session_id = %session_id,
                    step,
                    function = %call.function_path,
                    error = %e,
                    "step call failed"
                ),
            }
        }
        Ok(ok)
    }
}
