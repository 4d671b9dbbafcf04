//! Wall-clock scheduler.
//!
//! Tasks live in the `time_schedule` table so they survive restarts. The
//! engine binary calls [`Game::run_due_tasks`] once per second. A task
//! runs when `execute_at <= now`; repeating tasks are pushed forward by
//! their original interval, others are deleted. A failing task is logged
//! and never stops the worker.

use chrono::{DateTime, Duration, Utc};
use emporium_types::{Document, TimeTask, TimeTaskId};
use serde_json::{Map, Value, json};
use tracing::{debug, error, info, warn};

use crate::error::GameError;
use crate::game::Game;

/// Parameters of a new wall-clock task.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTimeTask {
    /// Registry symbol.
    pub function_path: String,
    /// When the task becomes due.
    pub execute_at: DateTime<Utc>,
    /// Keyword arguments.
    pub kwargs: Map<String, Value>,
    /// Reschedule after each run.
    pub repeat: bool,
    /// Remove at boot and shutdown.
    pub delete_on_shutdown: bool,
}

/// Filter matching exactly the stored revision of `task`, so a task id
/// reused after deletion is never touched by a stale run.
fn revision_filter(task: &TimeTask) -> Result<Value, GameError> {
    Ok(json!({
        "id": task.id,
        "add_at": serde_json::to_value(task.add_at)?,
    }))
}

impl Game {
    /// Persist a new task.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Scheduler`] if the symbol is not registered.
    pub fn schedule_task(&mut self, task: NewTimeTask) -> Result<TimeTaskId, GameError> {
        self.require_symbol(&task.function_path)?;
        let id = TimeTaskId(self.store.next_id(TimeTask::TABLE)?);
        let record = TimeTask {
            id,
            function_path: task.function_path,
            execute_at: task.execute_at,
            add_at: self.now(),
            args: Vec::new(),
            kwargs: task.kwargs,
            repeat: task.repeat,
            delete_on_shutdown: task.delete_on_shutdown,
        };
        self.save(&record)?;
        debug!(
            task_id = %id,
            function = %record.function_path,
            execute_at = %record.execute_at,
            "task scheduled"
        );
        Ok(id)
    }

    /// Schedule a one-shot task `delay` from now.
    pub fn schedule_in(
        &mut self,
        function_path: &str,
        delay: Duration,
        kwargs: Map<String, Value>,
    ) -> Result<TimeTaskId, GameError> {
        let now = self.now();
        let execute_at = now.checked_add_signed(delay).unwrap_or(now);
        self.schedule_task(NewTimeTask {
            function_path: function_path.to_owned(),
            execute_at,
            kwargs,
            repeat: false,
            delete_on_shutdown: false,
        })
    }

    /// Remove a task. Returns whether it existed.
    pub fn cancel_task(&mut self, id: TimeTaskId) -> Result<bool, GameError> {
        let removed = self.store.delete(TimeTask::TABLE, &json!({ "id": id }))? > 0;
        if removed {
            debug!(task_id = %id, "task cancelled");
        }
        Ok(removed)
    }

    /// All stored tasks, soonest first.
    pub fn time_tasks(&self) -> Result<Vec<TimeTask>, GameError> {
        let mut tasks: Vec<TimeTask> = self.store.find_typed(&Value::Null)?;
        tasks.sort_by(|a, b| a.execute_at.cmp(&b.execute_at).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }

    /// Run every task due at the current clock time. Returns how many ran.
    ///
    /// A task whose symbol no longer resolves is logged and dropped. A
    /// task whose handler fails is logged and then rescheduled or deleted
    /// like any other.
    pub fn run_due_tasks(&mut self) -> Result<usize, GameError> {
        let now = self.now();
        let due: Vec<TimeTask> = self
            .time_tasks()?
            .into_iter()
            .filter(|t| t.execute_at <= now)
            .collect();

        let mut ran = 0_usize;
        for task in due {
            // An earlier task in this batch may have cancelled this one.
            let filter = revision_filter(&task)?;
            if self.store.count(TimeTask::TABLE, &filter)? == 0 {
                continue;
            }

            if self.tasks.get(&task.function_path).is_none() {
                let err = GameError::Scheduler(format!(
                    "unknown task symbol {}",
                    task.function_path
                ));
                error!(task_id = %task.id, error = %err, "dropping unresolvable task");
                self.store.delete(TimeTask::TABLE, &filter)?;
                continue;
            }

            if let Err(e) = self.run_symbol(&task.function_path, &task.kwargs) {
                warn!(
                    task_id = %task.id,
                    function = %task.function_path,
                    error = %e,
                    "scheduled task failed"
                );
            }
            ran = ran.saturating_add(1);

            if task.repeat {
                let interval = task.execute_at.signed_duration_since(task.add_at);
                let next = now.checked_add_signed(interval).unwrap_or(now);
                self.store.update(
                    TimeTask::TABLE,
                    &filter,
                    &json!({
                        "execute_at": serde_json::to_value(next)?,
                        "add_at": serde_json::to_value(now)?,
                    }),
                )?;
            } else {
                self.store.delete(TimeTask::TABLE, &filter)?;
            }
        }
        Ok(ran)
    }

    /// Delete tasks flagged `delete_on_shutdown`. Called at boot and at
    /// shutdown.
    pub fn cleanup_time_tasks(&mut self) -> Result<usize, GameError> {
        let removed = self
            .store
            .delete(TimeTask::TABLE, &json!({ "delete_on_shutdown": true }))?;
        if removed > 0 {
            info!(removed, "removed shutdown-scoped tasks");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::indexing_slicing)]

    use emporium_types::SessionId;

    use super::*;
    use crate::clock::Clock;
    use crate::registry::{SESSION_CLEAR_EVENT, STAGE_ADVANCE};
    use crate::testing::TestGame;

    fn clear_event_task(t: &TestGame, delay_min: i64, repeat: bool) -> NewTimeTask {
        NewTimeTask {
            function_path: String::from(SESSION_CLEAR_EVENT),
            execute_at: t.clock.now() + Duration::minutes(delay_min),
            kwargs: crate::game::kwargs(&[("session_id", json!("nope"))]),
            repeat,
            delete_on_shutdown: false,
        }
    }

    #[test]
    fn unknown_symbol_is_rejected_at_schedule_time() {
        let mut t = TestGame::new();
        let err = t
            .game
            .schedule_in("nowhere.fn", Duration::minutes(1), Map::new())
            .unwrap_err();
        assert_eq!(err.kind(), "scheduler");
    }

    #[test]
    fn one_shot_task_runs_once_when_due() {
        let mut t = TestGame::new();
        let task = clear_event_task(&t, 5, false);
        t.game.schedule_task(task).unwrap();

        assert_eq!(t.game.run_due_tasks().unwrap(), 0);
        t.clock.advance(Duration::minutes(5));
        // The handler fails (no such session) but the task is still consumed.
        assert_eq!(t.game.run_due_tasks().unwrap(), 1);
        assert!(t.game.time_tasks().unwrap().is_empty());
    }

    #[test]
    fn repeating_task_keeps_its_interval() {
        let mut t = TestGame::new();
        let task = clear_event_task(&t, 2, true);
        t.game.schedule_task(task).unwrap();

        t.clock.advance(Duration::minutes(3));
        let ran_at = t.clock.now();
        assert_eq!(t.game.run_due_tasks().unwrap(), 1);
        let tasks = t.game.time_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].add_at, ran_at);
        assert_eq!(tasks[0].execute_at, ran_at + Duration::minutes(2));
    }

    #[test]
    fn unresolvable_stored_task_is_dropped() {
        let mut t = TestGame::new();
        let record = TimeTask {
            id: TimeTaskId(1),
            function_path: String::from("legacy.removed_fn"),
            execute_at: t.clock.now(),
            add_at: t.clock.now(),
            args: Vec::new(),
            kwargs: Map::new(),
            repeat: true,
            delete_on_shutdown: false,
        };
        t.game.store().save(&record).unwrap();
        assert_eq!(t.game.run_due_tasks().unwrap(), 0);
        assert!(t.game.time_tasks().unwrap().is_empty());
    }

    #[test]
    fn cleanup_removes_only_shutdown_scoped_tasks() {
        let mut t = TestGame::new();
        let mut task = clear_event_task(&t, 10, false);
        task.delete_on_shutdown = true;
        t.game.schedule_task(task).unwrap();
        t.game
            .schedule_in(
                STAGE_ADVANCE,
                Duration::minutes(10),
                crate::game::kwargs(&[("session_id", json!(SessionId::from("x")))]),
            )
            .unwrap();

        assert_eq!(t.game.cleanup_time_tasks().unwrap(), 1);
        let left = t.game.time_tasks().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].function_path, STAGE_ADVANCE);
    }

    #[test]
    fn cancel_reports_existence() {
        let mut t = TestGame::new();
        let id = t
            .game
            .schedule_in(SESSION_CLEAR_EVENT, Duration::minutes(1), Map::new())
            .unwrap();
        assert!(t.game.cancel_task(id).unwrap());
        assert!(!t.game.cancel_task(id).unwrap());
    }
}
