//! Session stage machine.
//!
//! ```text
//! WaitWebConnect -> FreeUserConnect -> CellSelect -> Game <-> ChangeTurn -> End
//! ```
//!
//! Timed stages own exactly one `stage.advance` task whose id lives on the
//! session. Entering a stage cancels the previous task before scheduling
//! the next, so a session in `Game` or `ChangeTurn` always has one pending
//! advancement. Entering `Game` increments the step and runs the turn
//! pipeline for it. Any transition past `max_steps` lands in `End`.

use chrono::Duration;
use emporium_types::{CompanyId, EventName, GameResult, Session, SessionId, SessionStage, Standing};
use serde_json::json;
use tracing::{info, warn};

use crate::error::GameError;
use crate::game::{Game, kwargs};
use crate::registry::STAGE_ADVANCE;

const fn allowed(from: SessionStage, to: SessionStage) -> bool {
    use SessionStage::{CellSelect, ChangeTurn, End, FreeUserConnect, Game, WaitWebConnect};
    matches!(
        (from, to),
        (WaitWebConnect, FreeUserConnect)
            | (FreeUserConnect, CellSelect)
            | (CellSelect, Game)
            | (Game, ChangeTurn)
            | (ChangeTurn, Game)
            | (_, End)
    )
}

/// Highest-ranked company by `key`; ties go to the lowest id.
fn winner(standings: &[Standing], key: impl Fn(&Standing) -> i64) -> Option<CompanyId> {
    let mut best: Option<&Standing> = None;
    for s in standings {
        match best {
            Some(b) if key(b) > key(s) || (key(b) == key(s) && b.company_id < s.company_id) => {}
            _ => best = Some(s),
        }
    }
    best.map(|s| s.company_id)
}

impl Game {
    /// Operator-driven stage change.
    ///
    /// # Errors
    ///
    /// - [`GameError::State`] for a transition the machine does not allow,
    ///   or `CellSelect -> Game` while a company has no cell.
    pub fn update_session_stage(
        &mut self,
        id: &SessionId,
        stage: SessionStage,
    ) -> Result<Session, GameError> {
        let session = self.session(id)?;
        if session.stage == SessionStage::End {
            return Err(GameError::State(String::from("cannot change stage from End")));
        }
        if !allowed(session.stage, stage) {
            return Err(GameError::State(format!(
                "cannot move from {} to {stage}",
                session.stage
            )));
        }
        if stage == SessionStage::Game && session.stage == SessionStage::CellSelect {
            let unplaced = self
                .session_companies(id)?
                .iter()
                .filter(|c| c.cell_position.is_none())
                .count();
            if unplaced > 0 {
                return Err(GameError::State(format!(
                    "{unplaced} companies have not selected a cell"
                )));
            }
        }
        self.enter_stage(session, stage)
    }

    /// Timer-driven stage change, run by the `stage.advance` task.
    ///
    /// From `CellSelect` every unplaced company first gets a random free
    /// cell. When there are fewer free cells than unplaced companies
    /// nobody is placed and the `CellSelect` timer starts over.
    ///
    /// # Errors
    ///
    /// - [`GameError::Capacity`] when the unplaced companies do not fit.
    pub fn advance_stage(&mut self, id: &SessionId) -> Result<Session, GameError> {
        let session = self.session(id)?;
        match session.stage {
            SessionStage::CellSelect => {
                if let Err(err) = self.check_room_for_unplaced(&session) {
                    warn!(session_id = %id, error = %err, "cell selection extended");
                    self.restart_stage_timer(session)?;
                    return Err(err);
                }
                self.place_unpositioned(&session)?;
                self.enter_stage(session, SessionStage::Game)
            }
            SessionStage::ChangeTurn => self.enter_stage(session, SessionStage::Game),
            SessionStage::Game => self.enter_stage(session, SessionStage::ChangeTurn),
            other => Err(GameError::State(format!("stage {other} has no timer"))),
        }
    }

    fn check_room_for_unplaced(&self, session: &Session) -> Result<(), GameError> {
        let unplaced = self
            .session_companies(&session.session_id)?
            .iter()
            .filter(|c| c.cell_position.is_none())
            .count();
        let free = self.free_positions(session)?.len();
        if unplaced > free {
            return Err(GameError::Capacity(format!(
                "{unplaced} companies need a cell but only {free} are free"
            )));
        }
        Ok(())
    }

    /// Replace the pending `stage.advance` task with a fresh one for the
    /// current stage.
    fn restart_stage_timer(&mut self, mut session: Session) -> Result<(), GameError> {
        if let Some(task) = session.change_turn_schedule_id.take() {
            self.cancel_task(task)?;
        }
        if let Some(delay) = self.stage_timer(session.stage) {
            let task = self.schedule_in(
                STAGE_ADVANCE,
                delay,
                kwargs(&[("session_id", json!(session.session_id))]),
            )?;
            session.change_turn_schedule_id = Some(task);
        }
        self.save(&session)
    }

    fn place_unpositioned(&mut self, session: &Session) -> Result<(), GameError> {
        for mut company in self.session_companies(&session.session_id)? {
            if company.cell_position.is_some() {
                continue;
            }
            let Some((x, y)) = self.random_free_position(session)? else {
                return Err(GameError::Capacity(String::from("no free cells left")));
            };
            info!(company_id = %company.id, x, y, "auto-placing company");
            self.place_company(&mut company, session, x, y)?;
        }
        Ok(())
    }

    fn stage_timer(&self, stage: SessionStage) -> Option<Duration> {
        let settings = &self.catalog.settings;
        let minutes = match stage {
            SessionStage::CellSelect => settings.turn_cell_time_minutes,
            SessionStage::Game => settings.time_on_game_stage,
            SessionStage::ChangeTurn => settings.time_on_change_stage,
            _ => return None,
        };
        Some(Duration::minutes(i64::from(minutes)))
    }

    fn enter_stage(&mut self, mut session: Session, requested: SessionStage) -> Result<Session, GameError> {
        if session.stage == SessionStage::End {
            return Err(GameError::State(String::from("cannot change stage from End")));
        }
        let target = if matches!(requested, SessionStage::Game | SessionStage::ChangeTurn)
            && session.step >= session.max_steps
        {
            SessionStage::End
        } else {
            requested
        };

        if let Some(task) = session.change_turn_schedule_id.take() {
            self.cancel_task(task)?;
        }
        let old = session.stage;
        match target {
            SessionStage::CellSelect if session.cells.is_empty() => {
                self.generate_cells(&mut session)?;
            }
            SessionStage::Game => session.step = session.step.saturating_add(1),
            SessionStage::End => self.finish_game(&mut session)?,
            _ => {}
        }
        session.stage = target;

        if let Some(delay) = self.stage_timer(target) {
            let task = self.schedule_in(
                STAGE_ADVANCE,
                delay,
                kwargs(&[("session_id", json!(session.session_id))]),
            )?;
            session.change_turn_schedule_id = Some(task);
        }
        self.save(&session)?;
        info!(
            session_id = %session.session_id,
            old_stage = %old,
            new_stage = %target,
            step = session.step,
            "session stage changed"
        );
        self.emit(
            EventName::UpdateSessionStage,
            json!({
                "session_id": session.session_id,
                "new_stage": target,
                "old_stage": old,
                "step": session.step,
            }),
        );

        if target == SessionStage::Game {
            self.run_turn(&session.session_id, session.step)?;
        }
        self.session(&session.session_id)
    }

    fn finish_game(&mut self, session: &mut Session) -> Result<(), GameError> {
        let mut standings: Vec<Standing> = Vec::new();
        for mut company in self.session_companies(&session.session_id)? {
            company.economic_power = self.economic_power(&company)?;
            self.save(&company)?;
            standings.push(Standing {
                company_id: company.id,
                name: company.name,
                balance: company.balance,
                reputation: company.reputation,
                economic_power: company.economic_power,
            });
        }
        standings.sort_by(|a, b| b.balance.cmp(&a.balance).then(a.company_id.cmp(&b.company_id)));

        let result = GameResult {
            capital_winner: winner(&standings, |s| s.balance),
            reputation_winner: winner(&standings, |s| i64::from(s.reputation)),
            economic_winner: winner(&standings, |s| s.economic_power),
            standings,
        };
        info!(
            session_id = %session.session_id,
            step = session.step,
            winner = ?result.capital_winner,
            "game ended"
        );
        self.emit(
            EventName::GameEnded,
            json!({ "session_id": session.session_id, "result": result }),
        );
        session.result = Some(result);
        Ok(())
    }
}
