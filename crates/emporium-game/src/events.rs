//! Random session events.
//!
//! At most one event is active per session. When a turn ends without one,
//! a new event starts with probability `event_chance_percent`, picked
//! uniformly from the catalog, lasting a uniform `min..=max` turns. Its
//! effects are read by the turn pipeline through [`ActiveEffects`]; the
//! catalog itself never changes. A `session.clear_event` step call ends it.

use emporium_types::{BusinessType, EventName, Session, SessionId};
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::json;
use tracing::info;

use crate::catalog::EventEffects;
use crate::error::GameError;
use crate::game::{Game, kwargs};
use crate::registry::SESSION_CLEAR_EVENT;

/// Effects of the active event, or neutral ones when none is active.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveEffects {
    event_id: Option<String>,
    cell_type: Option<String>,
    effects: EventEffects,
}

impl ActiveEffects {
    /// Active event id.
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    /// Station output multiplier for a company on `cell_type`.
    pub fn extraction_factor(&self, cell_type: Option<&str>) -> Decimal {
        let speed = self.effects.resource_extraction_speed.unwrap_or(Decimal::ONE);
        let income = match (self.cell_type.as_deref(), self.effects.income_multiplier) {
            (Some(target), Some(m)) if Some(target) == cell_type => m,
            _ => Decimal::ONE,
        };
        speed.checked_mul(income).unwrap_or(Decimal::ONE)
    }

    /// Tax rate multiplier for a bracket.
    pub fn tax_factor(&self, bracket: BusinessType) -> Decimal {
        match bracket {
            BusinessType::Small => self.effects.tax_rate_small,
            BusinessType::Big => self.effects.tax_rate_large,
        }
        .unwrap_or(Decimal::ONE)
    }

    /// Factory progress per turn, at least one.
    pub fn tasks_increment(&self) -> u32 {
        self.effects
            .tasks_speed
            .and_then(|s| s.floor().to_u32())
            .unwrap_or(1)
            .max(1)
    }

    /// Contract slots removed from every company.
    pub fn contracts_decrease(&self) -> u32 {
        self.effects.contracts_limit_decrease.unwrap_or(0)
    }

    /// Valuation multiplier for `resource`.
    pub fn price_factor(&self, resource: &str) -> Decimal {
        self.effects
            .increase_price
            .get(resource)
            .copied()
            .unwrap_or(Decimal::ONE)
    }
}

impl Game {
    /// Effects of the session's active event.
    pub fn active_effects(&self, session: &Session) -> ActiveEffects {
        let Some(id) = session.event_type.as_deref() else {
            return ActiveEffects::default();
        };
        self.catalog
            .events
            .get(id)
            .map_or_else(ActiveEffects::default, |event| ActiveEffects {
                event_id: Some(id.to_owned()),
                cell_type: event.cell_type.clone(),
                effects: event.effects.clone(),
            })
    }

    /// Maybe start an event. Returns the id of the event started.
    pub(crate) fn roll_event(&mut self, id: &SessionId) -> Result<Option<String>, GameError> {
        let mut session = self.session(id)?;
        if session.event_type.is_some() || self.catalog.events.is_empty() {
            return Ok(None);
        }
        if self.rng.random_range(0..100_u32) >= self.settings.event_chance_percent {
            return Ok(None);
        }
        let pick = self.rng.random_range(0..self.catalog.events.len());
        let Some((event_id, event)) = self.catalog.events.iter().nth(pick) else {
            return Ok(None);
        };
        let (event_id, event) = (event_id.clone(), event.clone());
        let (min, max) = event.duration.bounds();
        let duration = self.rng.random_range(min..=max);
        let end = session.step.saturating_add(duration);

        session.event_type = Some(event_id.clone());
        session.event_start = Some(session.step);
        session.event_end = Some(end);
        self.save(&session)?;
        self.add_step_call(
            id,
            end,
            SESSION_CLEAR_EVENT,
            kwargs(&[("session_id", json!(id))]),
        )?;
        info!(session_id = %id, event = %event_id, step = session.step, end_step = end, "event started");
        self.emit(
            EventName::SessionEventStarted,
            json!({
                "session_id": id,
                "event_id": event_id,
                "name": event.name,
                "description": event.description,
                "category": event.category,
                "cell_type": event.cell_type,
                "effects": event.predictability.then_some(&event.effects),
                "start": session.step,
                "end": end,
            }),
        );
        Ok(Some(event_id))
    }

    /// End the active event, if any.
    pub fn clear_event(&mut self, id: &SessionId) -> Result<(), GameError> {
        let mut session = self.session(id)?;
        let Some(event_id) = session.event_type.take() else {
            return Ok(());
        };
        session.event_start = None;
        session.event_end = None;
        self.save(&session)?;
        info!(session_id = %id, event = %event_id, step = session.step, "event ended");
        self.emit(
            EventName::SessionEventEnded,
            json!({ "session_id": id, "event_id": event_id }),
        );
        Ok(())
    }

    /// Clear an event whose end step has been reached.
    pub(crate) fn expire_event(&mut self, id: &SessionId, step: u32) -> Result<(), GameError> {
        let session = self.session(id)?;
        if session.event_end.is_some_and(|end| end <= step) {
            self.clear_event(id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::indexing_slicing)]

    use super::*;
    use crate::game::GameSettings;
    use crate::testing::TestGame;

    fn dec(num: i64, scale: u32) -> Decimal {
        Decimal::new(num, scale)
    }

    fn effects_of(t: &TestGame, id: &str) -> ActiveEffects {
        let session = Session {
            event_type: Some(id.to_owned()),
            ..t.game.session(&t.game.sessions(None).unwrap()[0].session_id).unwrap()
        };
        t.game.active_effects(&session)
    }

    #[test]
    fn neutral_effects_without_event() {
        let fx = ActiveEffects::default();
        assert_eq!(fx.extraction_factor(Some("forest")), Decimal::ONE);
        assert_eq!(fx.tax_factor(BusinessType::Big), Decimal::ONE);
        assert_eq!(fx.tasks_increment(), 1);
        assert_eq!(fx.contracts_decrease(), 0);
        assert_eq!(fx.price_factor("wood"), Decimal::ONE);
    }

    #[test]
    fn cell_scoped_multiplier_applies_only_on_its_cell() {
        let mut t = TestGame::new();
        t.session();
        let fx = effects_of(&t, "good_harvest");
        assert_eq!(fx.event_id(), Some("good_harvest"));
        assert_eq!(fx.extraction_factor(Some("forest")), dec(15, 1));
        assert_eq!(fx.extraction_factor(Some("mountain")), Decimal::ONE);

        let fx = effects_of(&t, "strike");
        assert_eq!(fx.extraction_factor(Some("forest")), dec(5, 1));
        assert_eq!(fx.contracts_decrease(), 1);

        let fx = effects_of(&t, "tax_reform");
        assert_eq!(fx.tax_factor(BusinessType::Small), dec(15, 1));
    }

    #[test]
    fn certain_roll_starts_one_event_and_schedules_its_end() {
        let mut t = TestGame::with_settings(GameSettings {
            event_chance_percent: 100,
            seed: Some(3),
        });
        let (session, _) = t.playing(1);
        let s = t.game.session(&session).unwrap();
        let event = s.event_type.clone().unwrap();
        let end = s.event_end.unwrap();
        assert_eq!(s.event_start, Some(1));
        let (min, max) = t.game.catalog().events[&event].duration.bounds();
        assert!((1 + min..=1 + max).contains(&end));
        let calls = t.game.step_calls(&session, end).unwrap();
        assert!(calls.iter().any(|c| c.function_path == SESSION_CLEAR_EVENT));

        // A second roll while one is active does nothing.
        assert_eq!(t.game.roll_event(&session).unwrap(), None);
    }

    #[test]
    fn clear_is_idempotent() {
        let mut t = TestGame::new();
        let session = t.session();
        let mut s = t.game.session(&session).unwrap();
        s.event_type = Some(String::from("strike"));
        s.event_end = Some(2);
        t.game.save(&s).unwrap();
        t.game.drain_events();

        t.game.expire_event(&session, 1).unwrap();
        assert!(t.game.session(&session).unwrap().event_type.is_some());
        t.game.expire_event(&session, 2).unwrap();
        assert!(t.game.session(&session).unwrap().event_type.is_none());
        t.game.clear_event(&session).unwrap();
        let events = t.game.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, EventName::SessionEventEnded);
    }
}
