//! Factories and their per-turn automaton.
//!
//! ```text
//! Idle --recomplectation--> Retooling --stages hit 0--> Idle
//! Idle --produce/auto + materials--> Producing --progress done--> Idle | Producing (auto)
//! ```
//!
//! Materials are consumed on the first tick of a batch, so a batch in
//! flight always finishes even if the warehouse is emptied meanwhile.

use std::sync::Arc;

use emporium_types::{Company, CompanyId, Document, EventName, Factory, FactoryId};
use serde_json::json;
use tracing::debug;

use crate::catalog::Production;
use crate::error::GameError;
use crate::events::ActiveEffects;
use crate::game::Game;

fn has_materials(company: &Company, recipe: &Production) -> bool {
    recipe
        .materials
        .iter()
        .all(|(resource, need)| company.resource_amount(resource) >= *need)
}

/// Retooling turns from `old` to `new` production level.
const fn retool_stages(old_level: u32, new_level: u32) -> u32 {
    if old_level == new_level {
        new_level
    } else {
        old_level.abs_diff(new_level)
    }
}

impl Game {
    /// Factory by id.
    pub fn factory(&self, id: FactoryId) -> Result<Factory, GameError> {
        self.store
            .get::<Factory>(id)?
            .ok_or_else(|| GameError::not_found("factory", id))
    }

    /// Factories of a company, ascending by id.
    pub fn factories_of(&self, company: CompanyId) -> Result<Vec<Factory>, GameError> {
        let mut factories: Vec<Factory> = self.store.find_typed(&json!({ "company_id": company }))?;
        factories.sort_by_key(|f| f.id);
        Ok(factories)
    }

    pub(crate) fn build_factory(
        &mut self,
        company: CompanyId,
        complectation: Option<String>,
    ) -> Result<Factory, GameError> {
        let turns = complectation
            .as_deref()
            .and_then(|r| self.catalog.resource(r))
            .and_then(|r| r.production.as_ref())
            .map_or(0, |p| p.turns);
        let factory = Factory {
            id: FactoryId(self.store.next_id(Factory::TABLE)?),
            company_id: company,
            complectation,
            progress: [0, turns],
            produce: false,
            is_auto: false,
            complectation_stages: 0,
            produced: 0,
        };
        self.save(&factory)?;
        self.emit(EventName::FactoryCreate, json!({ "factory": factory }));
        Ok(factory)
    }

    fn acting_factory(&self, id: FactoryId) -> Result<Factory, GameError> {
        let factory = self.factory(id)?;
        self.acting_company(factory.company_id)?;
        Ok(factory)
    }

    /// Retool a factory for `resource`.
    ///
    /// # Errors
    ///
    /// - [`GameError::Validation`] when `resource` is unknown, raw or has
    ///   no recipe.
    /// - [`GameError::State`] while a batch is in flight.
    pub fn recomplectation(&mut self, id: FactoryId, resource: &str) -> Result<Factory, GameError> {
        let factory = self.acting_factory(id)?;
        self.retool(factory, resource)
    }

    fn retool(&mut self, mut factory: Factory, resource: &str) -> Result<Factory, GameError> {
        let catalog = Arc::clone(&self.catalog);
        let target = catalog
            .resource(resource)
            .ok_or_else(|| GameError::Validation(format!("unknown resource {resource}")))?;
        let recipe = match (&target.production, target.raw) {
            (Some(recipe), false) => recipe,
            _ => {
                return Err(GameError::Validation(format!(
                    "{resource} cannot be produced in a factory"
                )));
            }
        };
        if factory.in_production() {
            return Err(GameError::State(format!(
                "factory {} is in the middle of a batch",
                factory.id
            )));
        }
        let old_level = factory
            .complectation
            .as_deref()
            .and_then(|r| catalog.resource(r))
            .map_or(0, |r| r.level);
        let stages = retool_stages(old_level, target.level);

        factory.complectation = Some(resource.to_owned());
        factory.complectation_stages = stages;
        factory.progress = [0, recipe.turns];
        factory.produce = false;
        self.save(&factory)?;
        debug!(factory_id = %factory.id, resource, stages, "retooling started");
        self.emit(
            EventName::FactoryStartComplectation,
            json!({
                "factory_id": factory.id,
                "company_id": factory.company_id,
                "resource": resource,
                "stages": stages,
            }),
        );
        Ok(factory)
    }

    /// Request (or withdraw) one batch.
    pub fn set_produce(&mut self, id: FactoryId, produce: bool) -> Result<Factory, GameError> {
        let mut factory = self.acting_factory(id)?;
        if factory.in_production() {
            return Err(GameError::State(format!(
                "factory {id} is in the middle of a batch"
            )));
        }
        if produce && factory.complectation.is_none() {
            return Err(GameError::State(format!("factory {id} is not tooled")));
        }
        factory.produce = produce;
        self.save(&factory)?;
        Ok(factory)
    }

    /// Toggle automatic restarts.
    pub fn set_auto(&mut self, id: FactoryId, is_auto: bool) -> Result<Factory, GameError> {
        let mut factory = self.acting_factory(id)?;
        factory.is_auto = is_auto;
        self.save(&factory)?;
        Ok(factory)
    }

    /// Retool up to `count` idle factories of a company for `resource`.
    pub fn complete_free_factories(
        &mut self,
        company: CompanyId,
        resource: &str,
        count: u32,
    ) -> Result<Vec<Factory>, GameError> {
        self.acting_company(company)?;
        let idle: Vec<Factory> = self
            .factories_of(company)?
            .into_iter()
            .filter(Factory::is_idle)
            .take(usize::try_from(count).unwrap_or(usize::MAX))
            .collect();
        if idle.is_empty() {
            return Err(GameError::State(format!("company {company} has no idle factories")));
        }
        idle.into_iter()
            .map(|factory| self.retool(factory, resource))
            .collect()
    }

    /// Factory step of the turn pipeline.
    pub(crate) fn run_factories(&mut self, company: &mut Company, effects: &ActiveEffects) -> Result<(), GameError> {
        let catalog = Arc::clone(&self.catalog);
        for mut factory in self.factories_of(company.id)? {
            if factory.complectation_stages > 0 {
                factory.complectation_stages = factory.complectation_stages.saturating_sub(1);
                if factory.complectation_stages == 0 {
                    self.emit(
                        EventName::FactoryEndComplectation,
                        json!({
                            "factory_id": factory.id,
                            "company_id": company.id,
                            "resource": factory.complectation,
                        }),
                    );
                }
                self.save(&factory)?;
                continue;
            }
            let Some(resource) = factory.complectation.clone() else {
                continue;
            };
            let Some(recipe) = catalog.resource(&resource).and_then(|r| r.production.as_ref()) else {
                continue;
            };
            let wants = factory.produce || factory.is_auto;
            if !wants || !(factory.in_production() || has_materials(company, recipe)) {
                continue;
            }

            if !factory.in_production() {
                for (material, need) in &recipe.materials {
                    self.remove_resource(company, material, *need)?;
                }
            }
            factory.progress[1] = recipe.turns;
            factory.progress[0] = factory.progress[0].saturating_add(effects.tasks_increment());

            if factory.progress[0] >= recipe.turns {
                let stored = self.add_resource_clamped(company, &resource, recipe.output);
                factory.produced = factory.produced.saturating_add(recipe.output);
                factory.progress[0] = 0;
                factory.produce = factory.is_auto && has_materials(company, recipe);
                debug!(factory_id = %factory.id, resource = %resource, stored, "batch finished");
                self.emit(
                    EventName::FactoryEndProduction,
                    json!({
                        "factory_id": factory.id,
                        "company_id": company.id,
                        "resource": resource,
                        "amount": recipe.output,
                        "stored": stored,
                    }),
                );
            }
            self.save(&factory)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::indexing_slicing)]

    use super::*;
    use crate::testing::TestGame;

    #[test]
    fn retool_cost_follows_level_distance() {
        assert_eq!(retool_stages(1, 2), 1);
        assert_eq!(retool_stages(2, 2), 2);
        assert_eq!(retool_stages(0, 2), 2);
        assert_eq!(retool_stages(3, 1), 2);
    }

    #[test]
    fn raw_and_unknown_resources_are_refused() {
        let mut t = TestGame::new();
        let (_, ids) = t.playing(1);
        let fid = t.game.factories_of(ids[0]).unwrap()[0].id;
        assert_eq!(t.game.recomplectation(fid, "wood").unwrap_err().kind(), "validation");
        assert_eq!(t.game.recomplectation(fid, "gold").unwrap_err().kind(), "validation");
        assert_eq!(
            t.game.recomplectation(FactoryId(99), "nails").unwrap_err().kind(),
            "not_found"
        );
    }

    #[test]
    fn retooling_to_the_same_resource_is_allowed() {
        let mut t = TestGame::new();
        let (_, ids) = t.playing(1);
        let fid = t.game.factories_of(ids[0]).unwrap()[0].id;
        let f = t.game.recomplectation(fid, "planks").unwrap();
        assert_eq!(f.complectation_stages, 1);
        assert_eq!(f.progress, [0, 1]);
    }

    #[test]
    fn one_shot_batch_consumes_materials_once() {
        let mut t = TestGame::new();
        let (_, ids) = t.playing(1);
        let fid = t.game.factories_of(ids[0]).unwrap()[0].id;
        t.stock(ids[0], "wood", 4);
        t.game.set_produce(fid, true).unwrap();

        let mut c = t.game.company(ids[0]).unwrap();
        t.game.run_factories(&mut c, &ActiveEffects::default()).unwrap();
        assert_eq!(c.resource_amount("wood"), 2);
        assert_eq!(c.resource_amount("planks"), 1);
        let f = t.game.factory(fid).unwrap();
        assert_eq!(f.produced, 1);
        assert!(!f.produce);

        t.game.run_factories(&mut c, &ActiveEffects::default()).unwrap();
        assert_eq!(c.resource_amount("planks"), 1);
    }

    #[test]
    fn auto_factory_keeps_going_while_materials_last() {
        let mut t = TestGame::new();
        let (_, ids) = t.playing(1);
        let fid = t.game.factories_of(ids[0]).unwrap()[0].id;
        t.stock(ids[0], "wood", 5);
        t.game.set_auto(fid, true).unwrap();

        let mut c = t.game.company(ids[0]).unwrap();
        for _ in 0..3 {
            t.game.run_factories(&mut c, &ActiveEffects::default()).unwrap();
        }
        assert_eq!(c.resource_amount("planks"), 2);
        assert_eq!(c.resource_amount("wood"), 1);
        assert!(!t.game.factory(fid).unwrap().produce);
    }

    #[test]
    fn complete_free_factories_needs_idle_ones() {
        let mut t = TestGame::new();
        let (_, ids) = t.playing(1);
        let done = t.game.complete_free_factories(ids[0], "nails", 5).unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].complectation_stages, 1);
        let err = t
            .game
            .complete_free_factories(ids[0], "planks", 1)
            .unwrap_err();
        assert_eq!(err.kind(), "state");
    }

    #[test]
    fn produce_is_locked_mid_batch() {
        let mut t = TestGame::new();
        let (_, ids) = t.playing(1);
        let fid = t.game.factories_of(ids[0]).unwrap()[0].id;
        t.game.recomplectation(fid, "nails").unwrap();
        let mut c = t.game.company(ids[0]).unwrap();
        t.game.run_factories(&mut c, &ActiveEffects::default()).unwrap();
        t.stock(ids[0], "wood", 2);
        let mut c = t.game.company(ids[0]).unwrap();
        t.game.set_produce(fid, true).unwrap();
        t.game.run_factories(&mut c, &ActiveEffects::default()).unwrap();
        assert!(t.game.factory(fid).unwrap().in_production());
        assert_eq!(t.game.set_produce(fid, false).unwrap_err().kind(), "state");
        assert_eq!(t.game.recomplectation(fid, "planks").unwrap_err().kind(), "state");
    }
}
