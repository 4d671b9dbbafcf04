//! End-to-end game scenarios over an in-memory store, the sample catalog,
//! a manual clock and a fixed seed. Random events are disabled.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::indexing_slicing
)]

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use emporium_bank::{Asset, DealRef};
use emporium_game::{Catalog, Clock, ExchangePrice, Game, GameSettings, ManualClock};
use emporium_store::DocumentStore;
use emporium_types::{
    CompanyId, EventName, ExchangeStatus, ImprovementKind, SessionId, SessionStage, UserId,
};

struct World {
    game: Game,
    clock: Arc<ManualClock>,
    session: SessionId,
    companies: Vec<CompanyId>,
}

impl World {
    /// A session on turn 1 with `n` companies on forest cells.
    fn start(n: usize) -> Self {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).single().unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let mut game = Game::new(
            Arc::new(DocumentStore::in_memory()),
            Arc::new(Catalog::sample().unwrap()),
            Arc::clone(&clock) as Arc<dyn Clock>,
            GameSettings {
                event_chance_percent: 0,
                seed: Some(11),
            },
        );
        let session = game.create_session(None).unwrap().session_id;
        game.update_session_stage(&session, SessionStage::FreeUserConnect)
            .unwrap();

        let mut companies = Vec::new();
        for i in 1..=n {
            let uid = i64::try_from(i).unwrap();
            game.create_user(&session, UserId(uid), &format!("player{uid}"))
                .unwrap();
            let company = game
                .create_company(&session, &format!("Firm {uid}"), Some(UserId(uid)))
                .unwrap();
            companies.push(company.id);
        }

        game.update_session_stage(&session, SessionStage::CellSelect)
            .unwrap();
        let map = game.session(&session).unwrap();
        let forests: Vec<(u32, u32)> = game
            .free_cells(&session)
            .unwrap()
            .into_iter()
            .filter(|&(x, y)| map.cell_at(x, y) == Some("forest"))
            .collect();
        for (company, &(x, y)) in companies.iter().zip(&forests) {
            game.set_position(*company, x, y).unwrap();
        }
        game.update_session_stage(&session, SessionStage::Game)
            .unwrap();

        Self {
            game,
            clock,
            session,
            companies,
        }
    }

    fn id(&self, n: usize) -> CompanyId {
        self.companies[n]
    }

    fn step(&self) -> u32 {
        self.game.session(&self.session).unwrap().step
    }

    /// Let the Game and ChangeTurn timers fire.
    fn next_turn(&mut self) {
        for _ in 0..2 {
            self.clock.advance(Duration::minutes(6));
            self.game.run_due_tasks().unwrap();
        }
    }

    fn stock(&self, company: CompanyId, resource: &str, amount: u32) {
        let mut c = self.game.company(company).unwrap();
        c.warehouses.insert(resource.to_owned(), amount);
        self.game.store().save(&c).unwrap();
    }

    fn set_balance(&self, company: CompanyId, balance: i64) {
        let mut c = self.game.company(company).unwrap();
        c.balance = balance;
        self.game.store().save(&c).unwrap();
    }
}

#[test]
fn solo_lifecycle_extracts_wood_on_the_first_turn() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let mut game = Game::new(
        Arc::new(DocumentStore::in_memory()),
        Arc::new(Catalog::sample().unwrap()),
        Arc::clone(&clock) as Arc<dyn Clock>,
        GameSettings {
            event_chance_percent: 0,
            seed: Some(1),
        },
    );
    let session = game.create_session(None).unwrap().session_id;
    game.update_session_stage(&session, SessionStage::FreeUserConnect)
        .unwrap();
    game.create_user(&session, UserId(1), "solo").unwrap();
    let company = game
        .create_company(&session, "Solo", Some(UserId(1)))
        .unwrap()
        .id;
    game.update_session_stage(&session, SessionStage::CellSelect)
        .unwrap();
    let map = game.session(&session).unwrap();
    let (x, y) = game
        .free_cells(&session)
        .unwrap()
        .into_iter()
        .find(|&(x, y)| map.cell_at(x, y) == Some("forest"))
        .unwrap();
    game.set_position(company, x, y).unwrap();
    game.drain_events();

    game.update_session_stage(&session, SessionStage::Game)
        .unwrap();
    assert_eq!(game.company(company).unwrap().resource_amount("wood"), 5);
    let added = game
        .drain_events()
        .into_iter()
        .find(|e| e.name == EventName::CompanyResourceAdded)
        .unwrap();
    assert_eq!(added.data["amount"], 5);
    assert_eq!(added.data["resource"], "wood");
}

#[test]
fn exchange_happy_path_moves_goods_and_money_once() {
    let mut w = World::start(2);
    let (seller, buyer) = (w.id(0), w.id(1));
    w.stock(seller, "wood", 10);
    w.set_balance(buyer, 1000);

    let offer = w
        .game
        .create_exchange(seller, "wood", 10, ExchangePrice::Money(500))
        .unwrap();
    w.game.buy_exchange(offer.id, buyer).unwrap();
    assert_eq!(w.game.company(buyer).unwrap().balance, 500);

    let pending = w.game.accept_exchange(offer.id, seller, buyer).unwrap();
    assert_eq!(pending.status, ExchangeStatus::Pending);
    let done = w.game.send_exchange_goods(offer.id, seller).unwrap();
    assert_eq!(done.status, ExchangeStatus::Completed);

    let s = w.game.company(seller).unwrap();
    let b = w.game.company(buyer).unwrap();
    assert_eq!(s.resource_amount("wood"), 0);
    assert_eq!(s.balance, 5500);
    assert_eq!(b.resource_amount("wood"), 15);
    assert_eq!(b.balance, 500);
    assert_eq!(w.game.escrow().verify_resolved(DealRef::Exchange(offer.id)), Ok(()));
}

#[test]
fn unanswered_requests_are_refunded_after_three_turns() {
    let mut w = World::start(3);
    let seller = w.id(0);
    let offer = w
        .game
        .create_exchange(seller, "wood", 5, ExchangePrice::Money(200))
        .unwrap();
    let created = w.step();
    for buyer in [w.id(1), w.id(2)] {
        w.game.buy_exchange(offer.id, buyer).unwrap();
        assert_eq!(w.game.company(buyer).unwrap().balance, 4800);
    }

    for _ in 0..3 {
        w.next_turn();
    }
    assert_eq!(w.step(), created + 3);
    assert_eq!(w.game.exchange(offer.id).unwrap().purchase_requests.len(), 2);

    w.next_turn();
    let after = w.game.exchange(offer.id).unwrap();
    assert!(after.purchase_requests.is_empty());
    assert_eq!(after.status, ExchangeStatus::Active);
    for buyer in [w.id(1), w.id(2)] {
        assert_eq!(w.game.company(buyer).unwrap().balance, 5000);
    }
    assert_eq!(w.game.escrow().verify_resolved(DealRef::Exchange(offer.id)), Ok(()));
}

#[test]
fn credit_repaid_on_schedule_is_closed_with_a_bonus() {
    let mut w = World::start(1);
    let id = w.id(0);
    let c = w.game.take_credit(id, 10_000, 5).unwrap();
    let total = c.credits[0].total_to_pay;
    assert_eq!(total, 11_500);

    let mut paid = 0;
    for _ in 0..5 {
        w.next_turn();
        let due = w.game.company(id).unwrap().credits[0].need_pay;
        w.game.pay_credit(id, 0, due).unwrap();
        paid += due;
    }
    assert!((paid - total).abs() <= 1);
    let c = w.game.company(id).unwrap();
    assert!(c.credits.is_empty());
    assert_eq!(c.reputation, 110);
    assert_eq!(c.balance, 15_000 - total);
}

#[test]
fn four_turns_of_unpaid_taxes_lead_to_prison() {
    let mut w = World::start(1);
    let id = w.id(0);
    let mut c = w.game.company(id).unwrap();
    c.tax_debt = 50;
    w.game.store().save(&c).unwrap();

    for _ in 0..3 {
        w.next_turn();
        assert!(!w.game.company(id).unwrap().in_prison);
    }
    w.next_turn();
    let c = w.game.company(id).unwrap();
    let step = w.step();
    assert!(c.in_prison);
    assert_eq!(c.prison_end_step, Some(step + 2));
    assert_eq!(c.reputation, 0);

    let err = w.game.upgrade_improvement(id, ImprovementKind::Warehouse).unwrap_err();
    assert_eq!(err.kind(), "state");
    assert_eq!(w.game.take_credit(id, 1_000, 2).unwrap_err().kind(), "state");
    assert_eq!(w.game.pay_taxes(id, 10).unwrap_err().kind(), "state");

    w.next_turn();
    w.next_turn();
    assert!(!w.game.company(id).unwrap().in_prison);
}

#[test]
fn retooled_factory_produces_nails() {
    let mut w = World::start(1);
    let id = w.id(0);
    let factory = w.game.factories_of(id).unwrap()[0].clone();
    assert_eq!(factory.complectation.as_deref(), Some("planks"));

    let f = w.game.recomplectation(factory.id, "nails").unwrap();
    assert_eq!(f.complectation_stages, 1);

    w.next_turn();
    let f = w.game.factory(factory.id).unwrap();
    assert_eq!(f.complectation_stages, 0);
    assert!(!f.in_production());
    w.game.set_produce(factory.id, true).unwrap();

    w.next_turn();
    let f = w.game.factory(factory.id).unwrap();
    assert_eq!(f.progress, [1, 2]);
    // 15 extracted, 2 consumed by the first tick.
    assert_eq!(w.game.company(id).unwrap().resource_amount("wood"), 13);

    w.next_turn();
    let f = w.game.factory(factory.id).unwrap();
    assert_eq!(f.produced, 3);
    assert_eq!(f.progress[0], 0);
    assert!(!f.produce);
    let c = w.game.company(id).unwrap();
    assert_eq!(c.resource_amount("nails"), 3);
    assert_eq!(c.resource_amount("wood"), 18);
}

#[test]
fn deleting_a_company_mid_deal_conserves_escrow() {
    let mut w = World::start(3);
    let (seller, a, b) = (w.id(0), w.id(1), w.id(2));
    let offer = w
        .game
        .create_exchange(seller, "wood", 5, ExchangePrice::Money(300))
        .unwrap();
    w.game.buy_exchange(offer.id, a).unwrap();
    w.game.buy_exchange(offer.id, b).unwrap();
    let contract = w
        .game
        .create_contract(a, seller, "wood", 1, 2, 100)
        .unwrap();
    w.game.accept_contract(contract.id, seller).unwrap();

    w.game.delete_company(seller).unwrap();
    assert_eq!(w.game.company(a).unwrap().balance, 5000);
    assert_eq!(w.game.company(b).unwrap().balance, 5000);
    let deal = DealRef::Exchange(offer.id);
    assert!(w.game.escrow().outstanding(deal).get(&Asset::Money).is_none());
    assert_eq!(w.game.escrow().verify_resolved(deal), Ok(()));
    assert_eq!(
        w.game.escrow().verify_resolved(DealRef::Contract(contract.id)),
        Ok(())
    );
}

#[test]
fn last_turn_goes_straight_to_end() {
    let mut w = World::start(2);
    while w.step() < 15 {
        w.next_turn();
    }
    assert_eq!(w.game.session(&w.session).unwrap().stage, SessionStage::Game);
    w.clock.advance(Duration::minutes(6));
    w.game.run_due_tasks().unwrap();

    let session = w.game.session(&w.session).unwrap();
    assert_eq!(session.stage, SessionStage::End);
    let result = session.result.unwrap();
    assert_eq!(result.standings.len(), 2);
    assert!(session.change_turn_schedule_id.is_none());
    let err = w.game.take_credit(w.id(0), 1_000, 1).unwrap_err();
    assert_eq!(err.kind(), "state");
}
