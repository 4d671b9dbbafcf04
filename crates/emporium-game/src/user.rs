//! Users and company membership.
//!
//! A user is identified by its chat id *within a session*: the same chat
//! id may play in several sessions, so every lookup filters on both.

use emporium_types::{Company, Document, EventName, SessionId, SessionStage, User, UserId};
use serde_json::{Value, json};
use tracing::info;

use crate::error::GameError;
use crate::game::Game;

fn user_filter(id: UserId, session_id: &SessionId) -> Value {
    json!({ "id": id, "session_id": session_id })
}

impl Game {
    /// User `id` of a session.
    pub fn user(&self, id: UserId, session_id: &SessionId) -> Result<User, GameError> {
        self.store
            .find_one_typed(&user_filter(id, session_id))?
            .ok_or_else(|| GameError::not_found("user", id))
    }

    /// Users, optionally narrowed to a session and a company.
    pub fn users(
        &self,
        session_id: Option<&SessionId>,
        company_id: Option<emporium_types::CompanyId>,
    ) -> Result<Vec<User>, GameError> {
        let mut filter = serde_json::Map::new();
        if let Some(session_id) = session_id {
            filter.insert(String::from("session_id"), json!(session_id));
        }
        if let Some(company_id) = company_id {
            filter.insert(String::from("company_id"), json!(company_id));
        }
        Ok(self.store.find_typed(&Value::Object(filter))?)
    }

    pub(crate) fn save_user(&self, user: &User) -> Result<(), GameError> {
        let doc = serde_json::to_value(user)?;
        let filter = user_filter(user.id, &user.session_id);
        if self.store.update(User::TABLE, &filter, &doc)? == 0 {
            self.store.insert(User::TABLE, doc)?;
        }
        Ok(())
    }

    /// Register a user in the lobby.
    ///
    /// # Errors
    ///
    /// - [`GameError::State`] outside `FreeUserConnect`.
    /// - [`GameError::Validation`] for an empty username, a username taken
    ///   in the session, or an id already registered there.
    pub fn create_user(&mut self, session_id: &SessionId, id: UserId, username: &str) -> Result<User, GameError> {
        let session = self.session(session_id)?;
        if session.stage != SessionStage::FreeUserConnect {
            return Err(GameError::State(String::from(
                "users can only join during FreeUserConnect",
            )));
        }
        let username = username.trim();
        if username.is_empty() {
            return Err(GameError::Validation(String::from("username is empty")));
        }
        if self.store.count(User::TABLE, &user_filter(id, session_id))? > 0 {
            return Err(GameError::Validation(format!(
                "user {id} is already in session {session_id}"
            )));
        }
        self.require_free_username(session_id, username)?;

        let user = User {
            id,
            username: username.to_owned(),
            session_id: session_id.clone(),
            company_id: None,
        };
        self.save_user(&user)?;
        info!(user_id = %id, session_id = %session_id, "user created");
        self.emit(EventName::CreateUser, json!({ "user": user }));
        Ok(user)
    }

    fn require_free_username(&self, session_id: &SessionId, username: &str) -> Result<(), GameError> {
        let taken = self.store.count(
            User::TABLE,
            &json!({ "session_id": session_id, "username": username }),
        )?;
        if taken > 0 {
            return Err(GameError::Validation(format!("username {username} is taken")));
        }
        Ok(())
    }

    /// Rename a user.
    pub fn update_user(&mut self, id: UserId, session_id: &SessionId, username: &str) -> Result<User, GameError> {
        let mut user = self.user(id, session_id)?;
        let username = username.trim();
        if username.is_empty() {
            return Err(GameError::Validation(String::from("username is empty")));
        }
        if user.username != username {
            self.require_free_username(session_id, username)?;
        }
        user.username = username.to_owned();
        self.save_user(&user)?;
        self.emit(EventName::UpdateUser, json!({ "user": user }));
        Ok(user)
    }

    /// Join the company whose secret code is `secret_code`.
    ///
    /// # Errors
    ///
    /// - [`GameError::State`] outside `FreeUserConnect` or when the user
    ///   already has a company.
    /// - [`GameError::NotFound`] for an unknown code.
    /// - [`GameError::Capacity`] when the company is full.
    pub fn add_user_to_company(
        &mut self,
        id: UserId,
        session_id: &SessionId,
        secret_code: u32,
    ) -> Result<Company, GameError> {
        let session = self.session(session_id)?;
        if session.stage != SessionStage::FreeUserConnect {
            return Err(GameError::State(String::from(
                "companies can only be joined during FreeUserConnect",
            )));
        }
        let mut user = self.user(id, session_id)?;
        if let Some(current) = user.company_id {
            return Err(GameError::State(format!(
                "user {id} already belongs to company {current}"
            )));
        }
        let mut company: Company = self
            .store
            .find_one_typed(&json!({ "session_id": session_id, "secret_code": secret_code }))?
            .ok_or_else(|| GameError::not_found("company with code", secret_code))?;
        let max = usize::try_from(self.catalog.settings.max_players_in_company).unwrap_or(usize::MAX);
        if company.users.len() >= max {
            return Err(GameError::Capacity(format!(
                "company {} already has {} players",
                company.id,
                company.users.len()
            )));
        }
        if company.users.is_empty() {
            company.owner = id;
        }
        company.users.push(id);
        user.company_id = Some(company.id);
        self.save(&company)?;
        self.save_user(&user)?;
        self.emit(
            EventName::UserAddedToCompany,
            json!({ "user_id": id, "company_id": company.id }),
        );
        Ok(company)
    }

    /// Leave the current company. Ownership passes to the next member; a
    /// company left empty is deleted.
    pub fn leave_company(&mut self, id: UserId, session_id: &SessionId) -> Result<(), GameError> {
        let mut user = self.user(id, session_id)?;
        let Some(company_id) = user.company_id else {
            return Err(GameError::State(format!("user {id} has no company")));
        };
        let mut company = self.company(company_id)?;
        self.live_session(&company)?;

        company.users.retain(|u| *u != id);
        user.company_id = None;
        self.save_user(&user)?;
        self.emit(
            EventName::UserLeftCompany,
            json!({ "user_id": id, "company_id": company_id }),
        );

        if company.users.is_empty() {
            return self.delete_company(company_id);
        }
        if company.owner == id {
            company.owner = company.users.first().copied().unwrap_or_default();
        }
        self.save(&company)?;
        Ok(())
    }

    /// Delete a user, leaving its company first.
    pub fn delete_user(&mut self, id: UserId, session_id: &SessionId) -> Result<(), GameError> {
        let user = self.user(id, session_id)?;
        if user.company_id.is_some() {
            self.leave_company(id, session_id)?;
        }
        self.store.delete(User::TABLE, &user_filter(id, session_id))?;
        self.emit(
            EventName::UserDeleted,
            json!({ "user_id": id, "session_id": session_id }),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::testing::TestGame;

    #[test]
    fn same_chat_id_may_join_two_sessions() {
        let mut t = TestGame::new();
        let a = t.lobby();
        let b = t.lobby();
        t.game.create_user(&a, UserId(-100), "alice").unwrap();
        t.game.create_user(&b, UserId(-100), "alice").unwrap();
        assert_eq!(t.game.user(UserId(-100), &a).unwrap().session_id, a);
        assert_eq!(t.game.users(None, None).unwrap().len(), 2);

        let err = t.game.create_user(&a, UserId(-100), "again").unwrap_err();
        assert_eq!(err.kind(), "validation");
        let err = t.game.create_user(&a, UserId(5), "alice").unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn rename_keeps_usernames_unique() {
        let mut t = TestGame::new();
        let s = t.lobby();
        t.game.create_user(&s, UserId(1), "alice").unwrap();
        t.game.create_user(&s, UserId(2), "bob").unwrap();
        let err = t.game.update_user(UserId(2), &s, "alice").unwrap_err();
        assert_eq!(err.kind(), "validation");
        let u = t.game.update_user(UserId(2), &s, "robert").unwrap();
        assert_eq!(u.username, "robert");
        assert_eq!(t.game.user(UserId(2), &s).unwrap().username, "robert");
    }

    #[test]
    fn join_by_secret_code_up_to_capacity() {
        let mut t = TestGame::new();
        let s = t.lobby();
        let id = t.company(&s, 1, "Acme");
        let code = t.game.company(id).unwrap().secret_code;
        for uid in 2..=3 {
            t.game.create_user(&s, UserId(uid), &format!("u{uid}")).unwrap();
            t.game.add_user_to_company(UserId(uid), &s, code).unwrap();
        }
        t.game.create_user(&s, UserId(4), "u4").unwrap();
        let err = t.game.add_user_to_company(UserId(4), &s, code).unwrap_err();
        assert_eq!(err.kind(), "capacity");
        let err = t.game.add_user_to_company(UserId(4), &s, 1).unwrap_err();
        assert_eq!(err.kind(), "not_found");
        assert_eq!(t.game.users(Some(&s), Some(id)).unwrap().len(), 3);
    }

    #[test]
    fn owner_leaving_passes_ownership_and_last_one_out_deletes() {
        let mut t = TestGame::new();
        let s = t.lobby();
        let id = t.company(&s, 1, "Acme");
        let code = t.game.company(id).unwrap().secret_code;
        t.game.create_user(&s, UserId(2), "u2").unwrap();
        t.game.add_user_to_company(UserId(2), &s, code).unwrap();

        t.game.leave_company(UserId(1), &s).unwrap();
        let c = t.game.company(id).unwrap();
        assert_eq!(c.owner, UserId(2));
        assert_eq!(c.users, vec![UserId(2)]);

        t.game.delete_user(UserId(2), &s).unwrap();
        assert!(t.game.company(id).is_err());
        assert!(t.game.user(UserId(2), &s).is_err());
    }
}
