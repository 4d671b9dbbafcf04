//! Broadcast events emitted by game mutations.
//!
//! Every state change produces an [`ApiEvent`]. The dispatcher drains the
//! events a handler produced and fans them out, in order, as
//! `{"type": "api-<name>", "data": {...}}` frames.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Stable broadcast names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    // --- Session ---
    /// A session was created.
    CreateSession,
    /// A session changed stage.
    UpdateSessionStage,
    /// A session was deleted.
    SessionDeleted,
    /// A session reached `End`; carries rankings.
    GameEnded,
    /// A random event became active.
    SessionEventStarted,
    /// The active random event expired.
    SessionEventEnded,

    // --- Company ---
    /// A company was created.
    CreateCompany,
    /// A company took a map cell.
    CompanySetPosition,
    /// Balance changed.
    CompanyBalanceChanged,
    /// Resource units were added to the warehouse.
    CompanyResourceAdded,
    /// Resource units were removed from the warehouse.
    CompanyResourceRemoved,
    /// An improvement was upgraded.
    CompanyImprovementUpgraded,
    /// Reputation changed.
    CompanyReputationChanged,
    /// A credit was taken.
    CompanyCreditTaken,
    /// A credit payment was made.
    CompanyCreditPaid,
    /// A credit was closed or written off.
    CompanyCreditRemoved,
    /// A deposit was opened.
    CompanyDepositTaken,
    /// A deposit was withdrawn.
    CompanyDepositWithdrawn,
    /// Taxes were paid.
    CompanyTaxPaid,
    /// The company was jailed.
    CompanyToPrison,
    /// The company was released.
    CompanyLeftPrison,
    /// The company was deleted.
    CompanyDeleted,

    // --- User ---
    /// A user was created.
    CreateUser,
    /// A user was renamed.
    UpdateUser,
    /// A user joined a company.
    UserAddedToCompany,
    /// A user left a company.
    UserLeftCompany,
    /// A user was deleted.
    UserDeleted,

    // --- Factory ---
    /// A factory was built.
    FactoryCreate,
    /// A factory was removed.
    FactoryDelete,
    /// Retooling started.
    FactoryStartComplectation,
    /// Retooling finished.
    FactoryEndComplectation,
    /// A batch was produced.
    FactoryEndProduction,

    // --- Exchange ---
    /// An offer was listed.
    ExchangeCreate,
    /// A buyer placed an escrowed request.
    ExchangePurchaseRequest,
    /// The seller accepted a buyer.
    ExchangeAccepted,
    /// The seller rejected a buyer.
    ExchangeRejected,
    /// The seller cancelled the offer.
    ExchangeCancelled,
    /// Goods and payment changed hands.
    ExchangeCompleted,
    /// The seller missed the deadline.
    ExchangeFailed,
    /// An offer was removed.
    ExchangeDeleted,

    // --- Contract ---
    /// A contract was proposed.
    ContractCreated,
    /// The supplier accepted.
    ContractAccepted,
    /// The supplier declined.
    ContractDeclined,
    /// A delivery was made.
    ContractExecuted,
    /// A delivery was missed.
    ContractDeliveryMissed,
    /// The contract ran its course.
    ContractCompleted,
    /// The contract was never accepted.
    ContractExpired,
}

impl EventName {
    /// Wire name, including the `api-` prefix.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateSession => "api-create_session",
            Self::UpdateSessionStage => "api-update_session_stage",
            Self::SessionDeleted => "api-session_deleted",
            Self::GameEnded => "api-game_ended",
            Self::SessionEventStarted => "api-session_event_started",
            Self::SessionEventEnded => "api-session_event_ended",
            Self::CreateCompany => "api-create_company",
            Self::CompanySetPosition => "api-company_set_position",
            Self::CompanyBalanceChanged => "api-company_balance_changed",
            Self::CompanyResourceAdded => "api-company_resource_added",
            Self::CompanyResourceRemoved => "api-company_resource_removed",
            Self::CompanyImprovementUpgraded => "api-company_improvement_upgraded",
            Self::CompanyReputationChanged => "api-company_reputation_changed",
            Self::CompanyCreditTaken => "api-company_credit_taken",
            Self::CompanyCreditPaid => "api-company_credit_paid",
            Self::CompanyCreditRemoved => "api-company_credit_removed",
            Self::CompanyDepositTaken => "api-company_deposit_taken",
            Self::CompanyDepositWithdrawn => "api-company_deposit_withdrawn",
            Self::CompanyTaxPaid => "api-company_tax_paid",
            Self::CompanyToPrison => "api-company_to_prison",
            Self::CompanyLeftPrison => "api-company_left_prison",
            Self::CompanyDeleted => "api-company_deleted",
            Self::CreateUser => "api-create_user",
            Self::UpdateUser => "api-update_user",
            Self::UserAddedToCompany => "api-user_added_to_company",
            Self::UserLeftCompany => "api-user_left_company",
            Self::UserDeleted => "api-user_deleted",
            Self::FactoryCreate => "api-factory-create",
            Self::FactoryDelete => "api-factory-delete",
            Self::FactoryStartComplectation => "api-factory-start-complectation",
            Self::FactoryEndComplectation => "api-factory-end-complectation",
            Self::FactoryEndProduction => "api-factory-end-production",
            Self::ExchangeCreate => "api-exchange-create",
            Self::ExchangePurchaseRequest => "api-exchange-purchase-request",
            Self::ExchangeAccepted => "api-exchange-accepted",
            Self::ExchangeRejected => "api-exchange-rejected",
            Self::ExchangeCancelled => "api-exchange-cancelled",
            Self::ExchangeCompleted => "api-exchange-completed",
            Self::ExchangeFailed => "api-exchange-failed",
            Self::ExchangeDeleted => "api-exchange-deleted",
            Self::ContractCreated => "api-contract_created",
            Self::ContractAccepted => "api-contract_accepted",
            Self::ContractDeclined => "api-contract_declined",
            Self::ContractExecuted => "api-contract_executed",
            Self::ContractDeliveryMissed => "api-contract_delivery_missed",
            Self::ContractCompleted => "api-contract_completed",
            Self::ContractExpired => "api-contract_expired",
        }
    }
}

impl core::fmt::Display for EventName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A broadcast produced by a mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiEvent {
    /// Event name.
    pub name: EventName,
    /// Event payload.
    pub data: Value,
}

impl ApiEvent {
    /// Build an event.
    pub const fn new(name: EventName, data: Value) -> Self {
        Self { name, data }
    }

    /// The wire frame `{"type": name, "data": data}`.
    pub fn to_message(&self) -> Value {
        json!({
            "type": self.name.as_str(),
            "data": self.data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_frame_carries_prefixed_type() {
        let event = ApiEvent::new(
            EventName::CompanyResourceAdded,
            json!({"company_id": 1, "resource": "wood", "amount": 5}),
        );
        let msg = event.to_message();
        assert_eq!(msg["type"], "api-company_resource_added");
        assert_eq!(msg["data"]["amount"], 5);
    }

    #[test]
    fn factory_and_exchange_names_use_dashes() {
        assert_eq!(EventName::FactoryEndProduction.as_str(), "api-factory-end-production");
        assert_eq!(EventName::ExchangeCompleted.to_string(), "api-exchange-completed");
    }
}
