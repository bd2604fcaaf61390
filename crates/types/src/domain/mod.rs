//! The marketplace domain model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::address::Address;
use crate::detail::Cid;

/// An on-chain contract namespace. Created on first reference; stable once seen.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Protocol {
    /// Address of the protocol contract.
    pub address: Address,
    /// CID of the protocol's details blob, if any.
    pub details_link: Option<Cid>,
}

/// A marketplace participant.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    /// On-chain assigned numeric id.
    pub id: u64,
    /// The address that owns this provider's on-chain registration.
    pub owner_address: Address,
    /// The address used to sign off-chain request traffic.
    pub operator_address: Address,
    /// The network endpoint (host/URL) this provider's operator is reachable
    /// at. A virtual provider must share this with its gateway, alongside
    /// the operator address.
    pub endpoint: String,
    /// CID of the provider details blob.
    pub details_link: Cid,
    /// `true` if this provider's operator identity is delegated to a gateway.
    pub is_virtual: bool,
    /// The gateway provider id this virtual provider is hosted under, if any.
    pub gateway_provider_id: Option<u64>,
}

impl Provider {
    /// A provider is a gateway if it fronts at least one virtual child; this
    /// flag alone does not determine that — callers check the roster. A
    /// provider can be identified as eligible to host children iff it is not
    /// itself virtual.
    pub fn can_host_virtual_children(&self) -> bool {
        !self.is_virtual
    }
}

/// An item a provider sells within a protocol.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    /// On-chain assigned numeric id.
    pub id: u64,
    /// Address of the offer's owning provider.
    pub owner_address: Address,
    /// Per-second fee, as a decimal string to avoid precision loss.
    pub fee_per_second: String,
    /// Remaining stock.
    pub stock_amount: u64,
    /// CID of the offer's details blob.
    pub details_link: Cid,
}

/// The lifecycle status of an on-chain agreement.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementStatus {
    /// The agreement is currently funded and in force.
    Active,
    /// The agreement has ended (closed or drained).
    NotActive,
}

/// A user's purchase of an offer, tracked on-chain.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Agreement {
    /// On-chain assigned numeric id; doubles as the local resource id.
    pub id: u64,
    /// Address of the agreement's user.
    pub user_address: Address,
    /// Address of the serving provider (physical or virtual).
    pub provider_address: Address,
    /// The purchased offer's id.
    pub offer_id: u64,
    /// Remaining balance, as a decimal string.
    pub balance: String,
    /// Current status.
    pub status: AgreementStatus,
    /// Unix timestamp (seconds) the agreement was created.
    pub created_at: u64,
}

impl Agreement {
    /// Balance is exhausted, parsed as a non-negative decimal.
    ///
    /// Returns `true` for `"0"`, `"0.0"` and any value that parses to zero;
    /// unparsable balances are treated as non-zero (never force-closed).
    pub fn balance_is_zero(&self) -> bool {
        self.balance
            .parse::<f64>()
            .map(|b| b <= 0.0)
            .unwrap_or(false)
    }
}

/// Deployment status of a locally-managed resource.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    /// `ServiceBackend::create` has been called; not yet confirmed running.
    Deploying,
    /// The backend confirms the resource is serving.
    Running,
    /// `ServiceBackend::create` raised an error.
    Failed,
    /// The agreement closed (or was force-closed); details are wiped.
    Closed,
}

/// The daemon's local projection of an active agreement.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Equal to the agreement id.
    pub id: u64,
    /// Protocol this resource's agreement lives under.
    pub protocol_address: Address,
    /// Human-facing name, not required to be unique.
    pub name: String,
    /// Address of the agreement's user; authorizes `/resources` queries.
    pub owner_address: Address,
    /// The purchased offer's id.
    pub offer_id: u64,
    /// The serving provider's id (may be a virtual provider).
    pub provider_id: u64,
    /// Current deployment status.
    pub deployment_status: DeploymentStatus,
    /// Free-form backend-defined details. Keys beginning with `_` are private
    /// and stripped before being returned over `/resources`.
    pub details: BTreeMap<String, Value>,
    /// `false` once the agreement is closed; never resurrected.
    pub is_active: bool,
    /// Unix timestamp (seconds) this row was created.
    pub created_at: u64,
}

impl Resource {
    /// Returns `details` with all `_`-prefixed keys removed, for external
    /// responses (`GET /resources`).
    pub fn public_details(&self) -> BTreeMap<String, Value> {
        self.details
            .iter()
            .filter(|(k, _)| !k.starts_with('_'))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Transitions this resource into its closed, detail-wiped form.
    pub fn close(&mut self) {
        self.is_active = false;
        self.deployment_status = DeploymentStatus::Closed;
        self.details.clear();
    }
}

/// A per-(offer, protocol) JSON configuration blob owned by a gateway provider.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct VirtualProviderOfferConfiguration {
    /// The offer this configuration belongs to.
    pub offer_id: u64,
    /// Protocol the offer was registered under.
    pub protocol_address: Address,
    /// Backend-defined configuration payload.
    pub configuration: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        format!("0x{:040x}", n).parse().unwrap()
    }

    #[test]
    fn public_details_strips_underscore_keys() {
        let mut details = BTreeMap::new();
        details.insert("endpoint".to_string(), Value::String("https://x".into()));
        details.insert("_apiKey".to_string(), Value::String("secret".into()));
        let resource = Resource {
            id: 1,
            protocol_address: addr(1),
            name: "r".into(),
            owner_address: addr(2),
            offer_id: 1,
            provider_id: 1,
            deployment_status: DeploymentStatus::Running,
            details,
            is_active: true,
            created_at: 0,
        };
        let public = resource.public_details();
        assert!(public.contains_key("endpoint"));
        assert!(!public.contains_key("_apiKey"));
    }

    #[test]
    fn close_wipes_details_and_marks_inactive() {
        let mut details = BTreeMap::new();
        details.insert("x".to_string(), Value::Bool(true));
        let mut resource = Resource {
            id: 1,
            protocol_address: addr(1),
            name: "r".into(),
            owner_address: addr(2),
            offer_id: 1,
            provider_id: 1,
            deployment_status: DeploymentStatus::Running,
            details,
            is_active: true,
            created_at: 0,
        };
        resource.close();
        assert!(!resource.is_active);
        assert!(resource.details.is_empty());
        assert_eq!(resource.deployment_status, DeploymentStatus::Closed);
    }

    #[test]
    fn balance_is_zero_detects_drained_agreement() {
        let agreement = Agreement {
            id: 1,
            user_address: addr(1),
            provider_address: addr(2),
            offer_id: 1,
            balance: "0".into(),
            status: AgreementStatus::Active,
            created_at: 0,
        };
        assert!(agreement.balance_is_zero());
    }
}
