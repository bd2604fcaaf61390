//! Builders for the domain types, so tests can construct a `Provider` or
//! `Agreement` by naming only the fields that matter to the scenario.

use std::collections::BTreeMap;

use providerd_types::domain::{
    Agreement, AgreementStatus, DeploymentStatus, Offer, Protocol, Provider, Resource,
};
use providerd_types::{Address, Cid};

/// Builds a deterministic address from a small integer, so tests can write
/// `addr(1)`, `addr(2)` instead of spelling out 40 hex digits each time.
pub fn addr(n: u8) -> Address {
    #[allow(clippy::unwrap_used)]
    format!("0x{:040x}", n).parse().unwrap()
}

/// Builds a fixture [`Protocol`] with no details link.
pub fn protocol(address: Address) -> Protocol {
    Protocol {
        address,
        details_link: None,
    }
}

/// Builder for a fixture [`Provider`].
pub struct ProviderBuilder {
    id: u64,
    owner_address: Address,
    operator_address: Address,
    endpoint: String,
    is_virtual: bool,
    gateway_provider_id: Option<u64>,
}

impl ProviderBuilder {
    /// Starts a builder for a physical (non-virtual) provider.
    pub fn new(id: u64, owner_address: Address) -> Self {
        ProviderBuilder {
            id,
            operator_address: owner_address.clone(),
            owner_address,
            endpoint: "https://provider.example".to_string(),
            is_virtual: false,
            gateway_provider_id: None,
        }
    }

    /// Uses a different operator address than the owner.
    pub fn operator(mut self, operator_address: Address) -> Self {
        self.operator_address = operator_address;
        self
    }

    /// Uses a different network endpoint than the default fixture value.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Marks this provider as a virtual child of `gateway_provider_id`.
    pub fn virtual_child_of(mut self, gateway_provider_id: u64) -> Self {
        self.is_virtual = true;
        self.gateway_provider_id = Some(gateway_provider_id);
        self
    }

    /// Finishes the builder, computing `details_link` from the provider id.
    pub fn build(self) -> Provider {
        Provider {
            id: self.id,
            owner_address: self.owner_address,
            operator_address: self.operator_address,
            endpoint: self.endpoint,
            details_link: Cid::of(format!("provider-{}", self.id).as_bytes()),
            is_virtual: self.is_virtual,
            gateway_provider_id: self.gateway_provider_id,
        }
    }
}

/// Builds a fixture [`Offer`] owned by `owner_address`.
pub fn offer(id: u64, owner_address: Address) -> Offer {
    Offer {
        id,
        owner_address,
        fee_per_second: "1000".to_string(),
        stock_amount: 10,
        details_link: Cid::of(format!("offer-{}", id).as_bytes()),
    }
}

/// Builds a fixture [`Agreement`] with a non-zero balance, `Active` status.
pub fn agreement(id: u64, user_address: Address, provider_address: Address, offer_id: u64) -> Agreement {
    Agreement {
        id,
        user_address,
        provider_address,
        offer_id,
        balance: "10000".to_string(),
        status: AgreementStatus::Active,
        created_at: 0,
    }
}

/// Builds a fixture [`Agreement`] that already has a zero balance, for
/// balance-sweeper tests.
pub fn zero_balance_agreement(
    id: u64,
    user_address: Address,
    provider_address: Address,
    offer_id: u64,
) -> Agreement {
    Agreement {
        balance: "0".to_string(),
        ..agreement(id, user_address, provider_address, offer_id)
    }
}

/// Builds a fixture [`Resource`] backing `agreement_id`'s deployment.
pub fn resource(
    id: u64,
    protocol_address: Address,
    owner_address: Address,
    offer_id: u64,
    provider_id: u64,
) -> Resource {
    Resource {
        id,
        protocol_address,
        name: format!("resource-{}", id),
        owner_address,
        offer_id,
        provider_id,
        deployment_status: DeploymentStatus::Deploying,
        details: BTreeMap::new(),
        is_active: true,
        created_at: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_builder_defaults_to_physical() {
        let provider = ProviderBuilder::new(1, addr(1)).build();
        assert!(!provider.is_virtual);
        assert_eq!(provider.gateway_provider_id, None);
        assert_eq!(provider.operator_address, addr(1));
    }

    #[test]
    fn provider_builder_marks_virtual_child() {
        let provider = ProviderBuilder::new(2, addr(2))
            .operator(addr(3))
            .virtual_child_of(1)
            .build();
        assert!(provider.is_virtual);
        assert_eq!(provider.gateway_provider_id, Some(1));
        assert_eq!(provider.operator_address, addr(3));
    }

    #[test]
    fn zero_balance_agreement_reports_zero() {
        let agreement = zero_balance_agreement(1, addr(1), addr(2), 1);
        assert!(agreement.balance_is_zero());
    }
}
