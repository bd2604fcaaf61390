//! A scripted [`ChainClient`] fake: in-memory actors/offers/agreements, with
//! recorded calls so tests can assert on what the daemon actually did.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use providerd_facades::chain::{ChainClient, RegisterOfferRequest};
use providerd_types::address::Address;
use providerd_types::domain::{Agreement, Offer, Protocol, Provider};
use providerd_types::error::TransportError;
use providerd_types::Cid;

#[derive(Default)]
struct State {
    actors: HashMap<Address, Provider>,
    protocols_of: HashMap<u64, Vec<Protocol>>,
    offers: HashMap<u64, Offer>,
    provider_offers: HashMap<u64, Vec<u64>>,
    agreements: HashMap<u64, Agreement>,
    closed: Vec<u64>,
    registered_offers: Vec<RegisterOfferRequest>,
    next_offer_id: u64,
    fail_next: bool,
}

/// A fully scripted chain client: fixtures are registered with the `with_*`
/// builders, then the daemon under test drives it like a real one. Call
/// [`FakeChainClient::closed_agreements`] / [`FakeChainClient::registered_offers`]
/// after the fact to assert on side effects.
#[derive(Default)]
pub struct FakeChainClient {
    state: Mutex<State>,
}

impl FakeChainClient {
    /// Creates an empty fake.
    pub fn new() -> Self {
        FakeChainClient {
            state: Mutex::new(State {
                next_offer_id: 1000,
                ..State::default()
            }),
        }
    }

    #[allow(clippy::unwrap_used)]
    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Registers a provider/owner actor, addressable by `provider.owner_address`.
    pub fn with_actor(self, provider: Provider) -> Self {
        self.lock()
            .actors
            .insert(provider.owner_address.clone(), provider);
        self
    }

    /// Registers the protocols a provider id is known to be registered under.
    pub fn with_registered_protocols(self, provider_id: u64, protocols: Vec<Protocol>) -> Self {
        self.lock().protocols_of.insert(provider_id, protocols);
        self
    }

    /// Registers an offer, owned by `provider_id`.
    pub fn with_offer(self, provider_id: u64, offer: Offer) -> Self {
        let mut state = self.lock();
        state.provider_offers.entry(provider_id).or_default().push(offer.id);
        state.offers.insert(offer.id, offer);
        self
    }

    /// Registers an agreement.
    pub fn with_agreement(self, agreement: Agreement) -> Self {
        self.lock().agreements.insert(agreement.id, agreement);
        self
    }

    /// Makes the next call fail with a transport error, then resume working.
    pub fn fail_next_call(&self) {
        self.lock().fail_next = true;
    }

    /// Agreement ids that `close_agreement` has been called with, in order.
    pub fn closed_agreements(&self) -> Vec<u64> {
        self.lock().closed.clone()
    }

    /// Offer registration requests recorded by `register_offer`.
    pub fn registered_offers(&self) -> Vec<RegisterOfferRequest> {
        self.lock().registered_offers.clone()
    }

    fn maybe_fail(&self, endpoint: &str) -> Result<(), TransportError> {
        let mut state = self.lock();
        if state.fail_next {
            state.fail_next = false;
            return Err(TransportError::Http {
                endpoint: endpoint.to_string(),
                message: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChainClient for FakeChainClient {
    async fn get_actor(&self, address: &Address) -> Result<Option<Provider>, TransportError> {
        self.maybe_fail("get_actor")?;
        Ok(self.lock().actors.get(address).cloned())
    }

    async fn get_registered_protocols_of(
        &self,
        provider_id: u64,
    ) -> Result<Vec<Protocol>, TransportError> {
        self.maybe_fail("get_registered_protocols_of")?;
        Ok(self.lock().protocols_of.get(&provider_id).cloned().unwrap_or_default())
    }

    async fn get_offer(&self, offer_id: u64) -> Result<Option<Offer>, TransportError> {
        self.maybe_fail("get_offer")?;
        Ok(self.lock().offers.get(&offer_id).cloned())
    }

    async fn get_agreement(&self, agreement_id: u64) -> Result<Option<Agreement>, TransportError> {
        self.maybe_fail("get_agreement")?;
        Ok(self.lock().agreements.get(&agreement_id).cloned())
    }

    async fn get_all_provider_offers(
        &self,
        provider_id: u64,
    ) -> Result<Vec<Offer>, TransportError> {
        self.maybe_fail("get_all_provider_offers")?;
        let state = self.lock();
        Ok(state
            .provider_offers
            .get(&provider_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.offers.get(id).cloned())
            .collect())
    }

    async fn close_agreement(&self, agreement_id: u64) -> Result<(), TransportError> {
        self.maybe_fail("close_agreement")?;
        self.lock().closed.push(agreement_id);
        Ok(())
    }

    async fn register_offer(&self, request: RegisterOfferRequest) -> Result<u64, TransportError> {
        self.maybe_fail("register_offer")?;
        let mut state = self.lock();
        let id = state.next_offer_id;
        state.next_offer_id += 1;
        state.registered_offers.push(request);
        Ok(id)
    }

    fn generate_cid(&self, content: &[u8]) -> Cid {
        Cid::of(content)
    }
}
