//! `EchoBackend`: a no-op [`ServiceBackend`] fixture with call counters, for
//! exercising the reconciler/watcher/router without a real service plugin.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use providerd_runtime::backend::ServiceBackend;
use providerd_runtime::{GatewayConfigProvider, ResourceDetails};
use providerd_types::domain::{Agreement, DeploymentStatus, Offer, Resource};
use providerd_types::error::BackendError;
use serde_json::Value;

/// A backend whose `create`/`get_details` behavior is scripted per call count,
/// so tests can model "deploys immediately" vs. "takes N polls to go Running"
/// vs. "always fails" without a real service behind it.
pub struct EchoBackend {
    /// Number of `get_details` polls (after `create`) before reporting `Running`.
    pub polls_until_running: u32,
    /// If set, `create` returns this error instead of succeeding.
    pub fail_create: Mutex<Option<String>>,
    /// If set, `delete` returns this error instead of succeeding.
    pub fail_delete: Mutex<Option<String>>,
    create_calls: AtomicU32,
    get_details_calls: AtomicU32,
    delete_calls: AtomicU32,
    configuration: Mutex<BTreeMap<u64, Value>>,
}

impl Default for EchoBackend {
    fn default() -> Self {
        EchoBackend {
            polls_until_running: 0,
            fail_create: Mutex::new(None),
            fail_delete: Mutex::new(None),
            create_calls: AtomicU32::new(0),
            get_details_calls: AtomicU32::new(0),
            delete_calls: AtomicU32::new(0),
            configuration: Mutex::new(BTreeMap::new()),
        }
    }
}

impl EchoBackend {
    /// Creates a backend that reports `Running` immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that stays `Deploying` for `polls` calls to
    /// `get_details` before reporting `Running`.
    pub fn deploying_for(polls: u32) -> Self {
        EchoBackend {
            polls_until_running: polls,
            ..Self::default()
        }
    }

    /// Number of times `create` has been called.
    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Number of times `get_details` has been called.
    pub fn get_details_calls(&self) -> u32 {
        self.get_details_calls.load(Ordering::SeqCst)
    }

    /// Number of times `delete` has been called.
    pub fn delete_calls(&self) -> u32 {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceBackend for EchoBackend {
    async fn create(
        &self,
        _agreement: &Agreement,
        offer: &Offer,
    ) -> Result<ResourceDetails, BackendError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        #[allow(clippy::unwrap_used)]
        if let Some(reason) = self.fail_create.lock().unwrap().clone() {
            return Err(BackendError::Create(reason));
        }
        let mut details = BTreeMap::new();
        details.insert("offerId".to_string(), Value::from(offer.id));
        let status = if self.polls_until_running == 0 {
            DeploymentStatus::Running
        } else {
            DeploymentStatus::Deploying
        };
        Ok(ResourceDetails {
            name: None,
            status,
            details,
        })
    }

    async fn get_details(
        &self,
        _agreement: &Agreement,
        _offer: &Offer,
        resource: &Resource,
    ) -> Result<ResourceDetails, BackendError> {
        let call = self.get_details_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let status = if call >= self.polls_until_running {
            DeploymentStatus::Running
        } else {
            DeploymentStatus::Deploying
        };
        Ok(ResourceDetails {
            name: None,
            status,
            details: resource.details.clone(),
        })
    }

    async fn delete(
        &self,
        _agreement: &Agreement,
        _offer: &Offer,
        _resource: &Resource,
    ) -> Result<(), BackendError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        #[allow(clippy::unwrap_used)]
        if let Some(reason) = self.fail_delete.lock().unwrap().clone() {
            return Err(BackendError::Delete(reason));
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_gateway_config_provider(&self) -> Option<&dyn GatewayConfigProvider> {
        Some(self)
    }
}

#[async_trait]
impl GatewayConfigProvider for EchoBackend {
    fn configuration_schema(&self) -> BTreeMap<String, providerd_runtime::backend::ConfigurationField> {
        let mut schema = BTreeMap::new();
        schema.insert(
            "replicas".to_string(),
            providerd_runtime::backend::ConfigurationField {
                example: Value::from(1),
                format: "integer".to_string(),
                description: "number of replicas to run".to_string(),
                required: false,
                default: Some(Value::from(1)),
            },
        );
        schema
    }

    async fn get_configuration(&self, offer_id: u64) -> Result<Value, BackendError> {
        #[allow(clippy::unwrap_used)]
        Ok(self
            .configuration
            .lock()
            .unwrap()
            .get(&offer_id)
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default())))
    }

    async fn set_configuration(&self, offer_id: u64, value: Value) -> Result<(), BackendError> {
        #[allow(clippy::unwrap_used)]
        self.configuration.lock().unwrap().insert(offer_id, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use providerd_types::domain::AgreementStatus;

    fn addr(n: u8) -> providerd_types::Address {
        #[allow(clippy::unwrap_used)]
        format!("0x{:040x}", n).parse().unwrap()
    }

    fn agreement() -> Agreement {
        Agreement {
            id: 1,
            user_address: addr(1),
            provider_address: addr(2),
            offer_id: 1,
            balance: "10".into(),
            status: AgreementStatus::Active,
            created_at: 0,
        }
    }

    fn offer() -> Offer {
        Offer {
            id: 1,
            owner_address: addr(2),
            fee_per_second: "1".into(),
            stock_amount: 10,
            details_link: providerd_types::Cid::of(b"offer"),
        }
    }

    #[tokio::test]
    async fn deploying_backend_reports_running_after_configured_polls() {
        let backend = EchoBackend::deploying_for(2);
        let created = backend.create(&agreement(), &offer()).await.unwrap();
        assert_eq!(created.status, DeploymentStatus::Deploying);

        let resource = Resource {
            id: 1,
            protocol_address: addr(3),
            name: "r".into(),
            owner_address: addr(1),
            offer_id: 1,
            provider_id: 1,
            deployment_status: DeploymentStatus::Deploying,
            details: Default::default(),
            is_active: true,
            created_at: 0,
        };
        let first = backend.get_details(&agreement(), &offer(), &resource).await.unwrap();
        assert_eq!(first.status, DeploymentStatus::Deploying);
        let second = backend.get_details(&agreement(), &offer(), &resource).await.unwrap();
        assert_eq!(second.status, DeploymentStatus::Running);
        assert_eq!(backend.get_details_calls(), 2);
    }

    #[tokio::test]
    async fn create_failure_is_recorded_but_does_not_panic() {
        let backend = EchoBackend::new();
        *backend.fail_create.lock().unwrap() = Some("boom".to_string());
        let err = backend.create(&agreement(), &offer()).await.unwrap_err();
        assert!(matches!(err, BackendError::Create(_)));
    }
}
