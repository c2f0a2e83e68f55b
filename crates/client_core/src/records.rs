use async_trait::async_trait;
use shared::domain::{Customer, CustomerId, NewCustomer};

use crate::error::DataError;

/// The shared customer collection in the external document store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Customer>, DataError>;
    async fn insert(&self, customer: NewCustomer) -> Result<CustomerId, DataError>;
    async fn delete(&self, id: &CustomerId) -> Result<(), DataError>;
}
