//! Hosted record store backed by the Cloud Firestore REST API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use shared::{
    domain::{Customer, CustomerId, NewCustomer},
    error::ProviderError,
    protocol::{FirestoreDocument, ListDocumentsResponse},
};
use tracing::{debug, warn};
use url::Url;

use crate::{auth::IdTokenSource, error::DataError, records::RecordStore};

pub const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com/";
const LIST_PAGE_SIZE: u32 = 300;

pub struct FirestoreRecordStore {
    http: Client,
    collection_url: Url,
    tokens: Arc<dyn IdTokenSource>,
}

impl FirestoreRecordStore {
    /// `base` is the service root (`https://firestore.googleapis.com/`, or
    /// `http://<emulator-host>/`) and must end with `/`.
    pub fn new(
        base: &Url,
        project_id: &str,
        collection: &str,
        tokens: Arc<dyn IdTokenSource>,
    ) -> Result<Self, url::ParseError> {
        let collection_url = base.join(&format!(
            "v1/projects/{project_id}/databases/(default)/documents/{collection}"
        ))?;
        Ok(Self {
            http: Client::new(),
            collection_url,
            tokens,
        })
    }

    pub fn collection_url(&self) -> &Url {
        &self.collection_url
    }

    fn document_url(&self, id: &CustomerId) -> Result<Url, DataError> {
        let mut url = self.collection_url.clone();
        url.path_segments_mut()
            .map_err(|()| DataError::Malformed("collection url has no path".to_string()))?
            .push(id.as_str());
        Ok(url)
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, DataError> {
        let token = self
            .tokens
            .id_token()
            .await
            .map_err(DataError::from)?;
        Ok(match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, DataError> {
        let response = self
            .authorized(request)
            .await?
            .send()
            .await
            .map_err(|err| DataError::Transport(err.to_string()))?;
        check_status(response).await
    }
}

#[async_trait]
impl RecordStore for FirestoreRecordStore {
    async fn list_all(&self) -> Result<Vec<Customer>, DataError> {
        let mut customers = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(self.collection_url.clone())
                .query(&[("pageSize", LIST_PAGE_SIZE.to_string())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let page: ListDocumentsResponse = self
                .send(request)
                .await?
                .json()
                .await
                .map_err(|err| DataError::Malformed(err.to_string()))?;

            for document in &page.documents {
                let customer = document.to_customer().ok_or_else(|| {
                    DataError::Malformed(format!("document without id: '{}'", document.name))
                })?;
                customers.push(customer);
            }

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!(count = customers.len(), "listed customers");
        Ok(customers)
    }

    async fn insert(&self, customer: NewCustomer) -> Result<CustomerId, DataError> {
        let request = self
            .http
            .post(self.collection_url.clone())
            .json(&FirestoreDocument::from_new_customer(&customer));
        let created: FirestoreDocument = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(|err| DataError::Malformed(err.to_string()))?;

        created
            .document_id()
            .map(|id| CustomerId(id.to_string()))
            .ok_or_else(|| DataError::Malformed("created document has no name".to_string()))
    }

    async fn delete(&self, id: &CustomerId) -> Result<(), DataError> {
        let request = self.http.delete(self.document_url(id)?);
        self.send(request).await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> Result<Response, DataError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let provider_error = ProviderError::from_body(status.as_u16(), &body);
    warn!(status = status.as_u16(), message = %provider_error.message, "record store request failed");
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            DataError::PermissionDenied(provider_error.message)
        }
        StatusCode::NOT_FOUND => DataError::NotFound(provider_error.message),
        _ => DataError::Rejected {
            status: status.as_u16(),
            message: provider_error.message,
        },
    })
}

#[cfg(test)]
#[path = "tests/firestore_tests.rs"]
mod tests;
