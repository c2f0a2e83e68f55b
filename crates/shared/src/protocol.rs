//! Wire types of the hosted backend: Identity Toolkit, Secure Token and the
//! Firestore REST document API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Customer, CustomerId, Identity, NewCustomer, UserId};

pub const CUSTOMER_NAME_FIELD: &str = "name";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordCredentialRequest {
    pub email: String,
    pub password: String,
    pub return_secure_token: bool,
}

impl PasswordCredentialRequest {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
            return_secure_token: true,
        }
    }
}

/// Response of both `accounts:signUp` and `accounts:signInWithPassword`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordCredentialResponse {
    pub local_id: String,
    #[serde(default)]
    pub email: String,
    pub id_token: String,
    pub refresh_token: String,
    /// Lifetime of `id_token` in seconds, encoded as a decimal string.
    pub expires_in: String,
}

impl PasswordCredentialResponse {
    pub fn identity(&self) -> Identity {
        Identity {
            uid: UserId(self.local_id.clone()),
            email: self.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRequest {
    pub grant_type: String,
    pub refresh_token: String,
}

impl RefreshTokenRequest {
    pub fn new(refresh_token: &str) -> Self {
        Self {
            grant_type: "refresh_token".to_string(),
            refresh_token: refresh_token.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenResponse {
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in: String,
    pub user_id: String,
}

/// Parses the decimal-string lifetimes Google token endpoints return.
pub fn parse_expires_in(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|secs| *secs > 0)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirestoreValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integer_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boolean_value: Option<bool>,
}

impl FirestoreValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            string_value: Some(value.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirestoreDocument {
    /// Full resource name, `projects/<p>/databases/(default)/documents/<collection>/<id>`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FirestoreValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl FirestoreDocument {
    pub fn from_new_customer(customer: &NewCustomer) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(
            CUSTOMER_NAME_FIELD.to_string(),
            FirestoreValue::string(customer.name.clone()),
        );
        Self {
            fields,
            ..Self::default()
        }
    }

    pub fn document_id(&self) -> Option<&str> {
        document_id(&self.name)
    }

    /// Converts a stored document to a customer. Documents written by other
    /// clients may lack the name field; those decode with an empty name.
    pub fn to_customer(&self) -> Option<Customer> {
        let id = self.document_id()?;
        let name = self
            .fields
            .get(CUSTOMER_NAME_FIELD)
            .and_then(|value| {
                value
                    .string_value
                    .clone()
                    .or_else(|| value.integer_value.clone())
            })
            .unwrap_or_default();
        Some(Customer {
            id: CustomerId(id.to_string()),
            name,
        })
    }
}

pub fn document_id(resource_name: &str) -> Option<&str> {
    resource_name
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsResponse {
    #[serde(default)]
    pub documents: Vec<FirestoreDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}
