// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{CompiledPredicate, QueryParam};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("secret {0} is not configured")]
    MissingSecret(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestIdentity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Per-request values placeholders are bound to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// `None` for unauthenticated requests.
    #[serde(default)]
    pub identity: Option<RequestIdentity>,
    /// Request time, RFC 3339.
    pub now: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,
}

impl RequestContext {
    /// Header names are case-insensitive.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    fn value(&self, param: &QueryParam, record_ids: &[String]) -> Result<Value, BindError> {
        let identity = self.identity.as_ref();
        Ok(match param {
            QueryParam::RecordIds => {
                Value::Array(record_ids.iter().cloned().map(Value::String).collect())
            }
            QueryParam::IdentityId => identity.map_or(Value::Null, |i| Value::String(i.id.clone())),
            QueryParam::IdentityEmail => identity
                .and_then(|i| i.email.clone())
                .map_or(Value::Null, Value::String),
            QueryParam::IsAuthenticated => Value::Bool(identity.is_some()),
            QueryParam::Now => Value::String(self.now.clone()),
            QueryParam::Header(key) => self
                .header(key)
                .map_or(Value::Null, |v| Value::String(v.to_string())),
            QueryParam::Secret(key) => match self.secrets.get(key) {
                Some(secret) => Value::String(secret.clone()),
                None => return Err(BindError::MissingSecret(key.clone())),
            },
            QueryParam::String(s) => Value::String(s.clone()),
            QueryParam::Number(n) => Value::Number(n.clone()),
        })
    }
}

impl CompiledPredicate {
    /// Resolve every placeholder, in order, for one request.
    pub fn bind(&self, ctx: &RequestContext, record_ids: &[String]) -> Result<Vec<Value>, BindError> {
        self.values
            .iter()
            .map(|param| ctx.value(param, record_ids))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use serde_json::json;

    fn predicate(values: Vec<QueryParam>) -> CompiledPredicate {
        CompiledPredicate {
            sql: String::new(),
            values,
            joins: vec![],
        }
    }

    #[test]
    fn binds_in_placeholder_order() {
        let ctx = RequestContext {
            identity: Some(RequestIdentity {
                id: "id_1".into(),
                email: Some("a@b.c".into()),
            }),
            now: "2024-01-01T00:00:00Z".into(),
            headers: [("X-Org".to_string(), "acme".to_string())].into(),
            secrets: [("key".to_string(), "s3cr3t".to_string())].into(),
        };
        let predicate = predicate(vec![
            QueryParam::IdentityId,
            QueryParam::IdentityEmail,
            QueryParam::IsAuthenticated,
            QueryParam::Now,
            QueryParam::Header("x-org".into()),
            QueryParam::Secret("key".into()),
            QueryParam::String("Draft".into()),
            QueryParam::Number(serde_json::Number::from(7u64)),
            QueryParam::RecordIds,
        ]);

        assert_eq!(
            predicate.bind(&ctx, &["p1".into(), "p2".into()]).unwrap(),
            [
                json!("id_1"),
                json!("a@b.c"),
                json!(true),
                json!("2024-01-01T00:00:00Z"),
                json!("acme"),
                json!("s3cr3t"),
                json!("Draft"),
                json!(7),
                json!(["p1", "p2"]),
            ]
        );
    }

    #[test]
    fn anonymous_requests_bind_nulls() {
        let predicate = predicate(vec![
            QueryParam::IdentityId,
            QueryParam::IdentityEmail,
            QueryParam::IsAuthenticated,
            QueryParam::Header("x-missing".into()),
        ]);
        assert_eq!(
            predicate.bind(&RequestContext::default(), &[]).unwrap(),
            [json!(null), json!(null), json!(false), json!(null)]
        );
    }

    #[test]
    fn missing_secrets_fail() {
        let predicate = predicate(vec![QueryParam::Secret("key".into())]);
        assert_eq!(
            predicate.bind(&RequestContext::default(), &[]),
            Err(BindError::MissingSecret("key".into()))
        );
    }
}
