use std::{
    sync::{Arc, RwLock},
    time::Duration,
};

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::{Filter, RemoteError, RemoteResult, SelectQuery, TableService, ensure_identifier};

/// HTTP handle on the hosted backend: PostgREST under `/rest/v1`, auth
/// under `/auth/v1`.
///
/// Clones share the access token slot; `with_access_token` forks a handle
/// with its own slot so a request can act as a specific user.
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    base_url: Url,
    anon_key: String,
    access_token: Arc<RwLock<Option<String>>>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl RestClient {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> RemoteResult<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent())
            .build()?;
        Ok(Self {
            http,
            base_url,
            anon_key: anon_key.to_string(),
            access_token: Arc::new(RwLock::new(None)),
        })
    }

    /// Handle with its own, empty token slot.
    pub fn detached(&self) -> Self {
        Self {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            anon_key: self.anon_key.clone(),
            access_token: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_access_token(&self, token: &str) -> Self {
        let client = self.detached();
        client.set_access_token(Some(token.to_string()));
        client
    }

    pub fn access_token(&self) -> Option<String> {
        self.access_token
            .read()
            .map(|token| token.clone())
            .unwrap_or_default()
    }

    pub fn set_access_token(&self, token: Option<String>) {
        if let Ok(mut slot) = self.access_token.write() {
            *slot = token;
        }
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    pub fn url(&self, path: &str) -> RemoteResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Request carrying the project key and the current bearer (the anon key
    /// when nobody is signed in).
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let bearer = self
            .access_token()
            .unwrap_or_else(|| self.anon_key.clone());
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    fn table_url(&self, table: &str) -> RemoteResult<Url> {
        ensure_identifier(table)?;
        self.url(&format!("rest/v1/{table}"))
    }

    pub async fn check(response: Response) -> RemoteResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| {
                body.message
                    .or(body.msg)
                    .or(body.error_description)
                    .or(body.error)
            })
            .unwrap_or_else(|| {
                if text.is_empty() {
                    status.to_string()
                } else {
                    text
                }
            });
        Err(RemoteError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

pub fn user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// PostgREST literal for a filter value.
fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Members of an `in.(...)` list; strings with reserved characters are quoted.
fn list_literal(values: &[Value]) -> String {
    let items = values
        .iter()
        .map(|value| match value {
            Value::String(s) if s.contains([',', '(', ')', '"', ' ']) => {
                format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
            }
            other => literal(other),
        })
        .collect::<Vec<_>>();
    format!("in.({})", items.join(","))
}

pub fn encode_filter(filter: &Filter) -> (String, String) {
    match filter {
        Filter::Eq { column, value } if value.is_null() => (column.clone(), "is.null".to_string()),
        Filter::Eq { column, value } => (column.clone(), format!("eq.{}", literal(value))),
        Filter::In { column, values } => (column.clone(), list_literal(values)),
    }
}

pub fn encode_query(url: &mut Url, query: &SelectQuery) {
    let mut pairs = url.query_pairs_mut();
    pairs.append_pair("select", &query.columns.replace(' ', ""));
    for filter in &query.filters {
        let (column, value) = encode_filter(filter);
        pairs.append_pair(&column, &value);
    }
    if let Some(order) = &query.order {
        let direction = if order.ascending { "asc" } else { "desc" };
        pairs.append_pair("order", &format!("{}.{}", order.column, direction));
    }
    if let Some(limit) = query.limit {
        pairs.append_pair("limit", &limit.to_string());
    }
}

fn id_filter(url: &mut Url, id: &str) {
    url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));
}

async fn rows(response: Response) -> RemoteResult<Vec<Value>> {
    let response = RestClient::check(response).await?;
    let body: Value = response.json().await?;
    match body {
        Value::Array(rows) => Ok(rows),
        Value::Null => Ok(Vec::new()),
        row => Ok(vec![row]),
    }
}

#[async_trait]
impl TableService for RestClient {
    async fn select(&self, query: &SelectQuery) -> RemoteResult<Vec<Value>> {
        let mut url = self.table_url(&query.table)?;
        encode_query(&mut url, query);
        tracing::debug!(table = %query.table, url = %url, "select");
        let response = self.request(Method::GET, url).send().await?;
        rows(response).await
    }

    async fn select_by_id(&self, table: &str, id: &str) -> RemoteResult<Option<Value>> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut().append_pair("select", "*");
        id_filter(&mut url, id);
        let response = self.request(Method::GET, url).send().await?;
        Ok(rows(response).await?.into_iter().next())
    }

    async fn insert(&self, table: &str, rows_in: Vec<Value>) -> RemoteResult<Vec<Value>> {
        let url = self.table_url(table)?;
        let response = self
            .request(Method::POST, url)
            .header("Prefer", "return=representation")
            .json(&rows_in)
            .send()
            .await?;
        rows(response).await
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> RemoteResult<Value> {
        let mut url = self.table_url(table)?;
        id_filter(&mut url, id);
        let response = self
            .request(Method::PATCH, url)
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;
        rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or(RemoteError::NotFound)
    }

    async fn delete(&self, table: &str, id: &str) -> RemoteResult<()> {
        let mut url = self.table_url(table)?;
        id_filter(&mut url, id);
        let response = self.request(Method::DELETE, url).send().await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::remote::TableOptions;

    #[test]
    fn encodes_filters_order_and_embeds() {
        let query = TableOptions::new()
            .filter("active", true)
            .filter("status", json!(["pending", "on hold"]))
            .order_by("sort_order", true)
            .join("categories!banners_category_id_fkey(name, slug)")
            .to_query("banners")
            .unwrap();
        let mut url = Url::parse("https://example.supabase.co/rest/v1/banners").unwrap();
        encode_query(&mut url, &query);

        let pairs = url.query_pairs().into_owned().collect::<Vec<_>>();
        assert_eq!(
            pairs,
            vec![
                (
                    "select".to_string(),
                    "*,categories!banners_category_id_fkey(name,slug)".to_string()
                ),
                ("active".to_string(), "eq.true".to_string()),
                ("status".to_string(), "in.(pending,\"on hold\")".to_string()),
                ("order".to_string(), "sort_order.asc".to_string()),
            ]
        );
    }

    #[test]
    fn null_equality_uses_is_operator() {
        let filter = Filter::Eq {
            column: "brand_id".into(),
            value: Value::Null,
        };
        assert_eq!(encode_filter(&filter), ("brand_id".into(), "is.null".into()));
    }

    #[test]
    fn base_url_keeps_project_path() {
        let client = RestClient::new(
            "https://example.supabase.co",
            "anon",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.url("rest/v1/products").unwrap().as_str(),
            "https://example.supabase.co/rest/v1/products"
        );
        assert_eq!(client.access_token(), None);

        let scoped = client.with_access_token("jwt");
        assert_eq!(scoped.access_token().as_deref(), Some("jwt"));
        assert_eq!(client.access_token(), None);
    }
}
