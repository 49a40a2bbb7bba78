use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;

use super::{Filter, RelationalStore, SelectQuery, StoreError};
use crate::config::SupabaseSettings;

/// Supabase REST (PostgREST) client authenticated with the service-role key.
#[derive(Clone)]
pub struct PostgrestStore {
    http_client: Client,
    rest_url: String,
    service_role_key: String,
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

impl PostgrestStore {
    pub fn new(settings: &SupabaseSettings) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .timeout(settings.request_timeout())
            .build()?;

        Ok(Self {
            http_client,
            rest_url: format!("{}/rest/v1", settings.url),
            service_role_key: settings.service_role_key.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
    }

    async fn read_rows(response: Response, table: &str) -> Result<Vec<Value>, StoreError> {
        let response = Self::check_status(response).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        match body {
            Value::Array(rows) => Ok(rows),
            other => Err(StoreError::Decode {
                table: table.to_string(),
                message: format!("expected an array, got {}", other),
            }),
        }
    }

    async fn check_status(response: Response) -> Result<Response, StoreError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<PostgrestErrorBody>(&text) {
            Ok(body) => {
                let mut message = body
                    .message
                    .unwrap_or_else(|| format!("HTTP {}", status));
                if let Some(details) = body.details.filter(|d| !d.is_empty()) {
                    message = format!("{} ({})", message, details);
                }
                Err(StoreError::api(body.code.as_deref(), message))
            }
            Err(_) => Err(StoreError::api(None, format!("HTTP {}: {}", status, text))),
        }
    }
}

/// Renders filters as PostgREST query parameters (`col=eq.v`, `col=in.("a","b")`).
pub(crate) fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|filter| match filter {
            Filter::Eq(column, value) => (column.clone(), format!("eq.{}", value)),
            Filter::In(column, values) => {
                let quoted = values
                    .iter()
                    .map(|value| quote_value(value))
                    .collect::<Vec<_>>()
                    .join(",");
                (column.clone(), format!("in.({})", quoted))
            }
        })
        .collect()
}

fn quote_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

fn compact_columns(columns: &str) -> String {
    columns.split(',').map(str::trim).collect::<Vec<_>>().join(",")
}

#[async_trait]
impl RelationalStore for PostgrestStore {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Value>, StoreError> {
        let mut params = vec![("select".to_string(), compact_columns(&query.columns))];
        params.extend(filter_params(&query.filters));
        if let Some(column) = &query.order_desc {
            params.push(("order".to_string(), format!("{}.desc.nullslast", column)));
        }

        let response = self
            .authorize(self.http_client.get(self.table_url(&query.table)))
            .query(&params)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Self::read_rows(response, &query.table).await
    }

    async fn insert(
        &self,
        table: &str,
        row: Value,
        returning: &str,
    ) -> Result<Value, StoreError> {
        let response = self
            .authorize(self.http_client.post(self.table_url(table)))
            .header("Prefer", "return=representation")
            .query(&[("select", compact_columns(returning))])
            .json(&row)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Self::read_rows(response, table)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode {
                table: table.to_string(),
                message: "insert returned no representation".to_string(),
            })
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
        returning: &str,
    ) -> Result<Vec<Value>, StoreError> {
        let mut params = vec![("select".to_string(), compact_columns(returning))];
        params.extend(filter_params(filters));

        let response = self
            .authorize(self.http_client.patch(self.table_url(table)))
            .header("Prefer", "return=representation")
            .query(&params)
            .json(&patch)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Self::read_rows(response, table).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let response = self
            .authorize(self.http_client.get(format!("{}/", self.rest_url)))
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Self::check_status(response).await.map(|_| ())
    }
}
