//! Relational-rows sub-client (PostgREST).
//!
//! A small query builder that translates to PostgREST conventions:
//! `?select=...`, `column=eq.value` filters, `order=col.asc`,
//! `Accept: application/vnd.pgrst.object+json` for single-row reads, and
//! `Prefer: return=representation` for mutations. Requests carry the anon
//! key, plus the signed-in user's access token when one is held.

use std::fmt::Display;

use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use super::auth::SessionCell;
use super::{SupabaseError, error_from_response, join_url};

/// Client for the `rest/v1` surface.
#[derive(Clone)]
pub struct PostgrestClient {
    http: reqwest::Client,
    /// `{base}/rest/v1/`.
    endpoint: Url,
    anon_key: String,
    session: SessionCell,
}

impl PostgrestClient {
    /// Create the rows sub-client.
    ///
    /// # Errors
    ///
    /// Returns [`SupabaseError::BadUrl`] when the base URL cannot be joined.
    pub fn new(
        http: reqwest::Client,
        base: &Url,
        anon_key: String,
        session: SessionCell,
    ) -> Result<Self, SupabaseError> {
        Ok(Self {
            http,
            endpoint: join_url(base, "rest/v1/")?,
            anon_key,
            session,
        })
    }

    /// Start a query against a table.
    #[must_use]
    pub fn from(&self, table: &str) -> QueryBuilder {
        QueryBuilder {
            client: self.clone(),
            table: table.to_owned(),
            select: None,
            filters: Vec::new(),
            order: None,
            limit: None,
            single: false,
            upsert: false,
        }
    }

    /// Bearer token: the signed-in access token, or the anon key.
    async fn bearer(&self) -> String {
        self.session
            .read()
            .await
            .as_ref()
            .map_or_else(|| self.anon_key.clone(), |s| s.access_token.clone())
    }
}

/// A query against one table; consumed by one of the terminal methods.
#[must_use]
pub struct QueryBuilder {
    client: PostgrestClient,
    table: String,
    select: Option<String>,
    /// `(column, "op.value")` pairs.
    filters: Vec<(String, String)>,
    order: Option<String>,
    limit: Option<u32>,
    single: bool,
    upsert: bool,
}

impl QueryBuilder {
    /// Columns to return (PostgREST `select=` syntax).
    pub fn select(mut self, columns: &str) -> Self {
        self.select = Some(columns.to_owned());
        self
    }

    /// Equality filter: `column=eq.value`.
    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.filters.push((column.to_owned(), format!("eq.{value}")));
        self
    }

    /// Ascending order on a column.
    pub fn order(mut self, column: &str) -> Self {
        self.order = Some(format!("{column}.asc"));
        self
    }

    /// Descending order on a column.
    pub fn order_desc(mut self, column: &str) -> Self {
        self.order = Some(format!("{column}.desc"));
        self
    }

    /// Cap the number of returned rows.
    pub const fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Expect exactly one row; the response is the bare object and a miss is
    /// [`SupabaseError::NotFound`].
    pub const fn single(mut self) -> Self {
        self.single = true;
        self
    }

    /// Merge on conflict instead of failing (PostgREST upsert).
    pub const fn upsert(mut self) -> Self {
        self.upsert = true;
        self
    }

    /// Fetch rows.
    ///
    /// # Errors
    ///
    /// [`SupabaseError::NotFound`] for a missed `.single()`, otherwise the
    /// mapped backend/transport error.
    pub async fn fetch<T: DeserializeOwned>(self) -> Result<T, SupabaseError> {
        let request = self.request(reqwest::Method::GET).await?;
        Self::run(request, self.single).await
    }

    /// Insert one or more rows, returning the representation.
    ///
    /// # Errors
    ///
    /// The mapped backend/transport error.
    pub async fn insert<T: DeserializeOwned>(
        self,
        body: &impl Serialize,
    ) -> Result<T, SupabaseError> {
        let request = self.request(reqwest::Method::POST).await?.json(body);
        Self::run(request, self.single).await
    }

    /// Patch the rows matched by the filters, returning the representation.
    ///
    /// # Errors
    ///
    /// The mapped backend/transport error.
    pub async fn update<T: DeserializeOwned>(
        self,
        patch: &impl Serialize,
    ) -> Result<T, SupabaseError> {
        let request = self.request(reqwest::Method::PATCH).await?.json(patch);
        Self::run(request, self.single).await
    }

    /// Delete the rows matched by the filters.
    ///
    /// # Errors
    ///
    /// The mapped backend/transport error.
    pub async fn delete(self) -> Result<(), SupabaseError> {
        let request = self.request(reqwest::Method::DELETE).await?;
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }

    /// Build the request with URL, query string, and headers.
    async fn request(
        &self,
        method: reqwest::Method,
    ) -> Result<reqwest::RequestBuilder, SupabaseError> {
        let url = join_url(&self.client.endpoint, &self.table)?;
        let is_mutation = method != reqwest::Method::GET;

        let mut request = self.client.http.request(method, url);
        if let Some(select) = &self.select {
            request = request.query(&[("select", select)]);
        }
        for (column, predicate) in &self.filters {
            request = request.query(&[(column, predicate)]);
        }
        if let Some(order) = &self.order {
            request = request.query(&[("order", order)]);
        }
        if let Some(limit) = self.limit {
            request = request.query(&[("limit", limit.to_string())]);
        }

        request = request
            .header("apikey", &self.client.anon_key)
            .bearer_auth(self.client.bearer().await);

        if self.single {
            request = request.header("Accept", "application/vnd.pgrst.object+json");
        }
        if is_mutation {
            let prefer = if self.upsert {
                "return=representation,resolution=merge-duplicates"
            } else {
                "return=representation"
            };
            request = request.header("Prefer", prefer);
        }
        Ok(request)
    }

    /// Send and decode, mapping a missed single-row read to `NotFound`.
    async fn run<T: DeserializeOwned>(
        request: reqwest::RequestBuilder,
        single: bool,
    ) -> Result<T, SupabaseError> {
        let response = request.send().await?;
        let status = response.status();

        // PostgREST answers a missed `.single()` with 406 (no rows for the
        // object Accept header); treat 404 the same for missing tables/ids.
        if single
            && (status == reqwest::StatusCode::NOT_ACCEPTABLE
                || status == reqwest::StatusCode::NOT_FOUND)
        {
            return Err(SupabaseError::NotFound);
        }
        if !status.is_success() {
            return Err(error_from_response(response).await);
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    fn client() -> PostgrestClient {
        PostgrestClient::new(
            reqwest::Client::new(),
            &"https://proj.supabase.co".parse().unwrap(),
            "anon-key".into(),
            Arc::new(RwLock::new(None)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_query_string_follows_postgrest_conventions() {
        let builder = client()
            .from("profiles")
            .select("id,full_name,role")
            .eq("role", "Manager")
            .order("full_name")
            .limit(10);

        let request = builder
            .request(reqwest::Method::GET)
            .await
            .unwrap()
            .build()
            .unwrap();
        let url = request.url().as_str();
        assert!(url.starts_with("https://proj.supabase.co/rest/v1/profiles?"));
        assert!(url.contains("select=id%2Cfull_name%2Crole"));
        assert!(url.contains("role=eq.Manager"));
        assert!(url.contains("order=full_name.asc"));
        assert!(url.contains("limit=10"));
    }

    #[tokio::test]
    async fn test_single_sets_object_accept_header() {
        let builder = client().from("profiles").eq("id", "abc").single();
        let request = builder
            .request(reqwest::Method::GET)
            .await
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            request.headers().get("Accept").unwrap(),
            "application/vnd.pgrst.object+json"
        );
    }

    #[tokio::test]
    async fn test_anon_bearer_without_session() {
        let builder = client().from("profiles");
        let request = builder
            .request(reqwest::Method::GET)
            .await
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            request.headers().get("Authorization").unwrap(),
            "Bearer anon-key"
        );
        assert_eq!(request.headers().get("apikey").unwrap(), "anon-key");
    }

    #[tokio::test]
    async fn test_mutations_ask_for_representation() {
        let builder = client().from("user_pins").upsert();
        let request = builder
            .request(reqwest::Method::POST)
            .await
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            request.headers().get("Prefer").unwrap(),
            "return=representation,resolution=merge-duplicates"
        );
    }
}
