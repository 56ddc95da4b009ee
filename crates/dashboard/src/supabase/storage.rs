//! Object-storage sub-client.
//!
//! Only the two operations the dashboard needs: uploading an avatar image
//! and computing the public URL the profile row stores.

use url::Url;

use super::auth::SessionCell;
use super::{SupabaseError, error_from_response, join_url};

/// Client for the `storage/v1` surface.
#[derive(Clone)]
pub struct StorageClient {
    http: reqwest::Client,
    /// `{base}/storage/v1/`.
    endpoint: Url,
    anon_key: String,
    session: SessionCell,
}

impl StorageClient {
    /// Create the storage sub-client.
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
            endpoint: join_url(base, "storage/v1/")?,
            anon_key,
            session,
        })
    }

    /// Upload (or replace) an object in a bucket.
    ///
    /// # Errors
    ///
    /// Returns the mapped backend/transport error; uploading without a
    /// signed-in session fails with the backend's authorization error.
    pub async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), SupabaseError> {
        let url = join_url(&self.endpoint, &format!("object/{bucket}/{path}"))?;
        let bearer = self
            .session
            .read()
            .await
            .as_ref()
            .map_or_else(|| self.anon_key.clone(), |s| s.access_token.clone());

        let response = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
            // Replace an existing avatar instead of failing on conflict.
            .header("x-upsert", "true")
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }

    /// Public URL for an object in a public bucket.
    ///
    /// Pure string construction - no request is made and no existence check
    /// is performed.
    ///
    /// # Errors
    ///
    /// Returns [`SupabaseError::BadUrl`] when the pieces do not form a URL.
    pub fn public_url(&self, bucket: &str, path: &str) -> Result<Url, SupabaseError> {
        join_url(&self.endpoint, &format!("object/public/{bucket}/{path}"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    #[test]
    fn test_public_url_shape() {
        let storage = StorageClient::new(
            reqwest::Client::new(),
            &"https://proj.supabase.co".parse().unwrap(),
            "anon".into(),
            Arc::new(RwLock::new(None)),
        )
        .unwrap();

        let url = storage.public_url("avatars", "user-1.png").unwrap();
        assert_eq!(
            url.as_str(),
            "https://proj.supabase.co/storage/v1/object/public/avatars/user-1.png"
        );
    }
}
