//! User directory on Cloudflare R2 / AWS S3
//!
//! Every user is one JSON object under `users/<chat_id>.json`. Reads go
//! through a write-through moka cache.

use super::{DirectoryError, User, UserDirectory};
use crate::config::Settings;
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const USERS_PREFIX: &str = "users/";

/// Returns the R2 key for a user record
#[must_use]
pub fn user_key(chat_id: i64) -> String {
    format!("{USERS_PREFIX}{chat_id}.json")
}

/// Parses the chat id back out of a user record key
#[must_use]
pub fn chat_id_from_key(key: &str) -> Option<i64> {
    key.strip_prefix(USERS_PREFIX)?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

fn backend<E: std::error::Error>(context: &str, err: E) -> DirectoryError {
    DirectoryError::Backend(format!("{context}: {}", DisplayErrorContext(err)))
}

/// R2-backed directory implementation
pub struct R2Directory {
    client: Client,
    bucket: String,
    cache: Cache<String, Arc<Vec<u8>>>,
}

impl R2Directory {
    /// Create a new R2 directory instance
    ///
    /// # Errors
    ///
    /// Returns an error if R2 configuration is missing.
    pub async fn new(settings: &Settings) -> Result<Self, DirectoryError> {
        let endpoint_url = settings
            .r2_endpoint_url
            .as_ref()
            .ok_or_else(|| DirectoryError::Config("R2_ENDPOINT_URL is missing".into()))?;
        let access_key = settings
            .r2_access_key_id
            .as_ref()
            .ok_or_else(|| DirectoryError::Config("R2_ACCESS_KEY_ID is missing".into()))?;
        let secret_key = settings
            .r2_secret_access_key
            .as_ref()
            .ok_or_else(|| DirectoryError::Config("R2_SECRET_ACCESS_KEY is missing".into()))?;
        let bucket = settings
            .r2_bucket_name
            .as_ref()
            .ok_or_else(|| DirectoryError::Config("R2_BUCKET_NAME is missing".into()))?;

        let credentials = Credentials::new(access_key, secret_key, None, None, "r2-directory");

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new("auto"))
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .endpoint_url(endpoint_url)
            .force_path_style(true)
            .build();

        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(60 * 60))
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: bucket.clone(),
            cache,
        })
    }

    /// Check connection to the bucket
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket cannot be reached.
    pub async fn check_connection(&self) -> Result<(), DirectoryError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                info!(bucket = %self.bucket, "Successfully connected to R2 storage.");
                Ok(())
            }
            Err(e) => {
                let err = backend("R2 connectivity test failed", e);
                error!("{err}");
                Err(err)
            }
        }
    }

    async fn save_json<T: serde::Serialize + Sync>(
        &self,
        key: &str,
        data: &T,
    ) -> Result<(), DirectoryError> {
        let body_bytes = serde_json::to_vec_pretty(data)?;

        // Write-Through
        self.cache
            .insert(key.to_string(), Arc::new(body_bytes.clone()))
            .await;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body_bytes))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| backend("S3 put error", e))?;

        Ok(())
    }

    async fn load_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, DirectoryError> {
        if let Some(cached_data) = self.cache.get(key).await {
            match serde_json::from_slice(&cached_data) {
                Ok(data) => return Ok(Some(data)),
                Err(e) => {
                    warn!("Cache deserialization failed for {}: {}", key, e);
                    self.cache.invalidate(key).await;
                }
            }
        }

        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let data = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| backend("S3 body error", e))?
                    .into_bytes();

                self.cache
                    .insert(key.to_string(), Arc::new(data.to_vec()))
                    .await;

                Ok(Some(serde_json::from_slice(&data)?))
            }
            Err(SdkError::ServiceError(err)) if err.err().is_no_such_key() => Ok(None),
            Err(e) => Err(backend("S3 get error", e)),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>, DirectoryError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(USERS_PREFIX)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| backend("S3 list error", e))?;

            keys.extend(
                output
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl UserDirectory for R2Directory {
    async fn find_by_chat_id(&self, chat_id: i64) -> Result<Option<User>, DirectoryError> {
        self.load_json(&user_key(chat_id)).await
    }

    async fn create(&self, user: User) -> Result<User, DirectoryError> {
        if self.find_by_chat_id(user.chat_id).await?.is_some() {
            return Err(DirectoryError::Conflict(user.chat_id));
        }
        self.save_json(&user_key(user.chat_id), &user).await?;
        debug!(chat_id = user.chat_id, "User created");
        Ok(user)
    }

    async fn update(&self, user: User) -> Result<(), DirectoryError> {
        if self.find_by_chat_id(user.chat_id).await?.is_none() {
            return Err(DirectoryError::NotFound(user.chat_id));
        }
        self.save_json(&user_key(user.chat_id), &user).await
    }

    async fn delete_by_chat_id(&self, chat_id: i64) -> Result<(), DirectoryError> {
        let key = user_key(chat_id);
        self.cache.invalidate(&key).await;

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| backend("S3 delete error", e))?;

        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<User>, DirectoryError> {
        let mut users = Vec::new();
        for key in self.list_keys().await? {
            let Some(chat_id) = chat_id_from_key(&key) else {
                warn!(key, "Skipping unexpected object in users prefix");
                continue;
            };
            match self.find_by_chat_id(chat_id).await {
                Ok(Some(user)) => users.push(user),
                Ok(None) => {}
                Err(e) => warn!(chat_id, error = %e, "Skipping unreadable user record"),
            }
        }
        users.sort_by_key(|user| user.chat_id);
        Ok(users)
    }
}
