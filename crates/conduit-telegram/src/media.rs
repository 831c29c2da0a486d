//! Inbound media handling: download via the Bot API, then hand the bytes to
//! an `ObjectStore` (implemented by the deployment — S3, GCS, local disk).
//! Grounded on `original_source/telegram-lambda/src/file_handler.py`'s
//! `download_telegram_file`/`upload_to_s3` pair, but kept free of any cloud
//! SDK: the storage backend is a seam, same pattern as
//! `conduit_commands::DeploymentInfoProvider`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use thiserror::Error;

use conduit_core::config::MAX_TELEGRAM_FILE_BYTES;
use conduit_protocol::envelope::Attachment;

use crate::update::MediaRef;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object store put failed: {0}")]
    Put(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, ObjectStoreError>;
}

/// Dev/test backend — keeps uploaded bytes in memory instead of talking to
/// real object storage.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String, ObjectStoreError> {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(format!("mem://{key}"))
    }
}

pub enum MediaOutcome {
    Uploaded(Attachment),
    PermissionDenied(Attachment),
    TooLarge(u64),
}

/// Downloads `media` via the Bot API and uploads it to `store`, producing the
/// `Attachment::Telegram` record for the envelope. The 20MB cap (§4.4.1) is
/// enforced against `getFile`'s reported size, before any bytes are pulled.
pub async fn fetch_and_store(
    bot: &Bot,
    store: &dyn ObjectStore,
    object_storage_base: &str,
    chat_id: i64,
    message_id: i64,
    media: &MediaRef,
    allowed: bool,
) -> Result<MediaOutcome, ObjectStoreError> {
    if !allowed {
        return Ok(MediaOutcome::PermissionDenied(Attachment::Telegram {
            kind: media.kind.to_string(),
            file_id: media.file_id.clone(),
            file_name: media.file_name.clone(),
            mime_type: media.mime_type.clone(),
            file_size: None,
            s3_url: None,
            permission_denied: true,
            task: None,
        }));
    }

    let file = match bot.get_file(&media.file_id).await {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(file_id = %media.file_id, error = %e, "telegram getFile failed");
            return Ok(MediaOutcome::PermissionDenied(Attachment::Telegram {
                kind: media.kind.to_string(),
                file_id: media.file_id.clone(),
                file_name: media.file_name.clone(),
                mime_type: media.mime_type.clone(),
                file_size: None,
                s3_url: None,
                permission_denied: false,
                task: Some("download_failed".to_string()),
            }));
        }
    };

    if u64::from(file.size) > MAX_TELEGRAM_FILE_BYTES {
        return Ok(MediaOutcome::TooLarge(MAX_TELEGRAM_FILE_BYTES));
    }

    let mut buf = Vec::new();
    if let Err(e) = bot.download_file(&file.path, &mut buf).await {
        tracing::warn!(file_id = %media.file_id, error = %e, "telegram downloadFile failed");
        return Ok(MediaOutcome::PermissionDenied(Attachment::Telegram {
            kind: media.kind.to_string(),
            file_id: media.file_id.clone(),
            file_name: media.file_name.clone(),
            mime_type: media.mime_type.clone(),
            file_size: Some(file.size as u64),
            s3_url: None,
            permission_denied: false,
            task: Some("download_failed".to_string()),
        }));
    }

    let filename = media
        .file_name
        .clone()
        .unwrap_or_else(|| media.file_id.clone());
    let key = format!("{object_storage_base}/{chat_id}/{message_id}/{filename}");
    let content_type = media.mime_type.as_deref().unwrap_or("application/octet-stream");
    let url = store.put(&key, buf, content_type).await?;

    Ok(MediaOutcome::Uploaded(Attachment::Telegram {
        kind: media.kind.to_string(),
        file_id: media.file_id.clone(),
        file_name: media.file_name.clone(),
        mime_type: media.mime_type.clone(),
        file_size: Some(file.size as u64),
        s3_url: Some(url),
        permission_denied: false,
        task: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_roundtrips() {
        let store = InMemoryObjectStore::new();
        let url = store.put("1/2/file.png", vec![1, 2, 3], "image/png").await.unwrap();
        assert_eq!(url, "mem://1/2/file.png");
        assert_eq!(store.get("1/2/file.png"), Some(vec![1, 2, 3]));
    }
}
