use std::io::Cursor;
use std::time::Duration;

use google_drive3::{api::File, api::Scope, DriveHub};
use tokio::runtime::Runtime;

use super::{DocumentStore, DocumentStoreError};

/// Thin wrapper around the generated google-drive3 client allowing the
/// synchronous certification pipeline to store artifacts without exposing
/// async details.
pub struct GoogleDriveStore<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    hub: DriveHub<C>,
    runtime: Runtime,
}

impl<C> GoogleDriveStore<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    pub fn new(hub: DriveHub<C>, runtime: Runtime) -> Self {
        Self { hub, runtime }
    }

    pub fn with_runtime(hub: DriveHub<C>) -> Result<Self, DocumentStoreError> {
        let runtime = Runtime::new().map_err(|err| DocumentStoreError::Backend(err.to_string()))?;
        Ok(Self::new(hub, runtime))
    }

    fn map_error<E: std::fmt::Display>(err: E) -> DocumentStoreError {
        DocumentStoreError::Backend(err.to_string())
    }

    fn file_id_from_url(url: &str) -> Result<&str, DocumentStoreError> {
        url.rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| DocumentStoreError::NotFound(url.to_string()))
    }
}

impl<C> std::fmt::Debug for GoogleDriveStore<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleDriveStore").finish_non_exhaustive()
    }
}

impl<C> DocumentStore for GoogleDriveStore<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    fn upload(
        &self,
        container: &str,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, DocumentStoreError> {
        let metadata = File {
            name: Some(name.to_string()),
            parents: Some(vec![container.to_string()]),
            ..File::default()
        };

        let mime_type = content_type
            .parse::<mime::Mime>()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM);
        let cursor = Cursor::new(bytes);

        let result = self.runtime.block_on(async {
            self.hub
                .files()
                .create(metadata)
                .param("fields", "id")
                .supports_all_drives(true)
                .add_scope(Scope::File)
                .upload(cursor, mime_type)
                .await
        });

        let (_, file) = result.map_err(GoogleDriveStore::<C>::map_error)?;
        let file_id = file
            .id
            .ok_or_else(|| DocumentStoreError::Backend("upload returned no file id".to_string()))?;
        Ok(format!("https://drive.google.com/file/d/{file_id}"))
    }

    fn read_url(&self, url: &str, _ttl: Duration) -> Result<String, DocumentStoreError> {
        let file_id = Self::file_id_from_url(url)?.to_string();
        let result = self.runtime.block_on(async {
            self.hub
                .files()
                .get(&file_id)
                .param("fields", "webViewLink")
                .supports_all_drives(true)
                .add_scope(Scope::Readonly)
                .doit()
                .await
        });

        let (_, file) = result.map_err(GoogleDriveStore::<C>::map_error)?;
        file.web_view_link
            .ok_or_else(|| DocumentStoreError::NotFound(url.to_string()))
    }

    fn delete(&self, url: &str) -> Result<(), DocumentStoreError> {
        let file_id = Self::file_id_from_url(url)?.to_string();
        let result = self.runtime.block_on(async {
            self.hub
                .files()
                .delete(&file_id)
                .supports_all_drives(true)
                .add_scope(Scope::File)
                .doit()
                .await
        });

        result.map_err(GoogleDriveStore::<C>::map_error)?;
        Ok(())
    }
}
