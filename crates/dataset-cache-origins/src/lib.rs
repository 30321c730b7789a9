pub mod document_share;
pub mod drive_item;
pub mod local_files;
pub mod object_store;
pub mod verifier;

pub use document_share::{DEFAULT_API_BASE, DocumentShareClient, DocumentShareConfig};
pub use local_files::LocalPartitionClient;
pub use object_store::{ObjectStorageClient, ObjectStorageConfig};
pub use verifier::check_remote_update;

use dataset_cache::{FetchError, OriginClient, RemoteOrigin};

/// Build the client matching an origin descriptor.
///
/// `access_token` is the opaque bearer string for origins that need one;
/// acquiring and refreshing it is entirely the caller's problem.
pub fn client_for(
    origin: &RemoteOrigin,
    access_token: Option<&str>,
) -> Result<Box<dyn OriginClient>, FetchError> {
    match origin {
        RemoteOrigin::DocumentShare {
            share_url,
            api_base_url,
        } => Ok(Box::new(DocumentShareClient::new(DocumentShareConfig {
            share_url: share_url.clone(),
            auth_token: access_token.map(str::to_owned),
            api_base_url: api_base_url.clone(),
        }))),

        RemoteOrigin::ObjectStorageBlob {
            endpoint,
            container,
            blob,
        } => Ok(Box::new(ObjectStorageClient::new(ObjectStorageConfig {
            endpoint: endpoint.clone(),
            container: container.clone(),
            blob: blob.clone(),
            access_token: access_token.map(str::to_owned),
        }))),

        RemoteOrigin::LocalPartitionedFiles {
            base_directory,
            filename_pattern,
        } => Ok(Box::new(LocalPartitionClient::new(
            base_directory.clone(),
            filename_pattern,
        )?)),
    }
}

/// Map a transport failure onto the shared error taxonomy.
pub(crate) fn request_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(e.to_string())
    } else {
        FetchError::Network(e.to_string())
    }
}
