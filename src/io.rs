use bytes::Buf;
use futures::stream::TryStreamExt;
use warp::multipart::{FormData, Part};

use crate::errors::BackendError;
use crate::nutrition::UploadMetadata;

/// A parsed nutrition upload.
pub struct Upload {
    pub metadata: UploadMetadata,
    pub image: Vec<u8>,
}

/// Splits a multipart submission into its `metadata` and `image` parts.
/// Other parts are ignored. Parts are read in the order they arrive.
pub async fn parse_upload(mut content: FormData) -> Result<Upload, BackendError> {
    let mut metadata = None;
    let mut image = None;

    while let Some(part) = content
        .try_next()
        .await
        .map_err(|_| BackendError::MalformedFormSubmission)?
    {
        match part.name() {
            "metadata" => {
                let raw = part_as_vec(part).await?;
                metadata = Some(
                    serde_json::from_slice::<UploadMetadata>(&raw)
                        .map_err(BackendError::MalformedUploadMetadata)?,
                );
            }
            "image" => image = Some(part_as_vec(part).await?),
            _ => {}
        }
    }

    match (metadata, image) {
        (Some(metadata), Some(image)) => Ok(Upload { metadata, image }),
        _ => Err(BackendError::PartsMissing),
    }
}

/// Collects chunks of [`Part`].
pub async fn part_as_vec(raw: Part) -> Result<Vec<u8>, BackendError> {
    raw.stream()
        .try_fold(Vec::new(), |mut data, mut chunk| async move {
            while chunk.has_remaining() {
                let bytes = chunk.copy_to_bytes(chunk.remaining());
                data.extend_from_slice(&bytes);
            }

            Ok::<_, warp::Error>(data)
        })
        .await
        .map_err(|_| BackendError::MalformedFormSubmission)
}
