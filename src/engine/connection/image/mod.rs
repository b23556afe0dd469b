//! Image resolution: make sure an image is cached locally before
//! provisioning, pulling it when absent.

use std::future::Future;
use std::pin::Pin;

use bollard::Docker;
use bollard::errors::Error as BollardError;
use bollard::models::{CreateImageInfo, ImageSummary};
use bollard::query_parameters::{
    CreateImageOptions, CreateImageOptionsBuilder, ListImagesOptions, ListImagesOptionsBuilder,
};
use futures_util::{Stream, StreamExt};
use tracing::{debug, info};

use super::EngineConnector;
use crate::error::{ContainerError, FixtureError};

/// Boxed future type returned by [`ImageClient::list_images`].
pub type ListImagesFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<ImageSummary>, BollardError>> + Send + 'a>>;

/// Boxed progress stream returned by [`ImageClient::create_image`].
pub type CreateImageStream<'a> =
    Pin<Box<dyn Stream<Item = Result<CreateImageInfo, BollardError>> + Send + 'a>>;

/// Behaviour required to inspect and populate the local image cache.
pub trait ImageClient {
    /// List locally cached images.
    fn list_images(&self, options: Option<ListImagesOptions>) -> ListImagesFuture<'_>;

    /// Pull an image, yielding progress messages until it completes.
    fn create_image(&self, options: Option<CreateImageOptions>) -> CreateImageStream<'_>;
}

impl ImageClient for Docker {
    fn list_images(&self, options: Option<ListImagesOptions>) -> ListImagesFuture<'_> {
        Box::pin(async move { Self::list_images(self, options).await })
    }

    fn create_image(&self, options: Option<CreateImageOptions>) -> CreateImageStream<'_> {
        Box::pin(Self::create_image(self, options, None, None))
    }
}

impl EngineConnector {
    /// Ensure `image` is available locally, pulling it if no cached tag
    /// matches.
    ///
    /// The pull progress stream is drained to completion, so the image is
    /// fully available when this returns. Failures are not retried.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::ImagePullFailed` if listing images or any
    /// part of the pull fails.
    pub async fn ensure_image_async<C: ImageClient>(
        client: &C,
        image: &str,
    ) -> Result<(), FixtureError> {
        let list_options = ListImagesOptionsBuilder::new().all(true).build();
        let images = client
            .list_images(Some(list_options))
            .await
            .map_err(|error| image_pull_failed(image, format!("list images failed: {error}")))?;

        if is_cached(&images, image) {
            debug!(image, "image already cached");
            return Ok(());
        }

        info!(image, "pulling image");
        let pull_options = CreateImageOptionsBuilder::new().from_image(image).build();
        let mut progress = client.create_image(Some(pull_options));
        while let Some(item) = progress.next().await {
            item.map_err(|error| image_pull_failed(image, error.to_string()))?;
        }
        info!(image, "image pulled");

        Ok(())
    }
}

fn is_cached(images: &[ImageSummary], image: &str) -> bool {
    if image.contains('@') {
        return images
            .iter()
            .flat_map(|summary| summary.repo_digests.iter())
            .any(|digest| digest_matches(digest, image));
    }
    images
        .iter()
        .flat_map(|summary| summary.repo_tags.iter())
        .any(|tag| tag_matches(tag, image))
}

/// Match a cached repo digest against a `name[:tag]@digest` reference.
///
/// Engines record digests without the tag (`mysql@sha256:...`), so any tag
/// in the reference is ignored.
fn digest_matches(digest: &str, image: &str) -> bool {
    let Some((name, hash)) = image.split_once('@') else {
        return false;
    };
    let wanted = format!("{}@{hash}", strip_tag(name));
    digest == wanted || digest.ends_with(&format!("/{wanted}"))
}

fn strip_tag(name: &str) -> &str {
    name.rsplit_once(':')
        .filter(|(_, tag)| !tag.contains('/'))
        .map_or(name, |(repository, _)| repository)
}

/// Match a cached repo tag against a requested reference.
///
/// Engines may report fully qualified names (`docker.io/library/mysql:8`)
/// for short references, and an untagged reference means `latest`.
fn tag_matches(tag: &str, image: &str) -> bool {
    let wanted = if has_tag(image) {
        image.to_owned()
    } else {
        format!("{image}:latest")
    };
    tag == wanted || tag.ends_with(&format!("/{wanted}"))
}

fn has_tag(image: &str) -> bool {
    let last_segment = image.rsplit('/').next().unwrap_or(image);
    last_segment.contains(':') || last_segment.contains('@')
}

fn image_pull_failed(image: &str, message: impl Into<String>) -> FixtureError {
    FixtureError::from(ContainerError::ImagePullFailed {
        image: String::from(image),
        message: message.into(),
    })
}
