//! Public download URLs for stored profile photos

use reqwest::Url;
use tracing::{info, warn};

use super::BatchReport;
use crate::backend::{ObjectDescriptor, ObjectStore};
use crate::error::ServiceError;

/// URLs in listing order, plus the tally of objects seen
#[derive(Debug, Clone, Default)]
pub struct PhotoListing {
    pub urls: Vec<String>,
    pub report: BatchReport,
}

/// `https://<host>/v0/b/<bucket>/o/<encoded name>?alt=media&token=<token>`
///
/// The object name is a single percent-encoded path segment, so its `/`
/// separators become `%2F`. A host that carries its own scheme (an emulator at
/// `http://localhost:9199`) is used as is.
pub fn download_url(host: &str, object: &ObjectDescriptor, token: &str) -> Result<String, ServiceError> {
    let base = if host.contains("://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", host.trim_end_matches('/'))
    };
    let mut url = Url::parse(&base)
        .map_err(|e| ServiceError::InvalidResponse(format!("bad download host '{}': {}", host, e)))?;
    url.path_segments_mut()
        .map_err(|_| ServiceError::InvalidResponse(format!("download host '{}' cannot take a path", host)))?
        .pop_if_empty()
        .extend(["v0", "b", &object.bucket, "o", &object.name]);
    url.query_pairs_mut()
        .append_pair("alt", "media")
        .append_pair("token", token);
    Ok(url.to_string())
}

/// List every object under `prefix` and build its download URL
///
/// Objects without a download token are skipped with a warning. A failing
/// listing is an error of the whole job.
pub async fn collect_photo_urls(
    objects: &dyn ObjectStore,
    prefix: &str,
    host: &str,
) -> Result<PhotoListing, ServiceError> {
    info!(%prefix, "Collecting photo URLs");
    let mut listing = PhotoListing::default();

    for object in objects.list_objects(prefix).await? {
        let Some(token) = object.download_token.as_deref() else {
            warn!(name = %object.name, "Object has no download token, skipping");
            listing.report.skipped += 1;
            continue;
        };
        listing.urls.push(download_url(host, &object, token)?);
        listing.report.succeeded += 1;
    }

    info!(
        urls = listing.urls.len(),
        skipped = listing.report.skipped,
        "Finished collecting photo URLs"
    );
    Ok(listing)
}
