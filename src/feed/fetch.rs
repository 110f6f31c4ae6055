// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bytes::Bytes;
use tracing::{debug, info};

use crate::error::FeedError;
use crate::http::HttpClient;
use crate::locator::MediaLocator;

use super::parse::parse_feed;

/// Fetch raw feed bytes from a URL (without parsing)
///
/// Any non-2xx status is reported as [`FeedError::Unavailable`].
pub async fn fetch_feed_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Bytes, FeedError> {
    let response = client
        .get_bytes(url)
        .await
        .map_err(|e| FeedError::FetchFailed {
            url: url.to_string(),
            source: e,
        })?;

    if !response.is_success() {
        return Err(FeedError::Unavailable {
            url: url.to_string(),
            status: response.status,
        });
    }

    debug!(url, bytes = response.body.len(), "feed fetched");
    Ok(response.body)
}

/// Fetch a feed and extract its media locators in document order
pub async fn fetch_feed<C: HttpClient>(
    client: &C,
    url: &str,
) -> Result<Vec<MediaLocator>, FeedError> {
    info!(url, "refreshing feed");
    let bytes = fetch_feed_bytes(client, url).await?;
    let links = parse_feed(&bytes, url)?;
    info!(url, links = links.len(), "found media links");
    Ok(links)
}
