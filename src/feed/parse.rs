// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use rss::extension::{Extension, ExtensionMap};

use crate::error::FeedError;
use crate::locator::MediaLocator;

const MEDIA_RSS_NAMESPACE: &str = "http://search.yahoo.com/mrss/";
const DEFAULT_MEDIA_PREFIX: &str = "media";

/// Parse RSS feed XML bytes into the ordered list of media locators
///
/// Each item contributes at most one locator: its enclosure URL if present,
/// otherwise the URL of its `media:content` element. Items with neither are
/// left out.
pub fn parse_feed(xml_bytes: &[u8], feed_url: &str) -> Result<Vec<MediaLocator>, FeedError> {
    let channel = rss::Channel::read_from(xml_bytes).map_err(|e| match e {
        rss::Error::Eof if !opens_channel(xml_bytes) => FeedError::Empty {
            url: feed_url.to_string(),
        },
        other => FeedError::Malformed(other),
    })?;

    if channel.items().is_empty() {
        return Err(FeedError::Empty {
            url: feed_url.to_string(),
        });
    }

    let media_prefixes = media_prefixes(&channel);

    Ok(channel
        .items()
        .iter()
        .filter_map(|item| item_locator(item, &media_prefixes))
        .collect())
}

/// Whether the document contains a `<channel` start tag at all. A document
/// that opened one and then ended early is truncated, not empty.
fn opens_channel(xml_bytes: &[u8]) -> bool {
    const TAG: &[u8] = b"<channel";

    xml_bytes.windows(TAG.len()).enumerate().any(|(i, window)| {
        window == TAG
            && xml_bytes
                .get(i + TAG.len())
                .is_none_or(|next| matches!(*next, b'>' | b'/' | b' ' | b'\t' | b'\r' | b'\n'))
    })
}

/// Prefixes bound to the Media RSS namespace, falling back to `media`
fn media_prefixes(channel: &rss::Channel) -> Vec<String> {
    let mut prefixes: Vec<String> = channel
        .namespaces()
        .iter()
        .filter(|(_, uri)| uri.trim_end_matches('/') == MEDIA_RSS_NAMESPACE.trim_end_matches('/'))
        .map(|(prefix, _)| prefix.clone())
        .collect();

    if prefixes.is_empty() {
        prefixes.push(DEFAULT_MEDIA_PREFIX.to_string());
    }
    prefixes
}

fn item_locator(item: &rss::Item, media_prefixes: &[String]) -> Option<MediaLocator> {
    item.enclosure()
        .map(|enclosure| enclosure.url())
        .filter(|url| !url.is_empty())
        .map(MediaLocator::new)
        .or_else(|| {
            media_prefixes
                .iter()
                .find_map(|prefix| media_content_url(item.extensions(), prefix))
                .map(MediaLocator::new)
        })
}

/// Find the first `<prefix>:content` URL, directly on the item or inside a
/// `<prefix>:group`
fn media_content_url(extensions: &ExtensionMap, prefix: &str) -> Option<String> {
    let media = extensions.get(prefix)?;

    media
        .get("content")
        .and_then(|contents| first_url(contents.iter()))
        .or_else(|| {
            media.get("group").and_then(|groups| {
                first_url(
                    groups
                        .iter()
                        .filter_map(|group| group.children().get("content"))
                        .flatten(),
                )
            })
        })
}

fn first_url<'a>(mut contents: impl Iterator<Item = &'a Extension>) -> Option<String> {
    contents.find_map(|content| {
        content
            .attrs()
            .get("url")
            .filter(|url| !url.is_empty())
            .cloned()
    })
}
