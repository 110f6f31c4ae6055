// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

use url::Url;

use crate::error::LocatorError;

/// URL of one downloadable media item, as found in the feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLocator(String);

impl MediaLocator {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the item name: the final path segment of the URL
    ///
    /// Query string and fragment are not part of the name. A URL whose path
    /// ends in `/` (or has no path at all) yields [`LocatorError::EmptyName`].
    pub fn item_name(&self) -> Result<ItemName, LocatorError> {
        let url = Url::parse(&self.0).map_err(|e| LocatorError::Invalid {
            locator: self.0.clone(),
            source: e,
        })?;

        url.path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())
            .map(|segment| ItemName(segment.to_string()))
            .ok_or_else(|| LocatorError::EmptyName {
                locator: self.0.clone(),
            })
    }
}

impl fmt::Display for MediaLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote file name and ledger key of a media item. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemName(String);

impl ItemName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
