//! Page-level source traits.

use serde::Deserialize;

use hotspot_types::{ChallengeRecord, Hotspot};

use crate::FetchError;

/// One page of a cursor-paginated listing.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, cursor: Option<&str>) -> Self {
        Self {
            data,
            cursor: cursor.map(str::to_string),
        }
    }

    /// Cursor for the next page. An empty string means end of data.
    pub fn next_cursor(&self) -> Option<&str> {
        self.cursor.as_deref().filter(|c| !c.is_empty())
    }
}

/// Fetches single pages of challenge records, newest first.
pub trait ChallengeSource {
    fn fetch_page(
        &self,
        address: &str,
        cursor: Option<&str>,
    ) -> Result<Page<ChallengeRecord>, FetchError>;
}

/// Fetches hotspot directory data.
pub trait DirectorySource {
    fn fetch_hotspot_page(&self, cursor: Option<&str>) -> Result<Page<Hotspot>, FetchError>;

    /// A single hotspot, `None` when the API does not know the address.
    fn fetch_hotspot(&self, address: &str) -> Result<Option<Hotspot>, FetchError>;

    /// Current chain height.
    fn current_height(&self) -> Result<u64, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cursor_means_end() {
        let page: Page<u32> = serde_json::from_str(r#"{"data":[1,2],"cursor":""}"#).unwrap();
        assert_eq!(page.next_cursor(), None);
        let page: Page<u32> = serde_json::from_str(r#"{"data":[]}"#).unwrap();
        assert_eq!(page.next_cursor(), None);
        let page: Page<u32> = serde_json::from_str(r#"{"data":[],"cursor":"abc"}"#).unwrap();
        assert_eq!(page.next_cursor(), Some("abc"));
    }
}
