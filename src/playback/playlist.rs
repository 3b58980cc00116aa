//! Playlist management for playback sessions
//!
//! This module provides the cursor a sequencer moves through a content
//! listing, with or without wrapping around its ends.

use crate::content::ContentItem;
use log::debug;

/// Position inside a content listing
///
/// The cursor either points at an item of a non-empty listing or is in the
/// terminal "no content" state.
#[derive(Debug, Clone, Default)]
pub struct PlaylistCursor {
    /// Items of the listing
    items: Vec<ContentItem>,
    /// Current index, `None` when there is no content
    current_index: Option<usize>,
}

impl PlaylistCursor {
    /// Creates a cursor at `index`, clamped into the listing
    pub fn new(items: Vec<ContentItem>, index: usize) -> Self {
        let current_index = match items.len() {
            0 => None,
            len => Some(index.min(len - 1)),
        };
        debug!(
            "Playlist of {} items starting at {current_index:?}",
            items.len()
        );
        Self {
            items,
            current_index,
        }
    }

    /// Gets the current item
    pub fn current(&self) -> Option<&ContentItem> {
        self.current_index.and_then(|index| self.items.get(index))
    }

    /// Gets the current index
    pub fn index(&self) -> Option<usize> {
        self.current_index
    }

    /// Moves to the next item
    ///
    /// At the end of the listing the cursor wraps to the start when `wrap` is
    /// set and stays put otherwise.
    pub fn next(&mut self, wrap: bool) -> Option<&ContentItem> {
        let index = self.current_index?;
        let next_index = if index + 1 < self.items.len() {
            index + 1
        } else if wrap {
            0
        } else {
            return None; // End of playlist
        };
        self.current_index = Some(next_index);
        self.current()
    }

    /// Moves to the previous item
    ///
    /// At the start of the listing the cursor wraps to the end when `wrap` is
    /// set and stays put otherwise.
    pub fn previous(&mut self, wrap: bool) -> Option<&ContentItem> {
        let index = self.current_index?;
        let previous_index = if index > 0 {
            index - 1
        } else if wrap {
            self.items.len() - 1
        } else {
            return None; // Beginning of playlist
        };
        self.current_index = Some(previous_index);
        self.current()
    }

    /// Checks if there is no content
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Gets the number of items in the playlist
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Gets all items of the playlist
    pub fn items(&self) -> &[ContentItem] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(titles: &[&str]) -> Vec<ContentItem> {
        titles
            .iter()
            .map(|title| ContentItem {
                id: title.to_string(),
                title: title.to_string(),
                ..Default::default()
            })
            .collect()
    }

    fn title(cursor: &PlaylistCursor) -> Option<&str> {
        cursor.current().map(|item| item.title.as_str())
    }

    #[test]
    fn test_new_clamps_index() {
        let cursor = PlaylistCursor::new(items(&["A", "B", "C"]), 7);
        assert_eq!(cursor.index(), Some(2));
        assert_eq!(title(&cursor), Some("C"));
    }

    #[test]
    fn test_empty_listing_has_no_content() {
        let mut cursor = PlaylistCursor::new(Vec::new(), 0);
        assert!(cursor.is_empty());
        assert_eq!(cursor.current(), None);
        assert_eq!(cursor.next(true), None);
        assert_eq!(cursor.previous(true), None);
    }

    #[test]
    fn test_next_without_wrap_stops_at_end() {
        let mut cursor = PlaylistCursor::new(items(&["A", "B", "C"]), 1);
        assert_eq!(cursor.next(false).map(|i| i.title.as_str()), Some("C"));
        assert_eq!(cursor.next(false), None);
        assert_eq!(title(&cursor), Some("C"));
    }

    #[test]
    fn test_next_with_wrap() {
        let mut cursor = PlaylistCursor::new(items(&["A", "B", "C"]), 2);
        assert_eq!(cursor.next(true).map(|i| i.title.as_str()), Some("A"));
        assert_eq!(cursor.index(), Some(0));
    }

    #[test]
    fn test_previous() {
        let mut cursor = PlaylistCursor::new(items(&["A", "B", "C"]), 0);
        assert_eq!(cursor.previous(false), None);
        assert_eq!(title(&cursor), Some("A"));
        assert_eq!(cursor.previous(true).map(|i| i.title.as_str()), Some("C"));
        assert_eq!(cursor.previous(true).map(|i| i.title.as_str()), Some("B"));
    }
}
