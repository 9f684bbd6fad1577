//! CatalogStore trait definition.

use super::models::{Category, CategoryFields, Song};
use anyhow::Result;
use std::collections::HashMap;

/// Storage of songs, categories and the song/category membership sets.
pub trait CatalogStore: Send + Sync {
    // =========================================================================
    // Songs
    // =========================================================================

    fn get_song(&self, code: i64) -> Result<Option<Song>>;

    /// Batch lookup; codes with no matching song are simply absent from the map.
    fn get_songs_by_codes(&self, codes: &[i64]) -> Result<HashMap<i64, Song>>;

    /// All songs ordered by code. When `query` is given, only songs whose name
    /// or artist contains it (case-insensitive) are returned.
    fn list_songs(&self, query: Option<&str>) -> Result<Vec<Song>>;

    /// Songs whose category set contains `category_code`, ordered by code.
    fn get_songs_in_category(&self, category_code: i64) -> Result<Vec<Song>>;

    /// Inserts the song or replaces every field (category set included) of
    /// the song with the same code.
    fn upsert_song(&self, song: &Song) -> Result<()>;

    // =========================================================================
    // Categories
    // =========================================================================

    fn get_category(&self, code: i64) -> Result<Option<Category>>;

    fn get_categories_by_codes(&self, codes: &[i64]) -> Result<HashMap<i64, Category>>;

    /// All categories ordered by code.
    fn list_categories(&self) -> Result<Vec<Category>>;

    /// Creates a category with code `max(existing) + 1`.
    fn create_category(&self, fields: &CategoryFields) -> Result<Category>;

    /// Returns `Ok(None)` when no category has this code.
    fn update_category(&self, code: i64, fields: &CategoryFields) -> Result<Option<Category>>;

    /// Deletes the category and pulls its code out of every song's category
    /// set, as a single transaction. Returns the number of songs that lost the
    /// code, or `Ok(None)` when no category has this code.
    fn delete_category(&self, code: i64) -> Result<Option<usize>>;

    // =========================================================================
    // Membership
    // =========================================================================

    /// Adds every existing category in `category_codes` to every existing song
    /// in `song_codes`. Returns the number of memberships actually added.
    fn add_songs_to_categories(&self, song_codes: &[i64], category_codes: &[i64]) -> Result<usize>;

    /// Pulls `category_code` out of the listed songs. Returns how many songs
    /// were modified.
    fn remove_songs_from_category(&self, category_code: i64, song_codes: &[i64]) -> Result<usize>;

    // =========================================================================
    // Counts (for metrics)
    // =========================================================================

    fn get_songs_count(&self) -> usize;

    fn get_categories_count(&self) -> usize;
}
