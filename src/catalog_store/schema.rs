//! SQLite schema of the catalog database.
//!
//! A song's category set is stored as rows of `song_categories`. Category
//! codes there are plain integers with no reference to `categories`, so that
//! songs may carry codes of categories that were never created (CSV imports).

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema,
};

pub const SONGS_TABLE: Table = Table {
    name: "songs",
    columns: &[
        sqlite_column!("code", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("artist", &SqlType::Text, non_null = true),
        sqlite_column!("duration", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "artwork",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!("release_date", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_songs_name", "name"), ("idx_songs_artist", "artist")],
    unique_constraints: &[],
};

pub const CATEGORIES_TABLE: Table = Table {
    name: "categories",
    columns: &[
        sqlite_column!("code", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("description", &SqlType::Text, non_null = true),
        sqlite_column!(
            "logo",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
    ],
    indices: &[],
    unique_constraints: &[&["name"]],
};

pub const SONG_CATEGORIES_TABLE: Table = Table {
    name: "song_categories",
    columns: &[
        sqlite_column!(
            "song_code",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "songs",
                foreign_column: "code",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("category_code", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_song_categories_category", "category_code")],
    unique_constraints: &[&["song_code", "category_code"]],
};

pub const CATALOG_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[SONGS_TABLE, CATEGORIES_TABLE, SONG_CATEGORIES_TABLE],
    migration: None,
}];
