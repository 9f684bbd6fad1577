//! SQLite-backed catalog store.

use super::models::*;
use super::schema::{CATALOG_VERSIONED_SCHEMAS, CATEGORIES_TABLE, SONGS_TABLE};
use super::trait_def::CatalogStore;
use crate::sqlite_persistence::{migrate_if_needed, read_schema_version};
use anyhow::{bail, Context, Result};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

const DEFAULT_READ_POOL_SIZE: usize = 4;

/// Upper bound of bound parameters per `IN (...)` lookup.
const LOOKUP_CHUNK_SIZE: usize = 500;

const SONG_COLUMNS: &str = "s.code, s.name, s.artist, s.duration, s.artwork, s.release_date, \
     (SELECT group_concat(sc.category_code) FROM song_categories sc WHERE sc.song_code = s.code)";

#[derive(Clone)]
pub struct SqliteCatalogStore {
    read_pool: Vec<Arc<Mutex<Connection>>>,
    write_conn: Arc<Mutex<Connection>>,
    read_index: Arc<AtomicUsize>,
}

impl SqliteCatalogStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        Self::with_read_pool_size(db_path, DEFAULT_READ_POOL_SIZE)
    }

    pub fn with_read_pool_size<P: AsRef<Path>>(db_path: P, read_pool_size: usize) -> Result<Self> {
        let db_path = db_path.as_ref();
        if read_pool_size == 0 {
            bail!("Catalog read pool size must be at least 1");
        }

        let is_new = !db_path.exists();
        let mut write_conn = Connection::open_with_flags(
            db_path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open catalog database {:?}", db_path))?;

        if is_new {
            let latest = CATALOG_VERSIONED_SCHEMAS
                .last()
                .context("No catalog schema defined")?;
            info!("Creating catalog db schema at version {}", latest.version);
            latest.create(&write_conn)?;
        } else {
            let version = read_schema_version(&write_conn)?;
            migrate_if_needed(&mut write_conn, CATALOG_VERSIONED_SCHEMAS, version)?;
        }

        write_conn.pragma_update(None, "journal_mode", "WAL")?;
        write_conn.pragma_update(None, "foreign_keys", "ON")?;

        let songs = count_rows(&write_conn, SONGS_TABLE.name);
        let categories = count_rows(&write_conn, CATEGORIES_TABLE.name);
        info!(
            "Opened catalog: {} songs, {} categories",
            songs, categories
        );

        let mut read_pool = Vec::with_capacity(read_pool_size);
        for _ in 0..read_pool_size {
            let read_conn = Connection::open_with_flags(
                db_path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                    | rusqlite::OpenFlags::SQLITE_OPEN_URI
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            read_pool.push(Arc::new(Mutex::new(read_conn)));
        }

        Ok(SqliteCatalogStore {
            read_pool,
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_index: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn get_read_conn(&self) -> Arc<Mutex<Connection>> {
        let index = self.read_index.fetch_add(1, Ordering::Relaxed) % self.read_pool.len();
        self.read_pool[index].clone()
    }

    fn query_songs<P: rusqlite::Params>(&self, filter: &str, params: P) -> Result<Vec<Song>> {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM songs s {} ORDER BY s.code",
            SONG_COLUMNS, filter
        ))?;
        let songs = stmt
            .query_map(params, song_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(songs)
    }
}

fn count_rows(conn: &Connection, table: &str) -> usize {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| {
        r.get::<_, i64>(0)
    })
    .map(|n| n as usize)
    .unwrap_or(0)
}

fn parse_category_list(joined: Option<String>) -> BTreeSet<i64> {
    joined
        .as_deref()
        .unwrap_or("")
        .split(',')
        .filter_map(|c| c.trim().parse::<i64>().ok())
        .collect()
}

fn song_from_row(row: &Row) -> rusqlite::Result<Song> {
    Ok(Song {
        code: row.get(0)?,
        name: row.get(1)?,
        artist: row.get(2)?,
        duration: row.get(3)?,
        artwork: row.get(4)?,
        release_date: row.get(5)?,
        categories: parse_category_list(row.get(6)?),
    })
}

fn category_from_row(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        code: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        logo: row.get(3)?,
    })
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Escapes LIKE wildcards so that user queries match literally.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

impl CatalogStore for SqliteCatalogStore {
    fn get_song(&self, code: i64) -> Result<Option<Song>> {
        Ok(self
            .query_songs("WHERE s.code = ?1", params![code])?
            .into_iter()
            .next())
    }

    fn get_songs_by_codes(&self, codes: &[i64]) -> Result<HashMap<i64, Song>> {
        let mut found = HashMap::with_capacity(codes.len());
        for chunk in codes.chunks(LOOKUP_CHUNK_SIZE) {
            let filter = format!("WHERE s.code IN ({})", placeholders(chunk.len()));
            for song in self.query_songs(&filter, params_from_iter(chunk.iter()))? {
                found.insert(song.code, song);
            }
        }
        Ok(found)
    }

    fn list_songs(&self, query: Option<&str>) -> Result<Vec<Song>> {
        match query.map(str::trim).filter(|q| !q.is_empty()) {
            None => self.query_songs("", []),
            Some(q) => self.query_songs(
                "WHERE s.name LIKE ?1 ESCAPE '\\' OR s.artist LIKE ?1 ESCAPE '\\'",
                params![like_pattern(q)],
            ),
        }
    }

    fn get_songs_in_category(&self, category_code: i64) -> Result<Vec<Song>> {
        self.query_songs(
            "WHERE s.code IN (SELECT song_code FROM song_categories WHERE category_code = ?1)",
            params![category_code],
        )
    }

    fn upsert_song(&self, song: &Song) -> Result<()> {
        let mut conn = self.write_conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO songs (code, name, artist, duration, artwork, release_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(code) DO UPDATE SET
                name = excluded.name,
                artist = excluded.artist,
                duration = excluded.duration,
                artwork = excluded.artwork,
                release_date = excluded.release_date",
            params![
                song.code,
                song.name,
                song.artist,
                song.duration,
                song.artwork,
                song.release_date
            ],
        )
        .with_context(|| format!("Failed to upsert song {}", song.code))?;
        tx.execute(
            "DELETE FROM song_categories WHERE song_code = ?1",
            params![song.code],
        )?;
        for category_code in &song.categories {
            tx.execute(
                "INSERT INTO song_categories (song_code, category_code) VALUES (?1, ?2)",
                params![song.code, category_code],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_category(&self, code: i64) -> Result<Option<Category>> {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        let category = conn
            .query_row(
                "SELECT code, name, description, logo FROM categories WHERE code = ?1",
                params![code],
                category_from_row,
            )
            .optional()?;
        Ok(category)
    }

    fn get_categories_by_codes(&self, codes: &[i64]) -> Result<HashMap<i64, Category>> {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        let mut found = HashMap::with_capacity(codes.len());
        for chunk in codes.chunks(LOOKUP_CHUNK_SIZE) {
            let mut stmt = conn.prepare(&format!(
                "SELECT code, name, description, logo FROM categories WHERE code IN ({})",
                placeholders(chunk.len())
            ))?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), category_from_row)?;
            for category in rows {
                let category = category?;
                found.insert(category.code, category);
            }
        }
        Ok(found)
    }

    fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT code, name, description, logo FROM categories ORDER BY code")?;
        let categories = stmt
            .query_map([], category_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    fn create_category(&self, fields: &CategoryFields) -> Result<Category> {
        let mut conn = self.write_conn.lock().unwrap();
        let tx = conn.transaction()?;
        let code: i64 = tx.query_row(
            "SELECT COALESCE(MAX(code), 0) + 1 FROM categories",
            [],
            |r| r.get(0),
        )?;
        tx.execute(
            "INSERT INTO categories (code, name, description, logo) VALUES (?1, ?2, ?3, ?4)",
            params![code, fields.name, fields.description, fields.logo],
        )
        .with_context(|| format!("Failed to create category {}", fields.name))?;
        tx.commit()?;
        debug!("Created category {} ({})", code, fields.name);

        Ok(Category {
            code,
            name: fields.name.clone(),
            description: fields.description.clone(),
            logo: fields.logo.clone(),
        })
    }

    fn update_category(&self, code: i64, fields: &CategoryFields) -> Result<Option<Category>> {
        let conn = self.write_conn.lock().unwrap();
        let updated = conn
            .execute(
                "UPDATE categories SET name = ?2, description = ?3, logo = ?4 WHERE code = ?1",
                params![code, fields.name, fields.description, fields.logo],
            )
            .with_context(|| format!("Failed to update category {}", code))?;
        if updated == 0 {
            return Ok(None);
        }
        Ok(Some(Category {
            code,
            name: fields.name.clone(),
            description: fields.description.clone(),
            logo: fields.logo.clone(),
        }))
    }

    fn delete_category(&self, code: i64) -> Result<Option<usize>> {
        let mut conn = self.write_conn.lock().unwrap();
        let tx = conn.transaction()?;
        let deleted = tx.execute("DELETE FROM categories WHERE code = ?1", params![code])?;
        if deleted == 0 {
            return Ok(None);
        }
        let pulled = tx.execute(
            "DELETE FROM song_categories WHERE category_code = ?1",
            params![code],
        )?;
        tx.commit()?;
        info!(
            "Deleted category {}, removed from {} songs",
            code, pulled
        );
        Ok(Some(pulled))
    }

    fn add_songs_to_categories(&self, song_codes: &[i64], category_codes: &[i64]) -> Result<usize> {
        let mut conn = self.write_conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut added = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO song_categories (song_code, category_code)
                 SELECT s.code, c.code FROM songs s, categories c
                 WHERE s.code = ?1 AND c.code = ?2",
            )?;
            for song_code in song_codes {
                for category_code in category_codes {
                    added += stmt.execute(params![song_code, category_code])?;
                }
            }
        }
        tx.commit()?;
        Ok(added)
    }

    fn remove_songs_from_category(&self, category_code: i64, song_codes: &[i64]) -> Result<usize> {
        let mut conn = self.write_conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut modified = 0;
        {
            let mut stmt = tx.prepare(
                "DELETE FROM song_categories WHERE song_code = ?1 AND category_code = ?2",
            )?;
            let unique_codes: BTreeSet<i64> = song_codes.iter().copied().collect();
            for song_code in unique_codes {
                modified += stmt.execute(params![song_code, category_code])?;
            }
        }
        tx.commit()?;
        Ok(modified)
    }

    fn get_songs_count(&self) -> usize {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        count_rows(&conn, SONGS_TABLE.name)
    }

    fn get_categories_count(&self) -> usize {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        count_rows(&conn, CATEGORIES_TABLE.name)
    }
}
