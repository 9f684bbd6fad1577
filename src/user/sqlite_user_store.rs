use super::auth::{AuthToken, AuthTokenValue, PasswordCredentials, PasswordHasherKind};
use super::permissions::UserRole;
use super::rank_list::{coerce_str_i64, decode_rank_list_with_count, encode_rank_list};
use super::user_models::{Placement, Ranking, Review, UserActivity};
use super::user_store::*;
use crate::sqlite_column;
use crate::sqlite_persistence::{
    migrate_if_needed, read_schema_version, Column, ForeignKey, ForeignKeyOnChange, SqlType,
    Table, VersionedSchema, DEFAULT_TIMESTAMP,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{
    params,
    types::{Type, ValueRef},
    Connection, OptionalExtension, Row,
};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

const USER_FK: ForeignKey = ForeignKey {
    foreign_table: "user",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

/// V 0
const USER_TABLE_V_0: Table = Table {
    name: "user",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("handle", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("mail", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "role",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'Client'")
        ),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_user_handle", "handle")],
    unique_constraints: &[],
};

const USER_PASSWORD_CREDENTIALS_TABLE_V_0: Table = Table {
    name: "user_password_credentials",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            is_primary_key = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!("salt", &SqlType::Text, non_null = true),
        sqlite_column!("hash", &SqlType::Text, non_null = true),
        sqlite_column!("hasher", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

const AUTH_TOKEN_TABLE_V_0: Table = Table {
    name: "auth_token",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!(
            "value",
            &SqlType::Text,
            is_primary_key = true,
            non_null = true
        ),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("last_used", &SqlType::Integer),
    ],
    indices: &[("idx_auth_token_user", "user_id")],
    unique_constraints: &[],
};

const REVIEW_TABLE_V_0: Table = Table {
    name: "review",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!("song_code", &SqlType::Integer, non_null = true),
        sqlite_column!("rating", &SqlType::Integer, non_null = true),
        sqlite_column!("comments", &SqlType::Text, non_null = true),
        sqlite_column!(
            "review_date",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_review_song", "song_code")],
    unique_constraints: &[&["user_id", "song_code"]],
};

const RANKING_TABLE_V_0: Table = Table {
    name: "ranking",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!("category_code", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "ranking_date",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "rank_list",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'[]'")
        ),
    ],
    indices: &[("idx_ranking_category", "category_code")],
    unique_constraints: &[&["user_id", "category_code"]],
};

pub const USER_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        USER_TABLE_V_0,
        USER_PASSWORD_CREDENTIALS_TABLE_V_0,
        AUTH_TOKEN_TABLE_V_0,
        REVIEW_TABLE_V_0,
        RANKING_TABLE_V_0,
    ],
    migration: None,
}];

fn datetime_from_column(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn system_time_from_column(secs: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64)
}

fn system_time_to_column(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn role_from_column(row: &Row, index: usize) -> rusqlite::Result<UserRole> {
    let raw: String = row.get(index)?;
    UserRole::from_str(&raw)
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(index, raw, Type::Text))
}

const MIN_STORED_RATING: i64 = 1;
const MAX_STORED_RATING: i64 = 5;

/// Reads a stored rating, accepting integers, floats and numeric text.
/// Returns `None` when the value is unreadable or outside 1..=5.
fn rating_from_column(row: &Row, index: usize) -> rusqlite::Result<Option<u8>> {
    let rating = match row.get_ref(index)? {
        ValueRef::Integer(i) => Some(i),
        ValueRef::Real(f) if f.is_finite() => Some(f.trunc() as i64),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes).ok().and_then(coerce_str_i64),
        _ => None,
    };
    Ok(rating
        .filter(|r| (MIN_STORED_RATING..=MAX_STORED_RATING).contains(r))
        .map(|r| r as u8))
}

/// Maps a review row, skipping (with a warning) rows whose rating is unusable.
fn review_from_row(row: &Row) -> rusqlite::Result<Option<Review>> {
    let user_handle: String = row.get(0)?;
    let song_code: i64 = row.get(1)?;
    let Some(rating) = rating_from_column(row, 2)? else {
        warn!(
            "Skipping review by {} of song {}: unusable rating",
            user_handle, song_code
        );
        return Ok(None);
    };
    Ok(Some(Review {
        user_handle,
        song_code,
        rating,
        comments: row.get(3)?,
        review_date: datetime_from_column(row.get(4)?),
    }))
}

fn ranking_from_row(row: &Row) -> rusqlite::Result<Ranking> {
    let raw: String = row.get(4)?;
    let (rank_list, stored_entries) = decode_rank_list_with_count(&raw);
    Ok(Ranking {
        id: row.get(0)?,
        user_id: row.get(1)?,
        category_code: row.get(2)?,
        ranking_date: datetime_from_column(row.get(3)?),
        rank_list,
        stored_entries,
    })
}

const REVIEW_SELECT: &str = "SELECT u.handle, r.song_code, r.rating, r.comments, r.review_date \
     FROM review r JOIN user u ON u.id = r.user_id";

const RANKING_SELECT: &str =
    "SELECT id, user_id, category_code, ranking_date, rank_list FROM ranking";

#[derive(Clone)]
pub struct SqliteUserStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let db_path = db_path.as_ref();
        let mut conn = if db_path.exists() {
            Connection::open_with_flags(
                db_path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                    | rusqlite::OpenFlags::SQLITE_OPEN_URI
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .with_context(|| format!("Failed to open user database {:?}", db_path))?
        } else {
            let conn = Connection::open(db_path)
                .with_context(|| format!("Failed to create user database {:?}", db_path))?;
            let latest = USER_VERSIONED_SCHEMAS
                .last()
                .context("No user schema defined")?;
            info!("Creating user db schema at version {}", latest.version);
            latest.create(&conn)?;
            conn
        };

        let version = read_schema_version(&conn)?;
        migrate_if_needed(&mut conn, USER_VERSIONED_SCHEMAS, version)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(SqliteUserStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl UserStore for SqliteUserStore {
    fn create_user(&self, user_handle: &str, mail: &str, role: UserRole) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO user (handle, mail, role) VALUES (?1, ?2, ?3)",
            params![user_handle, mail, role.as_str()],
        )
        .with_context(|| format!("Failed to create user {}", user_handle))?;
        Ok(conn.last_insert_rowid() as usize)
    }

    fn get_user_id(&self, user_handle: &str) -> Result<Option<usize>> {
        let conn = self.conn.lock().unwrap();
        let id = conn
            .query_row(
                "SELECT id FROM user WHERE handle = ?1",
                params![user_handle],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(id.map(|id| id as usize))
    }

    fn get_user_handle(&self, user_id: usize) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT handle FROM user WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn is_mail_taken(&self, mail: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM user WHERE mail = ?1 COLLATE NOCASE",
            params![mail],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn get_user_role(&self, user_id: usize) -> Result<Option<UserRole>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT role FROM user WHERE id = ?1",
                params![user_id],
                |row| role_from_column(row, 0),
            )
            .optional()?)
    }

    fn set_user_role(&self, user_id: usize, role: UserRole) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE user SET role = ?2 WHERE id = ?1",
            params![user_id, role.as_str()],
        )?;
        Ok(())
    }

    fn get_users_activity(&self) -> Result<Vec<UserActivity>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT u.handle, u.mail, u.role,
                (SELECT COUNT(*) FROM review r WHERE r.user_id = u.id),
                (SELECT COUNT(*) FROM ranking k WHERE k.user_id = u.id),
                (SELECT MAX(review_date) FROM review r WHERE r.user_id = u.id),
                (SELECT MAX(ranking_date) FROM ranking k WHERE k.user_id = u.id)
             FROM user u ORDER BY u.handle",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(UserActivity {
                    handle: row.get(0)?,
                    mail: row.get(1)?,
                    role: role_from_column(row, 2)?,
                    reviews: row.get::<_, i64>(3)? as usize,
                    rankings: row.get::<_, i64>(4)? as usize,
                    last_review: row.get::<_, Option<i64>>(5)?.map(datetime_from_column),
                    last_ranking: row.get::<_, Option<i64>>(6)?.map(datetime_from_column),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl UserAuthCredentialsStore for SqliteUserStore {
    fn get_password_credentials(&self, user_id: usize) -> Result<Option<PasswordCredentials>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT user_id, salt, hash, hasher, created FROM user_password_credentials WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, usize>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((user_id, salt, hash, hasher, created)) = row else {
            return Ok(None);
        };
        Ok(Some(PasswordCredentials {
            user_id,
            salt,
            hash,
            hasher: PasswordHasherKind::from_str(&hasher)?,
            created: system_time_from_column(created.unwrap_or(0)),
        }))
    }

    fn set_password_credentials(&self, credentials: &PasswordCredentials) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO user_password_credentials (user_id, salt, hash, hasher, created)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id) DO UPDATE SET
                salt = excluded.salt,
                hash = excluded.hash,
                hasher = excluded.hasher,
                created = excluded.created",
            params![
                credentials.user_id,
                credentials.salt,
                credentials.hash,
                credentials.hasher.to_string(),
                system_time_to_column(credentials.created),
            ],
        )
        .with_context(|| format!("Failed to store credentials of user {}", credentials.user_id))?;
        Ok(())
    }
}

impl UserAuthTokenStore for SqliteUserStore {
    fn add_auth_token(&self, token: &AuthToken) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO auth_token (user_id, value, created) VALUES (?1, ?2, ?3)",
            params![
                token.user_id,
                token.value.0,
                system_time_to_column(token.created)
            ],
        )?;
        Ok(())
    }

    fn get_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT user_id, value, created, last_used FROM auth_token WHERE value = ?1",
                params![value.0],
                |row| {
                    Ok(AuthToken {
                        user_id: row.get(0)?,
                        value: AuthTokenValue(row.get(1)?),
                        created: system_time_from_column(row.get::<_, Option<i64>>(2)?.unwrap_or(0)),
                        last_used: row.get::<_, Option<i64>>(3)?.map(system_time_from_column),
                    })
                },
            )
            .optional()?)
    }

    fn delete_auth_token(&self, value: &AuthTokenValue) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM auth_token WHERE value = ?1", params![value.0])?;
        Ok(deleted > 0)
    }

    fn update_auth_token_last_used(&self, value: &AuthTokenValue) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE auth_token SET last_used = ?2 WHERE value = ?1",
            params![value.0, Utc::now().timestamp()],
        )?;
        Ok(())
    }
}

impl ReviewStore for SqliteUserStore {
    fn upsert_review(
        &self,
        user_id: usize,
        song_code: i64,
        rating: u8,
        comments: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO review (user_id, song_code, rating, comments, review_date)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id, song_code) DO UPDATE SET
                rating = excluded.rating,
                comments = excluded.comments,
                review_date = excluded.review_date",
            params![user_id, song_code, rating, comments, Utc::now().timestamp()],
        )
        .with_context(|| format!("Failed to store review of song {}", song_code))?;
        Ok(())
    }

    fn get_review(&self, user_id: usize, song_code: i64) -> Result<Option<Review>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!("{} WHERE r.user_id = ?1 AND r.song_code = ?2", REVIEW_SELECT),
                params![user_id, song_code],
                review_from_row,
            )
            .optional()?
            .flatten())
    }

    fn get_song_reviews(&self, song_code: i64) -> Result<Vec<Review>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE r.song_code = ?1 ORDER BY r.review_date DESC, r.id DESC",
            REVIEW_SELECT
        ))?;
        let reviews = stmt
            .query_map(params![song_code], review_from_row)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .collect();
        Ok(reviews)
    }

    fn list_all_reviews(&self) -> Result<Vec<Review>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("{} ORDER BY r.id", REVIEW_SELECT))?;
        let reviews = stmt
            .query_map([], review_from_row)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .collect();
        Ok(reviews)
    }
}

impl RankingStore for SqliteUserStore {
    fn upsert_ranking(
        &self,
        user_id: usize,
        category_code: i64,
        rank_list: &[Placement],
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO ranking (user_id, category_code, ranking_date, rank_list)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, category_code) DO UPDATE SET
                ranking_date = excluded.ranking_date,
                rank_list = excluded.rank_list",
            params![
                user_id,
                category_code,
                Utc::now().timestamp(),
                encode_rank_list(rank_list)
            ],
        )
        .with_context(|| format!("Failed to store ranking of category {}", category_code))?;
        Ok(())
    }

    fn get_ranking(&self, user_id: usize, category_code: i64) -> Result<Option<Ranking>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!("{} WHERE user_id = ?1 AND category_code = ?2", RANKING_SELECT),
                params![user_id, category_code],
                ranking_from_row,
            )
            .optional()?)
    }

    fn list_all_rankings(&self) -> Result<Vec<Ranking>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("{} ORDER BY id", RANKING_SELECT))?;
        let rankings = stmt
            .query_map([], ranking_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rankings)
    }
}
