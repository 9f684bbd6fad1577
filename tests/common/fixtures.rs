//! Test fixture creation for catalog and user databases

use super::constants::*;
use anyhow::Result;
use songreviews_server::catalog_store::{CatalogStore, CategoryFields, Song, SqliteCatalogStore};
use songreviews_server::user::{
    PasswordCredentials, SqliteUserStore, UserAuthCredentialsStore, UserRole, UserStore,
};
use std::path::PathBuf;
use tempfile::TempDir;

fn song(code: i64, name: &str, artist: &str, categories: &[i64]) -> Song {
    Song {
        code,
        name: name.to_string(),
        artist: artist.to_string(),
        duration: 180 + code,
        artwork: format!("https://img.example.com/{}.jpg", code),
        release_date: "2001-01-01".to_string(),
        categories: categories.iter().copied().collect(),
    }
}

fn category(name: &str) -> CategoryFields {
    CategoryFields {
        name: name.to_string(),
        description: format!("All about {}", name),
        logo: format!("https://img.example.com/{}.png", name.to_lowercase()),
    }
}

/// Creates a temporary catalog with 2 categories and 5 songs.
/// Returns (temp_dir, catalog_db_path)
pub fn create_test_catalog() -> Result<(TempDir, PathBuf)> {
    let dir = TempDir::new()?;
    let catalog_db_path = dir.path().join("catalog.db");

    let store = SqliteCatalogStore::new(&catalog_db_path)?;

    let rock = store.create_category(&category(CATEGORY_ROCK_NAME))?;
    let jazz = store.create_category(&category(CATEGORY_JAZZ_NAME))?;
    assert_eq!(rock.code, CATEGORY_ROCK_CODE);
    assert_eq!(jazz.code, CATEGORY_JAZZ_CODE);

    let songs = [
        song(SONG_1_CODE, SONG_1_NAME, ARTIST_1_NAME, &[rock.code]),
        song(SONG_2_CODE, "Second Song", ARTIST_1_NAME, &[rock.code]),
        song(SONG_3_CODE, "Smooth Jazz", ARTIST_2_NAME, &[rock.code, jazz.code]),
        song(SONG_4_CODE, "Upbeat Jazz", ARTIST_2_NAME, &[jazz.code]),
        song(SONG_5_CODE, "Lonely Tune", "Solo Artist", &[]),
    ];
    for song in &songs {
        store.upsert_song(song)?;
    }

    Ok((dir, catalog_db_path))
}

/// Creates a temporary user database with two clients and one admin.
/// Returns (temp_dir, user_db_path)
pub fn create_test_db_with_users() -> Result<(TempDir, PathBuf)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("user.db");

    {
        let store = SqliteUserStore::new(&db_path)?;

        let user_id = create_user_with_password_and_role(
            &store,
            TEST_USER,
            TEST_PASS,
            UserRole::Client,
        )?;
        eprintln!("Created test user {} with id {}", TEST_USER, user_id);

        create_user_with_password_and_role(&store, OTHER_USER, OTHER_PASS, UserRole::Client)?;

        let admin_id =
            create_user_with_password_and_role(&store, ADMIN_USER, ADMIN_PASS, UserRole::Admin)?;
        eprintln!("Created admin user {} with id {}", ADMIN_USER, admin_id);
    }

    Ok((temp_dir, db_path))
}

/// Creates a user with the given credentials and role
pub fn create_user_with_password_and_role(
    store: &SqliteUserStore,
    handle: &str,
    password: &str,
    role: UserRole,
) -> Result<usize> {
    let user_id = store.create_user(handle, &format!("{}@example.com", handle), role)?;
    let credentials = PasswordCredentials::create(user_id, password)?;
    store.set_password_credentials(&credentials)?;
    Ok(user_id)
}
