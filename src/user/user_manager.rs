use super::auth::{AuthToken, AuthTokenValue, PasswordCredentials};
use super::permissions::{Permission, UserRole};
use super::user_models::{Placement, Review, SavedTiers, Tier, TierSubmission, UserActivity};
use super::user_store::FullUserStore;
use crate::catalog_store::{CatalogStore, Category, Song};
use crate::stats::round_to;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

const MIN_PASSWORD_LENGTH: usize = 8;
const MIN_RATING: i64 = 1;
const MAX_RATING: i64 = 5;

/// Failures of user-submitted content, distinguished so the HTTP layer can
/// map them to status codes.
#[derive(Debug, thiserror::Error)]
pub enum UserContentError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type UserContentResult<T> = std::result::Result<T, UserContentError>;

/// A song with its reviews, as shown on the song page.
#[derive(Debug, Serialize)]
pub struct SongDetail {
    pub song: Song,
    pub reviews: Vec<Review>,
    pub avg_rating: Option<f64>,
    pub my_review: Option<Review>,
}

/// What a user needs to build a tier list for one category.
#[derive(Debug, Serialize)]
pub struct RankingPage {
    pub category: Category,
    pub songs: Vec<Song>,
    pub tiers: [&'static str; 5],
    pub saved_tiers: Option<SavedTiers>,
}

pub struct UserManager {
    catalog_store: Arc<dyn CatalogStore>,
    user_store: Arc<dyn FullUserStore>,
}

impl UserManager {
    pub fn new(catalog_store: Arc<dyn CatalogStore>, user_store: Arc<dyn FullUserStore>) -> Self {
        Self {
            catalog_store,
            user_store,
        }
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    pub fn add_user(&self, user_handle: &str, mail: &str, role: UserRole) -> Result<usize> {
        if user_handle.is_empty() {
            bail!("The user handle cannot be empty.");
        }
        if self.user_store.get_user_id(user_handle)?.is_some() {
            bail!("User handle {} already exists.", user_handle);
        }
        if self.user_store.is_mail_taken(mail)? {
            bail!("Mail {} is already registered.", mail);
        }
        let user_id = self.user_store.create_user(user_handle, mail, role)?;
        info!("Created user {} ({}) with id {}", user_handle, role.as_str(), user_id);
        Ok(user_id)
    }

    pub fn set_password(&self, user_id: usize, password: &str) -> Result<()> {
        let credentials = PasswordCredentials::create(user_id, password)?;
        self.user_store.set_password_credentials(&credentials)
    }

    /// Self-service signup. New accounts are always clients.
    pub fn register(
        &self,
        user_handle: &str,
        mail: &str,
        password: &str,
    ) -> UserContentResult<usize> {
        let user_handle = user_handle.trim();
        let mail = mail.trim();
        if user_handle.is_empty() || mail.is_empty() {
            return Err(UserContentError::Validation(
                "User handle and mail are required.".to_string(),
            ));
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(UserContentError::Validation(format!(
                "Password must be at least {} characters long.",
                MIN_PASSWORD_LENGTH
            )));
        }
        if self.user_store.get_user_id(user_handle)?.is_some() {
            return Err(UserContentError::Validation(format!(
                "User handle {} is taken.",
                user_handle
            )));
        }
        if self.user_store.is_mail_taken(mail)? {
            return Err(UserContentError::Validation(format!(
                "Mail {} is already registered.",
                mail
            )));
        }

        let user_id = self.add_user(user_handle, mail, UserRole::Client)?;
        self.set_password(user_id, password)?;
        Ok(user_id)
    }

    /// Checks the password of `user_handle`, returning a fresh token on success
    /// and `Ok(None)` on unknown user or wrong password.
    pub fn login(&self, user_handle: &str, password: &str) -> Result<Option<AuthToken>> {
        let Some(user_id) = self.user_store.get_user_id(user_handle)? else {
            debug!("Login for unknown user {}", user_handle);
            return Ok(None);
        };
        let Some(credentials) = self.user_store.get_password_credentials(user_id)? else {
            debug!("User {} has no password credentials", user_handle);
            return Ok(None);
        };
        if !credentials.matches(password)? {
            return Ok(None);
        }
        self.generate_auth_token(user_id).map(Some)
    }

    pub fn generate_auth_token(&self, user_id: usize) -> Result<AuthToken> {
        let token = AuthToken {
            user_id,
            value: AuthTokenValue::generate(),
            created: SystemTime::now(),
            last_used: None,
        };
        self.user_store.add_auth_token(&token)?;
        Ok(token)
    }

    pub fn get_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        self.user_store.get_auth_token(value)
    }

    pub fn update_auth_token_last_used(&self, value: &AuthTokenValue) -> Result<()> {
        self.user_store.update_auth_token_last_used(value)
    }

    /// Deletes a token, refusing to touch tokens owned by other users.
    pub fn delete_auth_token(&self, user_id: usize, value: &AuthTokenValue) -> Result<()> {
        let token = self
            .user_store
            .get_auth_token(value)?
            .with_context(|| format!("Did not find auth token {}", value.0))?;
        if token.user_id != user_id {
            bail!(
                "User {} tried to delete auth token owned by user {}",
                user_id,
                token.user_id
            );
        }
        self.user_store.delete_auth_token(value)?;
        Ok(())
    }

    pub fn get_user_permissions(&self, user_id: usize) -> Result<Vec<Permission>> {
        let role = self
            .user_store
            .get_user_role(user_id)?
            .with_context(|| format!("User {} not found", user_id))?;
        Ok(role.permissions().to_vec())
    }

    pub fn get_user_handle(&self, user_id: usize) -> Result<Option<String>> {
        self.user_store.get_user_handle(user_id)
    }

    pub fn get_users_activity(&self) -> Result<Vec<UserActivity>> {
        self.user_store.get_users_activity()
    }

    // =========================================================================
    // Reviews
    // =========================================================================

    pub fn get_song_detail(&self, user_id: usize, song_code: i64) -> UserContentResult<SongDetail> {
        let song = self
            .catalog_store
            .get_song(song_code)?
            .ok_or_else(|| UserContentError::NotFound(format!("Song {}", song_code)))?;
        let reviews = self.user_store.get_song_reviews(song_code)?;
        let avg_rating = if reviews.is_empty() {
            None
        } else {
            let total: i64 = reviews.iter().map(|r| r.rating as i64).sum();
            Some(round_to(total as f64 / reviews.len() as f64, 2))
        };
        let my_review = self.user_store.get_review(user_id, song_code)?;

        Ok(SongDetail {
            song,
            reviews,
            avg_rating,
            my_review,
        })
    }

    /// Creates or overwrites the review of `user_id` for a song.
    pub fn submit_review(
        &self,
        user_id: usize,
        song_code: i64,
        rating: i64,
        comments: &str,
    ) -> UserContentResult<Review> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(UserContentError::Validation(format!(
                "Rating must be between {} and {}.",
                MIN_RATING, MAX_RATING
            )));
        }
        let comments = comments.trim();
        if comments.is_empty() {
            return Err(UserContentError::Validation(
                "Comments cannot be empty.".to_string(),
            ));
        }
        if self.catalog_store.get_song(song_code)?.is_none() {
            return Err(UserContentError::NotFound(format!("Song {}", song_code)));
        }

        self.user_store
            .upsert_review(user_id, song_code, rating as u8, comments)?;
        self.user_store
            .get_review(user_id, song_code)?
            .context("Review missing right after upsert")
            .map_err(UserContentError::from)
    }

    // =========================================================================
    // Rankings
    // =========================================================================

    pub fn get_ranking_page(
        &self,
        user_id: usize,
        category_code: i64,
    ) -> UserContentResult<RankingPage> {
        let category = self.find_category(category_code)?;
        let songs = self.catalog_store.get_songs_in_category(category_code)?;
        let saved_tiers = self
            .user_store
            .get_ranking(user_id, category_code)?
            .map(|ranking| SavedTiers::from_rank_list(&ranking.rank_list));

        Ok(RankingPage {
            category,
            songs,
            tiers: Tier::ALL.map(Tier::as_str),
            saved_tiers,
        })
    }

    /// Replaces the tier list of `user_id` for a category.
    ///
    /// Every submitted song must currently belong to the category and appear
    /// once. Placements are stored in tier order, keeping submission order
    /// within each tier.
    pub fn save_tier_list(
        &self,
        user_id: usize,
        category_code: i64,
        submission: &TierSubmission,
    ) -> UserContentResult<SavedTiers> {
        self.find_category(category_code)?;
        let rank_list = build_rank_list(submission)?;

        let members: HashSet<i64> = self
            .catalog_store
            .get_songs_in_category(category_code)?
            .iter()
            .map(|song| song.code)
            .collect();
        if let Some(outsider) = rank_list.iter().find(|p| !members.contains(&p.song)) {
            return Err(UserContentError::Validation(format!(
                "Song {} does not belong to category {}.",
                outsider.song, category_code
            )));
        }

        self.user_store
            .upsert_ranking(user_id, category_code, &rank_list)?;
        debug!(
            "User {} ranked {} songs of category {}",
            user_id,
            rank_list.len(),
            category_code
        );
        Ok(SavedTiers::from_rank_list(&rank_list))
    }

    fn find_category(&self, category_code: i64) -> UserContentResult<Category> {
        self.catalog_store
            .get_category(category_code)?
            .ok_or_else(|| UserContentError::NotFound(format!("Category {}", category_code)))
    }
}

fn build_rank_list(submission: &TierSubmission) -> UserContentResult<Vec<Placement>> {
    if let Some(unknown) = submission.keys().find(|name| Tier::from_name(name).is_none()) {
        return Err(UserContentError::Validation(format!(
            "Unknown tier {}.",
            unknown
        )));
    }

    let mut seen = HashSet::new();
    let mut rank_list = Vec::new();
    for tier in Tier::ALL {
        let Some(songs) = submission.get(tier.as_str()) else {
            continue;
        };
        for &song in songs {
            if !seen.insert(song) {
                return Err(UserContentError::Validation(format!(
                    "Song {} is placed more than once.",
                    song
                )));
            }
            rank_list.push(Placement::new(song, tier));
        }
    }

    if rank_list.is_empty() {
        return Err(UserContentError::Validation(
            "The tier list is empty.".to_string(),
        ));
    }
    Ok(rank_list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::{CategoryFields, SqliteCatalogStore};
    use crate::user::SqliteUserStore;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    struct Fixture {
        manager: UserManager,
        catalog: Arc<SqliteCatalogStore>,
        alice: usize,
        _dir: TempDir,
    }

    fn song(code: i64, categories: &[i64]) -> Song {
        Song {
            code,
            name: format!("Song {}", code),
            artist: "Artist".to_string(),
            duration: 180,
            artwork: String::new(),
            release_date: "2020".to_string(),
            categories: categories.iter().copied().collect::<BTreeSet<_>>(),
        }
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let catalog = Arc::new(SqliteCatalogStore::new(dir.path().join("catalog.db")).unwrap());
        let users = Arc::new(SqliteUserStore::new(dir.path().join("user.db")).unwrap());

        let category = catalog
            .create_category(&CategoryFields {
                name: "Rock".to_string(),
                description: "Loud".to_string(),
                logo: "rock.png".to_string(),
            })
            .unwrap();
        for code in [10, 11, 12] {
            catalog.upsert_song(&song(code, &[category.code])).unwrap();
        }
        catalog.upsert_song(&song(20, &[])).unwrap();

        let manager = UserManager::new(catalog.clone(), users);
        let alice = manager
            .add_user("alice", "alice@example.com", UserRole::Client)
            .unwrap();
        Fixture {
            manager,
            catalog,
            alice,
            _dir: dir,
        }
    }

    fn submission(entries: &[(&str, &[i64])]) -> TierSubmission {
        entries
            .iter()
            .map(|(tier, songs)| (tier.to_string(), songs.to_vec()))
            .collect()
    }

    #[test]
    fn login_checks_password() {
        let f = fixture();
        f.manager.set_password(f.alice, "secret-pass").unwrap();

        assert!(f.manager.login("alice", "wrong-pass").unwrap().is_none());
        assert!(f.manager.login("nobody", "secret-pass").unwrap().is_none());

        let token = f.manager.login("alice", "secret-pass").unwrap().unwrap();
        assert_eq!(token.user_id, f.alice);
        assert!(f.manager.get_auth_token(&token.value).unwrap().is_some());

        f.manager.delete_auth_token(f.alice, &token.value).unwrap();
        assert!(f.manager.get_auth_token(&token.value).unwrap().is_none());
    }

    #[test]
    fn cannot_delete_someone_elses_token() {
        let f = fixture();
        let bob = f
            .manager
            .add_user("bob", "bob@example.com", UserRole::Client)
            .unwrap();
        let token = f.manager.generate_auth_token(bob).unwrap();

        assert!(f.manager.delete_auth_token(f.alice, &token.value).is_err());
        assert!(f.manager.get_auth_token(&token.value).unwrap().is_some());
    }

    #[test]
    fn register_validates_input() {
        let f = fixture();
        assert!(matches!(
            f.manager.register("carol", "carol@example.com", "short"),
            Err(UserContentError::Validation(_))
        ));
        assert!(matches!(
            f.manager.register("alice", "other@example.com", "long enough"),
            Err(UserContentError::Validation(_))
        ));
        assert!(matches!(
            f.manager.register("carol", "alice@example.com", "long enough"),
            Err(UserContentError::Validation(_))
        ));

        let carol = f
            .manager
            .register(" carol ", "carol@example.com", "long enough")
            .unwrap();
        assert_eq!(
            f.manager.get_user_permissions(carol).unwrap(),
            UserRole::Client.permissions().to_vec()
        );
        assert!(f.manager.login("carol", "long enough").unwrap().is_some());
    }

    #[test]
    fn review_validation() {
        let f = fixture();
        for rating in [0, 6, -1] {
            assert!(matches!(
                f.manager.submit_review(f.alice, 10, rating, "ok"),
                Err(UserContentError::Validation(_))
            ));
        }
        assert!(matches!(
            f.manager.submit_review(f.alice, 10, 3, "   "),
            Err(UserContentError::Validation(_))
        ));
        assert!(matches!(
            f.manager.submit_review(f.alice, 999, 3, "ok"),
            Err(UserContentError::NotFound(_))
        ));
    }

    #[test]
    fn resubmitted_review_overwrites() {
        let f = fixture();
        f.manager.submit_review(f.alice, 10, 3, "fine").unwrap();
        let review = f.manager.submit_review(f.alice, 10, 5, " great ").unwrap();
        assert_eq!(review.rating, 5);
        assert_eq!(review.comments, "great");

        let detail = f.manager.get_song_detail(f.alice, 10).unwrap();
        assert_eq!(detail.reviews.len(), 1);
        assert_eq!(detail.avg_rating, Some(5.0));
        assert_eq!(detail.my_review.unwrap().rating, 5);
    }

    #[test]
    fn song_detail_averages_ratings() {
        let f = fixture();
        let bob = f
            .manager
            .add_user("bob", "bob@example.com", UserRole::Client)
            .unwrap();
        let carol = f
            .manager
            .add_user("carol", "carol@example.com", UserRole::Client)
            .unwrap();
        f.manager.submit_review(f.alice, 11, 5, "a").unwrap();
        f.manager.submit_review(bob, 11, 4, "b").unwrap();
        f.manager.submit_review(carol, 11, 4, "c").unwrap();

        let detail = f.manager.get_song_detail(bob, 11).unwrap();
        assert_eq!(detail.avg_rating, Some(4.33));
        assert_eq!(detail.my_review.unwrap().user_handle, "bob");

        let empty = f.manager.get_song_detail(bob, 12).unwrap();
        assert_eq!(empty.avg_rating, None);
        assert!(empty.my_review.is_none());
    }

    #[test]
    fn tier_list_round_trip() {
        let f = fixture();
        let category = f.catalog.list_categories().unwrap()[0].code;

        let saved = f
            .manager
            .save_tier_list(f.alice, category, &submission(&[("S", &[10, 11]), ("A", &[12])]))
            .unwrap();
        assert_eq!(saved.s, vec![10, 11]);

        let page = f.manager.get_ranking_page(f.alice, category).unwrap();
        assert_eq!(page.tiers, ["S", "A", "B", "C", "D"]);
        assert_eq!(page.songs.len(), 3);
        assert_eq!(
            page.saved_tiers.unwrap(),
            SavedTiers {
                s: vec![10, 11],
                a: vec![12],
                ..SavedTiers::default()
            }
        );
    }

    #[test]
    fn tier_list_rejections() {
        let f = fixture();
        let category = f.catalog.list_categories().unwrap()[0].code;
        let rejected = |sub: TierSubmission| {
            matches!(
                f.manager.save_tier_list(f.alice, category, &sub),
                Err(UserContentError::Validation(_))
            )
        };

        assert!(rejected(submission(&[])));
        assert!(rejected(submission(&[("S", &[]), ("A", &[])])));
        assert!(rejected(submission(&[("F", &[10])])));
        assert!(rejected(submission(&[("S", &[10]), ("B", &[10])])));
        assert!(rejected(submission(&[("S", &[20])])));
        assert!(matches!(
            f.manager
                .save_tier_list(f.alice, 99, &submission(&[("S", &[10])])),
            Err(UserContentError::NotFound(_))
        ));
        assert!(f
            .manager
            .get_ranking_page(f.alice, category)
            .unwrap()
            .saved_tiers
            .is_none());
    }

    #[test]
    fn placements_follow_tier_order() {
        let rank_list =
            build_rank_list(&submission(&[("C", &[12]), ("S", &[11, 10]), ("A", &[])])).unwrap();
        assert_eq!(
            rank_list,
            vec![
                Placement::new(11, Tier::S),
                Placement::new(10, Tier::S),
                Placement::new(12, Tier::C),
            ]
        );
    }
}
