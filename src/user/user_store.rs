use super::auth::{AuthToken, AuthTokenValue, PasswordCredentials};
use super::permissions::UserRole;
use super::user_models::{Placement, Ranking, Review, UserActivity};
use anyhow::Result;

pub trait UserStore: Send + Sync {
    /// Creates a new user and returns its id.
    fn create_user(&self, user_handle: &str, mail: &str, role: UserRole) -> Result<usize>;

    fn get_user_id(&self, user_handle: &str) -> Result<Option<usize>>;

    fn get_user_handle(&self, user_id: usize) -> Result<Option<String>>;

    fn is_mail_taken(&self, mail: &str) -> Result<bool>;

    fn get_user_role(&self, user_id: usize) -> Result<Option<UserRole>>;

    fn set_user_role(&self, user_id: usize, role: UserRole) -> Result<()>;

    /// Review and ranking counts of every user, ordered by handle.
    fn get_users_activity(&self) -> Result<Vec<UserActivity>>;
}

pub trait UserAuthCredentialsStore: Send + Sync {
    fn get_password_credentials(&self, user_id: usize) -> Result<Option<PasswordCredentials>>;

    /// Inserts or replaces the password credentials of a user.
    fn set_password_credentials(&self, credentials: &PasswordCredentials) -> Result<()>;
}

pub trait UserAuthTokenStore: Send + Sync {
    fn add_auth_token(&self, token: &AuthToken) -> Result<()>;

    fn get_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>>;

    /// Returns whether a token was deleted.
    fn delete_auth_token(&self, value: &AuthTokenValue) -> Result<bool>;

    fn update_auth_token_last_used(&self, value: &AuthTokenValue) -> Result<()>;
}

pub trait ReviewStore: Send + Sync {
    /// Creates or overwrites the review of `user_id` for `song_code`,
    /// refreshing its date.
    fn upsert_review(&self, user_id: usize, song_code: i64, rating: u8, comments: &str)
        -> Result<()>;

    fn get_review(&self, user_id: usize, song_code: i64) -> Result<Option<Review>>;

    /// Reviews of a song, newest first.
    fn get_song_reviews(&self, song_code: i64) -> Result<Vec<Review>>;

    fn list_all_reviews(&self) -> Result<Vec<Review>>;
}

pub trait RankingStore: Send + Sync {
    /// Creates or replaces the ranking of `user_id` for `category_code`.
    fn upsert_ranking(&self, user_id: usize, category_code: i64, rank_list: &[Placement])
        -> Result<()>;

    fn get_ranking(&self, user_id: usize, category_code: i64) -> Result<Option<Ranking>>;

    fn list_all_rankings(&self) -> Result<Vec<Ranking>>;
}

/// Everything the server needs from the user database.
pub trait FullUserStore:
    UserStore + UserAuthCredentialsStore + UserAuthTokenStore + ReviewStore + RankingStore
{
}

impl<T> FullUserStore for T where
    T: UserStore + UserAuthCredentialsStore + UserAuthTokenStore + ReviewStore + RankingStore
{
}
