pub mod auth;
pub mod permissions;
pub mod rank_list;
mod sqlite_user_store;
mod user_manager;
pub mod user_models;
mod user_store;

pub use auth::{AuthToken, AuthTokenValue, PasswordCredentials};
pub use permissions::{Permission, UserRole};
pub use sqlite_user_store::{SqliteUserStore, USER_VERSIONED_SCHEMAS};
pub use user_manager::{RankingPage, SongDetail, UserContentError, UserManager};
pub use user_models::{Placement, Ranking, Review, SavedTiers, Tier, TierSubmission, UserActivity};
pub use user_store::{
    FullUserStore, RankingStore, ReviewStore, UserAuthCredentialsStore, UserAuthTokenStore,
    UserStore,
};
