use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    AccessCatalog,
    WriteReviews,
    RankSongs,
    ViewStats,
    EditCatalog,
    ImportCatalog,
    ViewUserActivity,
}

const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::AccessCatalog,
    Permission::WriteReviews,
    Permission::RankSongs,
    Permission::ViewStats,
    Permission::EditCatalog,
    Permission::ImportCatalog,
    Permission::ViewUserActivity,
];
const CLIENT_PERMISSIONS: &[Permission] = &[
    Permission::AccessCatalog,
    Permission::WriteReviews,
    Permission::RankSongs,
    Permission::ViewStats,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UserRole {
    Admin,
    Client,
}

impl UserRole {
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            UserRole::Admin => ADMIN_PERMISSIONS,
            UserRole::Client => CLIENT_PERMISSIONS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Admin => "Admin",
            UserRole::Client => "Client",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(UserRole::Admin),
            "client" => Some(UserRole::Client),
            _ => None,
        }
    }
}
