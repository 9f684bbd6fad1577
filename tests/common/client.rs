//! HTTP client for end-to-end tests
//!
//! Wraps reqwest and provides one method per server endpoint.
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP test client with cookie-based session management
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    /// Creates a new unauthenticated client
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// Creates a client logged in with the given credentials
    ///
    /// # Panics
    ///
    /// Panics if authentication fails (indicates test infrastructure problem).
    pub async fn authenticated_as(base_url: String, handle: &str, password: &str) -> Self {
        let client = Self::new(base_url);

        let response = client.login(handle, password).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Authentication of {} failed: {:?}",
            handle,
            response.text().await
        );

        client
    }

    /// Creates a client pre-authenticated as a regular user
    pub async fn authenticated(base_url: String) -> Self {
        Self::authenticated_as(base_url, TEST_USER, TEST_PASS).await
    }

    /// Creates a client pre-authenticated as an admin user
    pub async fn authenticated_admin(base_url: String) -> Self {
        Self::authenticated_as(base_url, ADMIN_USER, ADMIN_PASS).await
    }

    // ========================================================================
    // Authentication Endpoints
    // ========================================================================

    /// POST /v1/auth/login
    pub async fn login(&self, handle: &str, password: &str) -> Response {
        self.client
            .post(format!("{}/v1/auth/login", self.base_url))
            .json(&json!({
                "user_handle": handle,
                "password": password,
            }))
            .send()
            .await
            .expect("Login request failed")
    }

    /// GET /v1/auth/logout
    pub async fn logout(&self) -> Response {
        self.client
            .get(format!("{}/v1/auth/logout", self.base_url))
            .send()
            .await
            .expect("Logout request failed")
    }

    /// POST /v1/auth/register
    pub async fn register(&self, handle: &str, mail: &str, password: &str) -> Response {
        self.client
            .post(format!("{}/v1/auth/register", self.base_url))
            .json(&json!({
                "user_handle": handle,
                "mail": mail,
                "password": password,
            }))
            .send()
            .await
            .expect("Register request failed")
    }

    /// GET /
    pub async fn home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Home request failed")
    }

    // ========================================================================
    // Catalog Endpoints
    // ========================================================================

    /// GET /v1/songs
    pub async fn list_songs(&self, query: Option<&str>) -> Response {
        let mut request = self.client.get(format!("{}/v1/songs", self.base_url));
        if let Some(q) = query {
            request = request.query(&[("q", q)]);
        }
        request.send().await.expect("List songs request failed")
    }

    /// GET /v1/songs/{code}
    pub async fn get_song(&self, code: i64) -> Response {
        self.client
            .get(format!("{}/v1/songs/{}", self.base_url, code))
            .send()
            .await
            .expect("Get song request failed")
    }

    /// GET /v1/categories
    pub async fn list_categories(&self) -> Response {
        self.client
            .get(format!("{}/v1/categories", self.base_url))
            .send()
            .await
            .expect("List categories request failed")
    }

    // ========================================================================
    // Reviews and Rankings
    // ========================================================================

    /// PUT /v1/songs/{code}/review
    pub async fn put_review(&self, code: i64, rating: i64, comments: &str) -> Response {
        self.client
            .put(format!("{}/v1/songs/{}/review", self.base_url, code))
            .json(&json!({
                "rating": rating,
                "comments": comments,
            }))
            .send()
            .await
            .expect("Put review request failed")
    }

    /// GET /v1/ranking/{category_code}
    pub async fn get_ranking(&self, category_code: i64) -> Response {
        self.client
            .get(format!("{}/v1/ranking/{}", self.base_url, category_code))
            .send()
            .await
            .expect("Get ranking request failed")
    }

    /// PUT /v1/ranking/{category_code}, `tiers` being `{"S": [codes], ...}`
    pub async fn put_ranking(&self, category_code: i64, tiers: Value) -> Response {
        self.client
            .put(format!("{}/v1/ranking/{}", self.base_url, category_code))
            .json(&json!({ "tiers": tiers }))
            .send()
            .await
            .expect("Put ranking request failed")
    }

    // ========================================================================
    // Admin Endpoints
    // ========================================================================

    /// POST /v1/admin/categories
    pub async fn create_category(&self, name: &str, description: &str, logo: &str) -> Response {
        self.client
            .post(format!("{}/v1/admin/categories", self.base_url))
            .json(&json!({
                "name": name,
                "description": description,
                "logo": logo,
            }))
            .send()
            .await
            .expect("Create category request failed")
    }

    /// PUT /v1/admin/categories/{code}
    pub async fn update_category(
        &self,
        code: i64,
        name: &str,
        description: &str,
        logo: &str,
    ) -> Response {
        self.client
            .put(format!("{}/v1/admin/categories/{}", self.base_url, code))
            .json(&json!({
                "name": name,
                "description": description,
                "logo": logo,
            }))
            .send()
            .await
            .expect("Update category request failed")
    }

    /// DELETE /v1/admin/categories/{code}
    pub async fn delete_category(&self, code: i64) -> Response {
        self.client
            .delete(format!("{}/v1/admin/categories/{}", self.base_url, code))
            .send()
            .await
            .expect("Delete category request failed")
    }

    /// GET /v1/admin/categories/{code}/songs
    pub async fn get_category_songs(&self, code: i64) -> Response {
        self.client
            .get(format!("{}/v1/admin/categories/{}/songs", self.base_url, code))
            .send()
            .await
            .expect("Get category songs request failed")
    }

    /// POST /v1/admin/categories/assign
    pub async fn assign_categories(&self, song_codes: &[i64], category_codes: &[i64]) -> Response {
        self.client
            .post(format!("{}/v1/admin/categories/assign", self.base_url))
            .json(&json!({
                "song_codes": song_codes,
                "category_codes": category_codes,
            }))
            .send()
            .await
            .expect("Assign categories request failed")
    }

    /// POST /v1/admin/categories/{code}/remove
    pub async fn remove_from_category(&self, code: i64, song_codes: &[i64]) -> Response {
        self.client
            .post(format!(
                "{}/v1/admin/categories/{}/remove",
                self.base_url, code
            ))
            .json(&json!({ "song_codes": song_codes }))
            .send()
            .await
            .expect("Remove from category request failed")
    }

    /// POST /v1/admin/import with a CSV body
    pub async fn import_csv(&self, csv: &str) -> Response {
        self.client
            .post(format!("{}/v1/admin/import", self.base_url))
            .header("content-type", "text/csv")
            .body(csv.to_string())
            .send()
            .await
            .expect("Import request failed")
    }

    /// GET /v1/admin/users
    pub async fn list_users(&self) -> Response {
        self.client
            .get(format!("{}/v1/admin/users", self.base_url))
            .send()
            .await
            .expect("List users request failed")
    }

    // ========================================================================
    // Stats
    // ========================================================================

    /// GET /v1/stats/global
    pub async fn get_global_stats(&self) -> Response {
        self.client
            .get(format!("{}/v1/stats/global", self.base_url))
            .send()
            .await
            .expect("Global stats request failed")
    }
}
