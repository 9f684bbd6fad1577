//! Shared constants for end-to-end tests
//!
//! When test data changes (user credentials, catalog codes, etc.),
//! update only this file.

// ============================================================================
// Test User Credentials
// ============================================================================

/// Regular test user handle
pub const TEST_USER: &str = "testuser";

/// Regular test user password
pub const TEST_PASS: &str = "testpass123";

/// Second regular user, used where stats need more than one voter
pub const OTHER_USER: &str = "otheruser";

pub const OTHER_PASS: &str = "otherpass123";

/// Admin test user handle
pub const ADMIN_USER: &str = "admin";

/// Admin test user password
pub const ADMIN_PASS: &str = "adminpass123";

// ============================================================================
// Test Catalog Codes
// ============================================================================

/// Category "Rock", holds songs 1, 2 and 3
pub const CATEGORY_ROCK_CODE: i64 = 1;

/// Category "Jazz", holds songs 3 and 4
pub const CATEGORY_JAZZ_CODE: i64 = 2;

pub const CATEGORY_ROCK_NAME: &str = "Rock";

pub const CATEGORY_JAZZ_NAME: &str = "Jazz";

/// "Opening Song" by The Test Band
pub const SONG_1_CODE: i64 = 1;

/// "Second Song" by The Test Band
pub const SONG_2_CODE: i64 = 2;

/// "Smooth Jazz" by Jazz Ensemble, in both categories
pub const SONG_3_CODE: i64 = 3;

/// "Upbeat Jazz" by Jazz Ensemble
pub const SONG_4_CODE: i64 = 4;

/// "Lonely Tune" by Solo Artist, in no category
pub const SONG_5_CODE: i64 = 5;

pub const SONG_1_NAME: &str = "Opening Song";

pub const ARTIST_1_NAME: &str = "The Test Band";

pub const ARTIST_2_NAME: &str = "Jazz Ensemble";

/// Number of songs in the fixture catalog
pub const SONGS_COUNT: usize = 5;

/// A code no fixture song or category uses
pub const UNKNOWN_CODE: i64 = 999;

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;
