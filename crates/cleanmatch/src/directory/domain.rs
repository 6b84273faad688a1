use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for directory users (clients and cleaners).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Client,
    Cleaner,
}

impl UserRole {
    pub const fn label(self) -> &'static str {
        match self {
            UserRole::Client => "client",
            UserRole::Cleaner => "cleaner",
        }
    }
}

pub const DEFAULT_AVATAR: &str = "👤";
pub const DEFAULT_RATING: f32 = 5.0;

/// Directory entry. Cleaner-only and client-only counters live side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: UserRole,
    #[serde(default = "default_avatar")]
    pub avatar: String,
    #[serde(default = "default_available")]
    pub is_available: bool,
    #[serde(default = "default_rating")]
    pub rating: f32,
    #[serde(default)]
    pub completed_jobs: u32,
    #[serde(default)]
    pub bookings: u32,
    #[serde(default = "Utc::now")]
    pub joined_at: DateTime<Utc>,
}

fn default_avatar() -> String {
    DEFAULT_AVATAR.to_string()
}

fn default_available() -> bool {
    true
}

fn default_rating() -> f32 {
    DEFAULT_RATING
}

impl UserProfile {
    pub fn new(
        id: UserId,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        role: UserRole,
    ) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            phone: None,
            role,
            avatar: default_avatar(),
            is_available: true,
            rating: DEFAULT_RATING,
            completed_jobs: 0,
            bookings: 0,
            joined_at: Utc::now(),
        }
    }

    pub fn is_cleaner(&self) -> bool {
        self.role == UserRole::Cleaner
    }

    /// Eligible to receive a direct invitation.
    pub fn is_available_cleaner(&self) -> bool {
        self.is_cleaner() && self.is_available
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            avatar: self.avatar.clone(),
            rating: self.rating,
            completed_jobs: self.completed_jobs,
        }
    }

    /// Trim names, lowercase the email and check the rating range.
    pub fn normalized(mut self) -> Result<Self, String> {
        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();
        self.email = self.email.trim().to_ascii_lowercase();

        if self.id.0.trim().is_empty() {
            return Err("user id is required".to_string());
        }
        if self.first_name.is_empty() || self.last_name.is_empty() {
            return Err("first and last name are required".to_string());
        }
        if !self.email.contains('@') {
            return Err(format!("'{}' is not a valid email", self.email));
        }
        if !(0.0..=5.0).contains(&self.rating) {
            return Err(format!("rating {} must be between 0 and 5", self.rating));
        }
        Ok(self)
    }
}

/// Expanded reference embedded in booking and invitation payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub avatar: String,
    pub rating: f32,
    pub completed_jobs: u32,
}

/// Self-service registration payload. Counters and rating start at their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: UserRole,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl Registration {
    pub fn into_profile(self, joined_at: DateTime<Utc>) -> UserProfile {
        let mut profile =
            UserProfile::new(self.id, self.first_name, self.last_name, self.email, self.role);
        profile.phone = self.phone;
        if let Some(avatar) = self.avatar.filter(|avatar| !avatar.trim().is_empty()) {
            profile.avatar = avatar;
        }
        profile.joined_at = joined_at;
        profile
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityUpdate {
    pub is_available: bool,
}
