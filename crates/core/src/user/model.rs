//! User model definitions

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user known to the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: Uuid,
    pub phone_number: String,
    pub stable_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub business_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// Create a record for a phone number seen for the first time
    pub fn new(phone_number: impl Into<String>, upsert: UserUpsert) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            phone_number: phone_number.into(),
            stable_id: upsert.stable_id,
            email: upsert.email,
            name: upsert.name,
            date_of_birth: None,
            business_type: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply fields from a fresh identity verification.
    /// Absent optional fields leave stored values untouched.
    pub fn apply_upsert(&mut self, upsert: UserUpsert) {
        self.stable_id = upsert.stable_id;
        if upsert.email.is_some() {
            self.email = upsert.email;
        }
        if upsert.name.is_some() {
            self.name = upsert.name;
        }
        self.updated_at = Utc::now();
    }

    pub fn apply_profile(&mut self, update: ProfileUpdate) {
        if update.name.is_some() {
            self.name = update.name;
        }
        if update.date_of_birth.is_some() {
            self.date_of_birth = update.date_of_birth;
        }
        if update.business_type.is_some() {
            self.business_type = update.business_type;
        }
        self.updated_at = Utc::now();
    }
}

/// Fields written on every successful identity verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserUpsert {
    pub stable_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// User-editable profile fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub business_type: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.date_of_birth.is_none() && self.business_type.is_none()
    }
}
