//! Account, membership and fitness data models
//!
//! Request payloads carry a `validate()` that reports every failing field at
//! once. JSON field names follow the web client (camelCase).

use crate::errors::{Result, ValidationErrors};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const INVALID_EMAIL: &str = "Please enter a valid email address";
const SHORT_PASSWORD: &str = "Password must be at least 6 characters";
const SHORT_USERNAME: &str = "Username must be at least 3 characters";

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
}

/// Whether `email` looks like an address
pub fn is_valid_email(email: &str) -> bool {
    email_regex().map_or(false, |re| re.is_match(email))
}

/// Membership tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipType {
    #[default]
    Free,
    Pro,
}

/// Stored user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub username: String,
    pub password: String,
    pub email: String,
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub firebase_uid: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub membership_type: MembershipType,
    pub membership_expiry: Option<DateTime<Utc>>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub fitbit_token: Option<String>,
    pub last_synced_fitness: Option<DateTime<Utc>>,
}

/// User as returned to clients: everything but the password
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeUser {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub firebase_uid: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub membership_type: MembershipType,
    pub membership_expiry: Option<DateTime<Utc>>,
}

impl From<User> for SafeUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            display_name: user.display_name,
            photo_url: user.photo_url,
            firebase_uid: user.firebase_uid,
            last_login: user.last_login,
            membership_type: user.membership_type,
            membership_expiry: user.membership_expiry,
        }
    }
}

/// Fields accepted when creating a user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertUser {
    pub username: String,
    pub password: String,
    pub email: String,
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub firebase_uid: Option<String>,
    #[serde(default)]
    pub membership_type: MembershipType,
    pub membership_expiry: Option<DateTime<Utc>>,
}

/// Partial user update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub firebase_uid: Option<String>,
}

impl UserPatch {
    pub fn apply(self, user: &mut User) {
        if let Some(username) = self.username {
            user.username = username;
        }
        if let Some(password) = self.password {
            user.password = password;
        }
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(display_name) = self.display_name {
            user.display_name = Some(display_name);
        }
        if let Some(photo_url) = self.photo_url {
            user.photo_url = Some(photo_url);
        }
        if let Some(firebase_uid) = self.firebase_uid {
            user.firebase_uid = Some(firebase_uid);
        }
    }
}

/// Sign-up form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        if self.username.chars().count() < 3 {
            errors.add("username", SHORT_USERNAME);
        }
        if !is_valid_email(&self.email) {
            errors.add("email", INVALID_EMAIL);
        }
        if self.password.chars().count() < 6 {
            errors.add("password", SHORT_PASSWORD);
        }
        if self.password != self.confirm_password {
            errors.add("confirmPassword", "Passwords don't match");
        }
        errors.into_result()
    }
}

/// Email/password sign-in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        if !is_valid_email(&self.email) {
            errors.add("email", INVALID_EMAIL);
        }
        if self.password.chars().count() < 6 {
            errors.add("password", SHORT_PASSWORD);
        }
        errors.into_result()
    }
}

/// Identity asserted by the federated identity provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirebaseUser {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

impl FirebaseUser {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        if self.uid.trim().is_empty() {
            errors.add("uid", "Required");
        }
        if let Some(email) = &self.email {
            if !is_valid_email(email) {
                errors.add("email", "Invalid email");
            }
        }
        errors.into_result()
    }
}

/// Billing period of the pro subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingPeriod {
    Monthly,
    Yearly,
}

/// Priced subscription option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPlan {
    pub plan_type: BillingPeriod,
    pub plan_price: f64,
}

/// Membership status shown to a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipInfo {
    pub membership_type: MembershipType,
    pub membership_expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub benefits: Vec<String>,
}

/// How often a goal is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

/// Workout plan difficulty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitnessGoal {
    pub id: u64,
    pub user_id: u64,
    pub title: String,

    /// cardio, strength, yoga, ...
    pub category: String,

    /// e.g. 10000 (steps) or 60 (minutes)
    pub target_value: f64,
    pub unit: String,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertFitnessGoal {
    pub user_id: u64,
    pub title: String,
    pub category: String,
    pub target_value: f64,
    pub unit: String,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_completed: bool,
}

impl InsertFitnessGoal {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        for (field, value) in [
            ("title", &self.title),
            ("category", &self.category),
            ("unit", &self.unit),
        ] {
            if value.trim().is_empty() {
                errors.add(field, "Required");
            }
        }
        if !self.target_value.is_finite() || self.target_value <= 0.0 {
            errors.add("targetValue", "Target must be a positive number");
        }
        if let Some(end) = self.end_date {
            if end < self.start_date {
                errors.add("endDate", "End date must not precede start date");
            }
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitnessGoalPatch {
    pub title: Option<String>,
    pub category: Option<String>,
    pub target_value: Option<f64>,
    pub unit: Option<String>,
    pub frequency: Option<Frequency>,
    pub end_date: Option<NaiveDate>,
    pub is_completed: Option<bool>,
}

impl FitnessGoalPatch {
    pub fn apply(self, goal: &mut FitnessGoal) {
        if let Some(title) = self.title {
            goal.title = title;
        }
        if let Some(category) = self.category {
            goal.category = category;
        }
        if let Some(target_value) = self.target_value {
            goal.target_value = target_value;
        }
        if let Some(unit) = self.unit {
            goal.unit = unit;
        }
        if let Some(frequency) = self.frequency {
            goal.frequency = frequency;
        }
        if let Some(end_date) = self.end_date {
            goal.end_date = Some(end_date);
        }
        if let Some(is_completed) = self.is_completed {
            goal.is_completed = is_completed;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitnessEntry {
    pub id: u64,
    pub user_id: u64,
    pub goal_id: Option<u64>,
    pub entry_date: NaiveDate,
    pub category: String,

    /// running, yoga, weight lifting, ...
    pub activity: String,

    /// Minutes
    pub duration: u32,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertFitnessEntry {
    pub user_id: u64,
    pub goal_id: Option<u64>,
    pub entry_date: NaiveDate,
    pub category: String,
    pub activity: String,
    pub duration: u32,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub notes: Option<String>,
}

impl InsertFitnessEntry {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        if self.category.trim().is_empty() {
            errors.add("category", "Required");
        }
        if self.activity.trim().is_empty() {
            errors.add("activity", "Required");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitnessEntryPatch {
    pub goal_id: Option<u64>,
    pub entry_date: Option<NaiveDate>,
    pub activity: Option<String>,
    pub duration: Option<u32>,
    pub value: Option<f64>,
    pub notes: Option<String>,
}

impl FitnessEntryPatch {
    pub fn apply(self, entry: &mut FitnessEntry) {
        if let Some(goal_id) = self.goal_id {
            entry.goal_id = Some(goal_id);
        }
        if let Some(entry_date) = self.entry_date {
            entry.entry_date = entry_date;
        }
        if let Some(activity) = self.activity {
            entry.activity = activity;
        }
        if let Some(duration) = self.duration {
            entry.duration = duration;
        }
        if let Some(value) = self.value {
            entry.value = Some(value);
        }
        if let Some(notes) = self.notes {
            entry.notes = Some(notes);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutPlan {
    pub id: u64,
    pub user_id: u64,
    pub title: String,
    pub description: Option<String>,
    pub category: String,

    /// Array of exercise objects, stored as given
    pub exercises: serde_json::Value,

    /// Minutes
    pub duration: u32,
    pub difficulty: Difficulty,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertWorkoutPlan {
    pub user_id: u64,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub exercises: serde_json::Value,
    pub duration: u32,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub is_public: bool,
}

impl InsertWorkoutPlan {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        if self.title.trim().is_empty() {
            errors.add("title", "Required");
        }
        if self.category.trim().is_empty() {
            errors.add("category", "Required");
        }
        if !self.exercises.is_array() {
            errors.add("exercises", "Exercises must be an array");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutPlanPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub exercises: Option<serde_json::Value>,
    pub duration: Option<u32>,
    pub difficulty: Option<Difficulty>,
    pub is_public: Option<bool>,
}

impl WorkoutPlanPatch {
    pub fn apply(self, plan: &mut WorkoutPlan) {
        if let Some(title) = self.title {
            plan.title = title;
        }
        if let Some(description) = self.description {
            plan.description = Some(description);
        }
        if let Some(category) = self.category {
            plan.category = category;
        }
        if let Some(exercises) = self.exercises {
            plan.exercises = exercises;
        }
        if let Some(duration) = self.duration {
            plan.duration = duration;
        }
        if let Some(difficulty) = self.difficulty {
            plan.difficulty = difficulty;
        }
        if let Some(is_public) = self.is_public {
            plan.is_public = is_public;
        }
    }
}
