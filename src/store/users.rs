//! User, fitness goal, fitness entry and workout plan storage

use crate::accounts::schema::{
    FitnessEntry, FitnessEntryPatch, FitnessGoal, FitnessGoalPatch, InsertFitnessEntry,
    InsertFitnessGoal, InsertUser, InsertWorkoutPlan, MembershipType, User, UserPatch,
    WorkoutPlan, WorkoutPlanPatch,
};
use crate::errors::{BakeError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Optional narrowing of a fitness entry listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryFilter {
    pub goal_id: Option<u64>,

    /// Inclusive
    pub start_date: Option<NaiveDate>,

    /// Inclusive
    pub end_date: Option<NaiveDate>,
}

impl EntryFilter {
    pub fn matches(&self, entry: &FitnessEntry) -> bool {
        self.goal_id.map_or(true, |goal| entry.goal_id == Some(goal))
            && self.start_date.map_or(true, |start| entry.entry_date >= start)
            && self.end_date.map_or(true, |end| entry.entry_date <= end)
    }
}

/// Storage behind the account and fitness backend
///
/// Lookups return `Ok(None)` for missing rows; updates of a missing row
/// return `Ok(None)` and deletes return `Ok(false)`.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, id: u64) -> Result<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn get_user_by_firebase_uid(&self, uid: &str) -> Result<Option<User>>;

    /// Fails with `Conflict` when the username or email is taken
    async fn create_user(&self, user: InsertUser) -> Result<User>;
    async fn update_user(&self, id: u64, patch: UserPatch) -> Result<Option<User>>;
    async fn update_last_login(&self, id: u64) -> Result<Option<User>>;
    async fn update_user_membership(
        &self,
        id: u64,
        membership: MembershipType,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<Option<User>>;
    async fn update_stripe_info(
        &self,
        id: u64,
        customer_id: &str,
        subscription_id: &str,
    ) -> Result<Option<User>>;

    async fn get_fitness_goals(&self, user_id: u64) -> Result<Vec<FitnessGoal>>;
    async fn get_fitness_goal(&self, id: u64) -> Result<Option<FitnessGoal>>;
    async fn create_fitness_goal(&self, goal: InsertFitnessGoal) -> Result<FitnessGoal>;
    async fn update_fitness_goal(
        &self,
        id: u64,
        patch: FitnessGoalPatch,
    ) -> Result<Option<FitnessGoal>>;
    async fn delete_fitness_goal(&self, id: u64) -> Result<bool>;

    /// Entries of one user, newest entry date first
    async fn get_fitness_entries(
        &self,
        user_id: u64,
        filter: EntryFilter,
    ) -> Result<Vec<FitnessEntry>>;
    async fn create_fitness_entry(&self, entry: InsertFitnessEntry) -> Result<FitnessEntry>;
    async fn update_fitness_entry(
        &self,
        id: u64,
        patch: FitnessEntryPatch,
    ) -> Result<Option<FitnessEntry>>;
    async fn delete_fitness_entry(&self, id: u64) -> Result<bool>;

    async fn get_workout_plans(&self, user_id: u64) -> Result<Vec<WorkoutPlan>>;
    async fn get_public_workout_plans(&self) -> Result<Vec<WorkoutPlan>>;
    async fn get_workout_plan(&self, id: u64) -> Result<Option<WorkoutPlan>>;
    async fn create_workout_plan(&self, plan: InsertWorkoutPlan) -> Result<WorkoutPlan>;
    async fn update_workout_plan(
        &self,
        id: u64,
        patch: WorkoutPlanPatch,
    ) -> Result<Option<WorkoutPlan>>;
    async fn delete_workout_plan(&self, id: u64) -> Result<bool>;
}

struct UserTables {
    users: BTreeMap<u64, User>,
    goals: BTreeMap<u64, FitnessGoal>,
    entries: BTreeMap<u64, FitnessEntry>,
    plans: BTreeMap<u64, WorkoutPlan>,
    next_user_id: u64,
    next_goal_id: u64,
    next_entry_id: u64,
    next_plan_id: u64,
}

impl Default for UserTables {
    fn default() -> Self {
        Self {
            users: BTreeMap::new(),
            goals: BTreeMap::new(),
            entries: BTreeMap::new(),
            plans: BTreeMap::new(),
            next_user_id: 1,
            next_goal_id: 1,
            next_entry_id: 1,
            next_plan_id: 1,
        }
    }
}

fn next_id(counter: &mut u64) -> u64 {
    let id = *counter;
    *counter += 1;
    id
}

/// In-memory `UserStore`; ids are sequential from 1 per table
#[derive(Default)]
pub struct MemoryUserStore {
    tables: RwLock<UserTables>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn modify_user<F>(&self, id: u64, f: F) -> Result<Option<User>>
    where
        F: FnOnce(&mut User) + Send,
    {
        let mut tables = self.tables.write().await;
        Ok(tables.users.get_mut(&id).map(|user| {
            f(user);
            user.clone()
        }))
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_user(&self, id: u64) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn get_user_by_firebase_uid(&self, uid: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.firebase_uid.as_deref() == Some(uid))
            .cloned())
    }

    async fn create_user(&self, user: InsertUser) -> Result<User> {
        let mut tables = self.tables.write().await;

        if tables.users.values().any(|u| u.username == user.username) {
            return Err(BakeError::Conflict("Username already exists".to_string()));
        }
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(BakeError::Conflict("Email already exists".to_string()));
        }

        let id = next_id(&mut tables.next_user_id);
        let created = User {
            id,
            username: user.username,
            password: user.password,
            email: user.email,
            display_name: user.display_name,
            photo_url: user.photo_url,
            firebase_uid: user.firebase_uid,
            last_login: Some(Utc::now()),
            membership_type: user.membership_type,
            membership_expiry: user.membership_expiry,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            fitbit_token: None,
            last_synced_fitness: None,
        };
        tables.users.insert(id, created.clone());
        Ok(created)
    }

    async fn update_user(&self, id: u64, patch: UserPatch) -> Result<Option<User>> {
        self.modify_user(id, move |user| patch.apply(user)).await
    }

    async fn update_last_login(&self, id: u64) -> Result<Option<User>> {
        self.modify_user(id, |user| user.last_login = Some(Utc::now()))
            .await
    }

    async fn update_user_membership(
        &self,
        id: u64,
        membership: MembershipType,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<Option<User>> {
        self.modify_user(id, move |user| {
            user.membership_type = membership;
            user.membership_expiry = expiry;
        })
        .await
    }

    async fn update_stripe_info(
        &self,
        id: u64,
        customer_id: &str,
        subscription_id: &str,
    ) -> Result<Option<User>> {
        let customer_id = customer_id.to_string();
        let subscription_id = subscription_id.to_string();
        self.modify_user(id, move |user| {
            user.stripe_customer_id = Some(customer_id);
            user.stripe_subscription_id = Some(subscription_id);
        })
        .await
    }

    async fn get_fitness_goals(&self, user_id: u64) -> Result<Vec<FitnessGoal>> {
        let tables = self.tables.read().await;
        Ok(tables
            .goals
            .values()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_fitness_goal(&self, id: u64) -> Result<Option<FitnessGoal>> {
        Ok(self.tables.read().await.goals.get(&id).cloned())
    }

    async fn create_fitness_goal(&self, goal: InsertFitnessGoal) -> Result<FitnessGoal> {
        let mut tables = self.tables.write().await;
        let id = next_id(&mut tables.next_goal_id);
        let now = Utc::now();
        let created = FitnessGoal {
            id,
            user_id: goal.user_id,
            title: goal.title,
            category: goal.category,
            target_value: goal.target_value,
            unit: goal.unit,
            frequency: goal.frequency,
            start_date: goal.start_date,
            end_date: goal.end_date,
            is_completed: goal.is_completed,
            created_at: now,
            updated_at: now,
        };
        tables.goals.insert(id, created.clone());
        Ok(created)
    }

    async fn update_fitness_goal(
        &self,
        id: u64,
        patch: FitnessGoalPatch,
    ) -> Result<Option<FitnessGoal>> {
        let mut tables = self.tables.write().await;
        Ok(tables.goals.get_mut(&id).map(|goal| {
            patch.apply(goal);
            goal.updated_at = Utc::now();
            goal.clone()
        }))
    }

    async fn delete_fitness_goal(&self, id: u64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.goals.remove(&id).is_none() {
            return Ok(false);
        }
        // Entries outlive their goal, unlinked
        for entry in tables.entries.values_mut() {
            if entry.goal_id == Some(id) {
                entry.goal_id = None;
            }
        }
        Ok(true)
    }

    async fn get_fitness_entries(
        &self,
        user_id: u64,
        filter: EntryFilter,
    ) -> Result<Vec<FitnessEntry>> {
        let tables = self.tables.read().await;
        let mut entries: Vec<FitnessEntry> = tables
            .entries
            .values()
            .filter(|e| e.user_id == user_id && filter.matches(e))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.entry_date.cmp(&a.entry_date).then(b.id.cmp(&a.id)));
        Ok(entries)
    }

    async fn create_fitness_entry(&self, entry: InsertFitnessEntry) -> Result<FitnessEntry> {
        let mut tables = self.tables.write().await;
        let id = next_id(&mut tables.next_entry_id);
        let created = FitnessEntry {
            id,
            user_id: entry.user_id,
            goal_id: entry.goal_id,
            entry_date: entry.entry_date,
            category: entry.category,
            activity: entry.activity,
            duration: entry.duration,
            value: entry.value,
            unit: entry.unit,
            notes: entry.notes,
            created_at: Utc::now(),
        };
        tables.entries.insert(id, created.clone());
        Ok(created)
    }

    async fn update_fitness_entry(
        &self,
        id: u64,
        patch: FitnessEntryPatch,
    ) -> Result<Option<FitnessEntry>> {
        let mut tables = self.tables.write().await;
        Ok(tables.entries.get_mut(&id).map(|entry| {
            patch.apply(entry);
            entry.clone()
        }))
    }

    async fn delete_fitness_entry(&self, id: u64) -> Result<bool> {
        Ok(self.tables.write().await.entries.remove(&id).is_some())
    }

    async fn get_workout_plans(&self, user_id: u64) -> Result<Vec<WorkoutPlan>> {
        let tables = self.tables.read().await;
        Ok(tables
            .plans
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_public_workout_plans(&self) -> Result<Vec<WorkoutPlan>> {
        let tables = self.tables.read().await;
        Ok(tables.plans.values().filter(|p| p.is_public).cloned().collect())
    }

    async fn get_workout_plan(&self, id: u64) -> Result<Option<WorkoutPlan>> {
        Ok(self.tables.read().await.plans.get(&id).cloned())
    }

    async fn create_workout_plan(&self, plan: InsertWorkoutPlan) -> Result<WorkoutPlan> {
        let mut tables = self.tables.write().await;
        let id = next_id(&mut tables.next_plan_id);
        let now = Utc::now();
        let created = WorkoutPlan {
            id,
            user_id: plan.user_id,
            title: plan.title,
            description: plan.description,
            category: plan.category,
            exercises: plan.exercises,
            duration: plan.duration,
            difficulty: plan.difficulty,
            is_public: plan.is_public,
            created_at: now,
            updated_at: now,
        };
        tables.plans.insert(id, created.clone());
        Ok(created)
    }

    async fn update_workout_plan(
        &self,
        id: u64,
        patch: WorkoutPlanPatch,
    ) -> Result<Option<WorkoutPlan>> {
        let mut tables = self.tables.write().await;
        Ok(tables.plans.get_mut(&id).map(|plan| {
            patch.apply(plan);
            plan.updated_at = Utc::now();
            plan.clone()
        }))
    }

    async fn delete_workout_plan(&self, id: u64) -> Result<bool> {
        Ok(self.tables.write().await.plans.remove(&id).is_some())
    }
}
