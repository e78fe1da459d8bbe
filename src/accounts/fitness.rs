//! Fitness goals, activity entries and workout plans
//!
//! Creation checks the owner exists and, for free members, the goal limit.

use crate::accounts::membership::{effective_membership, FREE_GOAL_LIMIT};
use crate::accounts::schema::{
    FitnessEntry, FitnessEntryPatch, FitnessGoal, FitnessGoalPatch, InsertFitnessEntry,
    InsertFitnessGoal, InsertWorkoutPlan, MembershipType, WorkoutPlan, WorkoutPlanPatch,
};
use crate::accounts::service::AccountService;
use crate::errors::{BakeError, Result, ValidationErrors};
use crate::store::{EntryFilter, UserStore};
use chrono::Utc;
use std::sync::Arc;

fn not_found(what: &str) -> BakeError {
    BakeError::NotFound(format!("{} not found", what))
}

/// Fitness tracking on top of the account store
#[derive(Clone)]
pub struct FitnessService {
    accounts: AccountService,
}

impl FitnessService {
    pub fn new(accounts: AccountService) -> Self {
        Self { accounts }
    }

    fn store(&self) -> &Arc<dyn UserStore> {
        self.accounts.store()
    }

    pub async fn goals(&self, user_id: u64) -> Result<Vec<FitnessGoal>> {
        self.store().get_fitness_goals(user_id).await
    }

    pub async fn goal(&self, id: u64) -> Result<FitnessGoal> {
        self.store()
            .get_fitness_goal(id)
            .await?
            .ok_or_else(|| not_found("Goal"))
    }

    pub async fn create_goal(&self, goal: InsertFitnessGoal) -> Result<FitnessGoal> {
        goal.validate()?;
        let user = self.accounts.require_user(goal.user_id).await?;

        if effective_membership(&user, Utc::now()) == MembershipType::Free {
            let open = self
                .store()
                .get_fitness_goals(user.id)
                .await?
                .iter()
                .filter(|g| !g.is_completed)
                .count();
            if open >= FREE_GOAL_LIMIT {
                return Err(BakeError::Forbidden(format!(
                    "Free members can track up to {} goals; upgrade to pro for more",
                    FREE_GOAL_LIMIT
                )));
            }
        }

        let created = self.store().create_fitness_goal(goal).await?;
        tracing::debug!("User {} created goal {}", created.user_id, created.id);
        Ok(created)
    }

    pub async fn update_goal(&self, id: u64, patch: FitnessGoalPatch) -> Result<FitnessGoal> {
        self.store()
            .update_fitness_goal(id, patch)
            .await?
            .ok_or_else(|| not_found("Goal"))
    }

    pub async fn delete_goal(&self, id: u64) -> Result<()> {
        if self.store().delete_fitness_goal(id).await? {
            Ok(())
        } else {
            Err(not_found("Goal"))
        }
    }

    pub async fn entries(&self, user_id: u64, filter: EntryFilter) -> Result<Vec<FitnessEntry>> {
        if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
            if end < start {
                let mut errors = ValidationErrors::new();
                errors.add("endDate", "End date must not precede start date");
                return Err(BakeError::Validation(errors));
            }
        }
        self.store().get_fitness_entries(user_id, filter).await
    }

    /// Log an activity; a linked goal must belong to the same user
    pub async fn log_entry(&self, entry: InsertFitnessEntry) -> Result<FitnessEntry> {
        entry.validate()?;
        self.accounts.require_user(entry.user_id).await?;

        if let Some(goal_id) = entry.goal_id {
            let goal = self.goal(goal_id).await?;
            if goal.user_id != entry.user_id {
                let mut errors = ValidationErrors::new();
                errors.add("goalId", "Goal belongs to another user");
                return Err(BakeError::Validation(errors));
            }
        }

        self.store().create_fitness_entry(entry).await
    }

    pub async fn update_entry(&self, id: u64, patch: FitnessEntryPatch) -> Result<FitnessEntry> {
        self.store()
            .update_fitness_entry(id, patch)
            .await?
            .ok_or_else(|| not_found("Entry"))
    }

    pub async fn delete_entry(&self, id: u64) -> Result<()> {
        if self.store().delete_fitness_entry(id).await? {
            Ok(())
        } else {
            Err(not_found("Entry"))
        }
    }

    pub async fn workout_plans(&self, user_id: u64) -> Result<Vec<WorkoutPlan>> {
        self.store().get_workout_plans(user_id).await
    }

    pub async fn public_workout_plans(&self) -> Result<Vec<WorkoutPlan>> {
        self.store().get_public_workout_plans().await
    }

    pub async fn workout_plan(&self, id: u64) -> Result<WorkoutPlan> {
        self.store()
            .get_workout_plan(id)
            .await?
            .ok_or_else(|| not_found("Workout plan"))
    }

    pub async fn create_workout_plan(&self, plan: InsertWorkoutPlan) -> Result<WorkoutPlan> {
        plan.validate()?;
        self.accounts.require_user(plan.user_id).await?;
        self.store().create_workout_plan(plan).await
    }

    pub async fn update_workout_plan(
        &self,
        id: u64,
        patch: WorkoutPlanPatch,
    ) -> Result<WorkoutPlan> {
        self.store()
            .update_workout_plan(id, patch)
            .await?
            .ok_or_else(|| not_found("Workout plan"))
    }

    pub async fn delete_workout_plan(&self, id: u64) -> Result<()> {
        if self.store().delete_workout_plan(id).await? {
            Ok(())
        } else {
            Err(not_found("Workout plan"))
        }
    }
}
