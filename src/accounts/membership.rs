//! Membership tiers and pricing
//!
//! Upgrading is simulated: no payment is processed, the user is switched to
//! `pro` with an expiry one billing period from now.

use crate::accounts::schema::{BillingPeriod, MembershipInfo, MembershipType, SubscriptionPlan, User};
use crate::errors::{BakeError, Result};
use chrono::{DateTime, Months, Utc};

pub const MONTHLY_PRICE: f64 = 4.99;
pub const YEARLY_PRICE: f64 = 39.99;

/// Percentage saved by paying yearly
pub const YEARLY_SAVINGS_PERCENT: u8 = 20;

/// Goals a free member may keep
pub const FREE_GOAL_LIMIT: usize = 3;

const FREE_BENEFITS: &[&str] = &[
    "Up to 3 fitness goals",
    "Basic activity tracking",
    "Simple progress charts",
];

const PRO_BENEFITS: &[&str] = &[
    "Unlimited Fitness Goals",
    "Fitbit Integration",
    "Advanced Analytics",
    "Custom Workout Plans",
    "Priority Support",
];

impl BillingPeriod {
    pub fn months(&self) -> u32 {
        match self {
            BillingPeriod::Monthly => 1,
            BillingPeriod::Yearly => 12,
        }
    }

    pub fn price(&self) -> f64 {
        match self {
            BillingPeriod::Monthly => MONTHLY_PRICE,
            BillingPeriod::Yearly => YEARLY_PRICE,
        }
    }

    /// Expiry of a subscription bought at `from`
    pub fn expiry_from(&self, from: DateTime<Utc>) -> Result<DateTime<Utc>> {
        from.checked_add_months(Months::new(self.months()))
            .ok_or_else(|| BakeError::Generic("Membership expiry out of range".to_string()))
    }
}

/// Priced plan for a billing period
pub fn subscription_plan(period: BillingPeriod) -> SubscriptionPlan {
    SubscriptionPlan {
        plan_type: period,
        plan_price: period.price(),
    }
}

pub fn benefits(membership: MembershipType) -> Vec<String> {
    let list = match membership {
        MembershipType::Free => FREE_BENEFITS,
        MembershipType::Pro => PRO_BENEFITS,
    };
    list.iter().map(|b| b.to_string()).collect()
}

/// Tier in force at `now`; a lapsed pro membership counts as free
pub fn effective_membership(user: &User, now: DateTime<Utc>) -> MembershipType {
    match (user.membership_type, user.membership_expiry) {
        (MembershipType::Pro, Some(expiry)) if expiry <= now => MembershipType::Free,
        (membership, _) => membership,
    }
}

/// Membership summary for a user at `now`
pub fn membership_info(user: &User, now: DateTime<Utc>) -> MembershipInfo {
    let membership_type = effective_membership(user, now);
    MembershipInfo {
        membership_type,
        membership_expiry: match membership_type {
            MembershipType::Pro => user.membership_expiry,
            MembershipType::Free => None,
        },
        benefits: benefits(membership_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn user(membership_type: MembershipType, expiry: Option<DateTime<Utc>>) -> User {
        User {
            id: 1,
            username: "ana".into(),
            password: String::new(),
            email: "ana@example.com".into(),
            display_name: None,
            photo_url: None,
            firebase_uid: None,
            last_login: None,
            membership_type,
            membership_expiry: expiry,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            fitbit_token: None,
            last_synced_fitness: None,
        }
    }

    #[test]
    fn test_expiry_calendar_arithmetic() {
        let start = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
        assert_eq!(
            BillingPeriod::Monthly.expiry_from(start).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap()
        );
        assert_eq!(
            BillingPeriod::Yearly.expiry_from(start).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 31, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_pricing() {
        assert_eq!(subscription_plan(BillingPeriod::Monthly).plan_price, 4.99);
        assert_eq!(subscription_plan(BillingPeriod::Yearly).plan_price, 39.99);
        // yearly is cheaper than twelve months
        assert!(YEARLY_PRICE < MONTHLY_PRICE * 12.0);
    }

    #[test]
    fn test_lapsed_pro_reports_free() {
        let now = Utc::now();
        let lapsed = user(MembershipType::Pro, Some(now - Duration::days(1)));
        let info = membership_info(&lapsed, now);
        assert_eq!(info.membership_type, MembershipType::Free);
        assert!(info.membership_expiry.is_none());
        assert_eq!(info.benefits.len(), FREE_BENEFITS.len());

        let active = user(MembershipType::Pro, Some(now + Duration::days(1)));
        let info = membership_info(&active, now);
        assert_eq!(info.membership_type, MembershipType::Pro);
        assert!(info.benefits.contains(&"Fitbit Integration".to_string()));
    }
}
