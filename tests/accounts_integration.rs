//! Account backend integration tests
//!
//! Walks the sign-up, sign-in, federated sign-in, membership and fitness
//! flows against the in-memory store.

use chrono::NaiveDate;
use promptbake::{
    accounts::{
        schema::{Frequency, InsertFitnessEntry, InsertFitnessGoal},
        AccountService, BillingPeriod, FirebaseUser, FitnessService, LoginRequest,
        MembershipType, RegisterRequest,
    },
    store::{EntryFilter, MemoryUserStore},
    BakeError,
};
use std::sync::Arc;

fn accounts() -> AccountService {
    AccountService::new(Arc::new(MemoryUserStore::new()))
}

fn register(username: &str, email: &str) -> RegisterRequest {
    RegisterRequest {
        username: username.to_string(),
        email: email.to_string(),
        password: "hunter22".to_string(),
        confirm_password: "hunter22".to_string(),
    }
}

#[tokio::test]
async fn test_register_then_login() {
    let service = accounts();
    let user = service
        .register(register("ana", "ana@example.com"))
        .await
        .unwrap();

    let json = serde_json::to_value(&user).unwrap();
    assert!(json.get("password").is_none());

    let signed_in = service
        .login(LoginRequest {
            email: "ana@example.com".into(),
            password: "hunter22".into(),
        })
        .await
        .unwrap();
    assert_eq!(signed_in.id, user.id);
    assert!(signed_in.last_login.is_some());
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let service = accounts();
    service
        .register(register("ana", "ana@example.com"))
        .await
        .unwrap();

    let err = service
        .register(register("ana2", "ana@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, BakeError::Conflict(_)));
    assert_eq!(err.status_code(), 409);
}

#[tokio::test]
async fn test_invalid_registration_reports_fields() {
    let err = accounts()
        .register(RegisterRequest {
            username: "a".into(),
            email: "not-an-email".into(),
            password: "abc".into(),
            confirm_password: "abd".into(),
        })
        .await
        .unwrap_err();

    match err {
        BakeError::Validation(errors) => {
            for field in ["username", "email", "password", "confirmPassword"] {
                assert!(!errors.field(field).is_empty(), "{} not reported", field);
            }
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let service = accounts();
    service
        .register(register("ana", "ana@example.com"))
        .await
        .unwrap();

    let err = service
        .login(LoginRequest {
            email: "ana@example.com".into(),
            password: "hunter23".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 401);
}

#[tokio::test]
async fn test_federated_sign_in_links_by_email() {
    let service = accounts();
    let registered = service
        .register(register("ana", "ana@example.com"))
        .await
        .unwrap();

    let linked = service
        .firebase_auth(FirebaseUser {
            uid: "google-123".into(),
            display_name: Some("Ana Lima".into()),
            email: Some("ana@example.com".into()),
            photo_url: None,
        })
        .await
        .unwrap();

    assert_eq!(linked.id, registered.id);
    assert_eq!(linked.display_name.as_deref(), Some("Ana Lima"));
    assert_eq!(service.profile("google-123").await.unwrap().id, registered.id);

    // a password account linked to a federated identity keeps its password
    assert!(service
        .login(LoginRequest {
            email: "ana@example.com".into(),
            password: "hunter22".into(),
        })
        .await
        .is_ok());
}

#[tokio::test]
async fn test_federated_only_account_cannot_use_password_login() {
    let service = accounts();
    service
        .firebase_auth(FirebaseUser {
            uid: "gh-7".into(),
            display_name: None,
            email: Some("dev@example.com".into()),
            photo_url: None,
        })
        .await
        .unwrap();

    let err = service
        .login(LoginRequest {
            email: "dev@example.com".into(),
            password: "whatever".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 401);
}

#[tokio::test]
async fn test_membership_upgrade_lifts_goal_limit() {
    let service = accounts();
    let user = service
        .register(register("ana", "ana@example.com"))
        .await
        .unwrap();
    let fitness = FitnessService::new(service.clone());

    let goal = |title: &str| InsertFitnessGoal {
        user_id: user.id,
        title: title.to_string(),
        category: "strength".into(),
        target_value: 3.0,
        unit: "sessions".into(),
        frequency: Frequency::Weekly,
        start_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        end_date: None,
        is_completed: false,
    };

    for title in ["a", "b", "c"] {
        fitness.create_goal(goal(title)).await.unwrap();
    }
    assert_eq!(fitness.create_goal(goal("d")).await.unwrap_err().status_code(), 403);

    let info = service.membership_info(user.id).await.unwrap();
    assert_eq!(info.membership_type, MembershipType::Free);

    service
        .upgrade_membership(user.id, BillingPeriod::Monthly)
        .await
        .unwrap();
    fitness.create_goal(goal("d")).await.unwrap();

    let info = service.membership_info(user.id).await.unwrap();
    assert_eq!(info.membership_type, MembershipType::Pro);
    assert!(info.membership_expiry.is_some());
}

#[tokio::test]
async fn test_fitness_entries_by_goal_and_date() {
    let service = accounts();
    let user = service
        .register(register("ana", "ana@example.com"))
        .await
        .unwrap();
    let fitness = FitnessService::new(service);

    let goal = fitness
        .create_goal(InsertFitnessGoal {
            user_id: user.id,
            title: "Run 20km a week".into(),
            category: "cardio".into(),
            target_value: 20.0,
            unit: "km".into(),
            frequency: Frequency::Weekly,
            start_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            end_date: None,
            is_completed: false,
        })
        .await
        .unwrap();

    for (day, goal_id) in [(3, Some(goal.id)), (5, None), (9, Some(goal.id))] {
        fitness
            .log_entry(InsertFitnessEntry {
                user_id: user.id,
                goal_id,
                entry_date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
                category: "cardio".into(),
                activity: "running".into(),
                duration: 35,
                value: Some(6.5),
                unit: Some("km".into()),
                notes: None,
            })
            .await
            .unwrap();
    }

    let for_goal = fitness
        .entries(
            user.id,
            EntryFilter {
                goal_id: Some(goal.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(for_goal.len(), 2);

    let first_week = fitness
        .entries(
            user.id,
            EntryFilter {
                start_date: NaiveDate::from_ymd_opt(2024, 6, 1),
                end_date: NaiveDate::from_ymd_opt(2024, 6, 7),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(first_week.len(), 2);
    assert!(first_week[0].entry_date > first_week[1].entry_date);
}
