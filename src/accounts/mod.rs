//! Account backend
//!
//! User registration and sign-in, federated sign-in, simulated membership
//! upgrades and fitness tracking. Operations are plain async methods; an
//! HTTP layer maps their errors with `BakeError::status_code`.

pub mod fitness;
pub mod membership;
pub mod schema;
pub mod service;

pub use fitness::FitnessService;
pub use schema::{
    BillingPeriod, FirebaseUser, LoginRequest, MembershipInfo, MembershipType, RegisterRequest,
    SafeUser, User,
};
pub use service::AccountService;
