//! Registration, sign-in, federated sign-in and profile lookup
//!
//! Each operation maps onto one route of a web layer; failures carry the
//! message the client shows and `BakeError::status_code` gives the status.

use crate::accounts::membership;
use crate::accounts::schema::{
    BillingPeriod, FirebaseUser, InsertUser, LoginRequest, MembershipInfo, MembershipType,
    RegisterRequest, SafeUser, User, UserPatch,
};
use crate::errors::{BakeError, Result};
use crate::store::UserStore;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Salted SHA-256, stored as `salt$hexdigest`
pub fn hash_password(password: &str) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    format!("{}${}", salt, digest(&salt, password))
}

/// Check a candidate against a stored hash; accounts without a password
/// (federated sign-in only) never match
pub fn verify_password(stored: &str, candidate: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, hash)) => !hash.is_empty() && digest(salt, candidate) == hash,
        None => false,
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn email_local_part(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

/// Account operations over a `UserStore`
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn UserStore>,
}

impl AccountService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    /// Create an account; the display name starts out as the username
    pub async fn register(&self, request: RegisterRequest) -> Result<SafeUser> {
        request.validate()?;

        if self.store.get_user_by_email(&request.email).await?.is_some() {
            return Err(BakeError::Conflict("Email already in use".to_string()));
        }
        if self
            .store
            .get_user_by_username(&request.username)
            .await?
            .is_some()
        {
            return Err(BakeError::Conflict("Username already taken".to_string()));
        }

        let user = self
            .store
            .create_user(InsertUser {
                display_name: Some(request.username.clone()),
                username: request.username,
                password: hash_password(&request.password),
                email: request.email,
                ..Default::default()
            })
            .await?;

        info!("Registered user {} ({})", user.id, user.username);
        Ok(user.into())
    }

    /// Email/password sign-in
    pub async fn login(&self, request: LoginRequest) -> Result<SafeUser> {
        request.validate()?;

        let user = match self.store.get_user_by_email(&request.email).await? {
            Some(user) if verify_password(&user.password, &request.password) => user,
            _ => {
                debug!("Rejected sign-in for {}", request.email);
                return Err(BakeError::Unauthorized(INVALID_CREDENTIALS.to_string()));
            }
        };

        let user = self.touch(user).await?;
        Ok(user.into())
    }

    /// Sign-in through the federated identity provider
    ///
    /// Known uid: refresh the last login. Known email: link the uid to that
    /// account. Otherwise create an account named after the email.
    pub async fn firebase_auth(&self, firebase_user: FirebaseUser) -> Result<SafeUser> {
        firebase_user.validate()?;

        if let Some(user) = self
            .store
            .get_user_by_firebase_uid(&firebase_user.uid)
            .await?
        {
            return Ok(self.touch(user).await?.into());
        }

        let Some(email) = firebase_user.email.clone() else {
            warn!("Federated sign-in without email for uid {}", firebase_user.uid);
            return Err(BakeError::Generic("Failed to authenticate user".to_string()));
        };

        if let Some(existing) = self.store.get_user_by_email(&email).await? {
            let patch = UserPatch {
                firebase_uid: Some(firebase_user.uid),
                display_name: firebase_user.display_name,
                photo_url: firebase_user.photo_url,
                ..Default::default()
            };
            let linked = self
                .store
                .update_user(existing.id, patch)
                .await?
                .ok_or_else(|| BakeError::Generic("Failed to authenticate user".to_string()))?;
            info!("Linked federated identity to user {}", linked.id);
            return Ok(self.touch(linked).await?.into());
        }

        let local = email_local_part(&email);
        let user = self
            .store
            .create_user(InsertUser {
                username: local.clone(),
                password: String::new(),
                email,
                display_name: Some(firebase_user.display_name.unwrap_or(local)),
                photo_url: firebase_user.photo_url,
                firebase_uid: Some(firebase_user.uid),
                ..Default::default()
            })
            .await?;

        info!("Created user {} from federated sign-in", user.id);
        Ok(user.into())
    }

    /// Look up a profile by numeric id or, failing that, by federated uid
    pub async fn profile(&self, id: &str) -> Result<SafeUser> {
        let id = id.trim();
        if id.is_empty() {
            let mut errors = crate::errors::ValidationErrors::new();
            errors.add("id", "User ID is required");
            return Err(BakeError::Validation(errors));
        }

        let user = match id.parse::<u64>() {
            Ok(numeric) => self.store.get_user(numeric).await?,
            Err(_) => self.store.get_user_by_firebase_uid(id).await?,
        };

        user.map(SafeUser::from)
            .ok_or_else(|| BakeError::NotFound("User not found".to_string()))
    }

    /// Switch a user to pro for one billing period
    pub async fn upgrade_membership(
        &self,
        user_id: u64,
        period: BillingPeriod,
    ) -> Result<SafeUser> {
        let expiry = period.expiry_from(Utc::now())?;
        let user = self
            .store
            .update_user_membership(user_id, MembershipType::Pro, Some(expiry))
            .await?
            .ok_or_else(|| BakeError::NotFound("User not found".to_string()))?;

        info!(
            "User {} upgraded to pro ({:?}, ${}) until {}",
            user.id,
            period,
            period.price(),
            expiry
        );
        Ok(user.into())
    }

    pub async fn membership_info(&self, user_id: u64) -> Result<MembershipInfo> {
        let user = self.require_user(user_id).await?;
        Ok(membership::membership_info(&user, Utc::now()))
    }

    pub(crate) async fn require_user(&self, user_id: u64) -> Result<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| BakeError::NotFound("User not found".to_string()))
    }

    async fn touch(&self, user: User) -> Result<User> {
        Ok(self.store.update_last_login(user.id).await?.unwrap_or(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryUserStore;

    fn service() -> AccountService {
        AccountService::new(Arc::new(MemoryUserStore::new()))
    }

    fn register_request(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: "secret1".to_string(),
            confirm_password: "secret1".to_string(),
        }
    }

    fn firebase(uid: &str, email: Option<&str>) -> FirebaseUser {
        FirebaseUser {
            uid: uid.to_string(),
            display_name: None,
            email: email.map(str::to_string),
            photo_url: None,
        }
    }

    #[test]
    fn test_password_hashing() {
        let stored = hash_password("secret1");
        assert!(!stored.contains("secret1"));
        assert!(verify_password(&stored, "secret1"));
        assert!(!verify_password(&stored, "secret2"));
        assert!(!verify_password("", ""));
        assert_ne!(hash_password("secret1"), stored);
    }

    #[tokio::test]
    async fn test_register_sets_display_name() {
        let service = service();
        let user = service
            .register(register_request("ana", "ana@example.com"))
            .await
            .unwrap();
        assert_eq!(user.display_name.as_deref(), Some("ana"));
        assert_eq!(user.membership_type, MembershipType::Free);
    }

    #[tokio::test]
    async fn test_register_conflicts() {
        let service = service();
        service
            .register(register_request("ana", "ana@example.com"))
            .await
            .unwrap();

        let err = service
            .register(register_request("other", "ana@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.to_string(), "Email already in use");

        let err = service
            .register(register_request("ana", "new@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Username already taken");
    }

    #[tokio::test]
    async fn test_login() {
        let service = service();
        service
            .register(register_request("ana", "ana@example.com"))
            .await
            .unwrap();

        let ok = service
            .login(LoginRequest {
                email: "ana@example.com".into(),
                password: "secret1".into(),
            })
            .await
            .unwrap();
        assert_eq!(ok.username, "ana");

        let err = service
            .login(LoginRequest {
                email: "ana@example.com".into(),
                password: "wrong-pass".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.to_string(), INVALID_CREDENTIALS);

        let err = service
            .login(LoginRequest {
                email: "nobody@example.com".into(),
                password: "secret1".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[tokio::test]
    async fn test_firebase_auth_creates_then_reuses() {
        let service = service();
        let created = service
            .firebase_auth(firebase("fb-1", Some("zoe@example.com")))
            .await
            .unwrap();
        assert_eq!(created.username, "zoe");
        assert_eq!(created.display_name.as_deref(), Some("zoe"));
        assert_eq!(created.firebase_uid.as_deref(), Some("fb-1"));

        let again = service.firebase_auth(firebase("fb-1", None)).await.unwrap();
        assert_eq!(again.id, created.id);
    }

    #[tokio::test]
    async fn test_firebase_auth_links_existing_email() {
        let service = service();
        let registered = service
            .register(register_request("ana", "ana@example.com"))
            .await
            .unwrap();

        let mut incoming = firebase("fb-9", Some("ana@example.com"));
        incoming.photo_url = Some("https://example.com/ana.png".into());
        let linked = service.firebase_auth(incoming).await.unwrap();

        assert_eq!(linked.id, registered.id);
        assert_eq!(linked.firebase_uid.as_deref(), Some("fb-9"));
        assert_eq!(linked.display_name.as_deref(), Some("ana"));
        assert_eq!(linked.photo_url.as_deref(), Some("https://example.com/ana.png"));
    }

    #[tokio::test]
    async fn test_firebase_auth_without_email_fails() {
        let err = service()
            .firebase_auth(firebase("fb-2", None))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.to_string(), "Failed to authenticate user");
    }

    #[tokio::test]
    async fn test_profile_lookup() {
        let service = service();
        let user = service
            .firebase_auth(firebase("fb-3", Some("kim@example.com")))
            .await
            .unwrap();

        assert_eq!(service.profile(&user.id.to_string()).await.unwrap().id, user.id);
        assert_eq!(service.profile("fb-3").await.unwrap().id, user.id);
        assert_eq!(service.profile("").await.unwrap_err().status_code(), 400);
        assert_eq!(service.profile("999").await.unwrap_err().status_code(), 404);
        assert_eq!(service.profile("missing-uid").await.unwrap_err().status_code(), 404);
    }

    #[tokio::test]
    async fn test_upgrade_membership() {
        let service = service();
        let user = service
            .register(register_request("ana", "ana@example.com"))
            .await
            .unwrap();

        let upgraded = service
            .upgrade_membership(user.id, BillingPeriod::Yearly)
            .await
            .unwrap();
        assert_eq!(upgraded.membership_type, MembershipType::Pro);
        let expiry = upgraded.membership_expiry.unwrap();
        assert!(expiry > Utc::now() + chrono::Duration::days(360));

        let info = service.membership_info(user.id).await.unwrap();
        assert_eq!(info.membership_type, MembershipType::Pro);

        let missing = service.upgrade_membership(42, BillingPeriod::Monthly).await;
        assert!(matches!(missing, Err(BakeError::NotFound(_))));
    }
}
