//! Sign-in state and the persisted bearer token.

use crate::project::User;
use crate::storage::{ApiError, ApiResult, AuthResponse, LoginRequest, ProjectApi, RegisterRequest, TokenStore};

/// The signed-in user, if any, and where the token is kept.
pub struct AuthSession {
    tokens: Box<dyn TokenStore>,
    user: Option<User>,
}

impl AuthSession {
    pub fn new(tokens: Box<dyn TokenStore>) -> Self {
        Self { tokens, user: None }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    /// The stored token. Read errors count as no token.
    pub fn token(&self) -> Option<String> {
        match self.tokens.load() {
            Ok(token) => token,
            Err(e) => {
                log::warn!("Could not read session token: {}", e);
                None
            }
        }
    }

    /// The stored token, or [`ApiError::NotAuthenticated`].
    pub fn require_token(&self) -> ApiResult<String> {
        self.token().ok_or(ApiError::NotAuthenticated)
    }

    fn accept(&mut self, response: AuthResponse) -> &User {
        if let Err(e) = self.tokens.save(&response.access_token) {
            log::warn!("Could not persist session token: {}", e);
        }
        log::info!("Signed in as {}", response.user.username);
        self.user.insert(response.user)
    }

    pub async fn login<A: ProjectApi + ?Sized>(&mut self, api: &A, email: &str, password: &str) -> ApiResult<&User> {
        let request = LoginRequest { email: email.to_string(), password: password.to_string() };
        let response = api.login(&request).await?;
        Ok(self.accept(response))
    }

    pub async fn register<A: ProjectApi + ?Sized>(
        &mut self,
        api: &A,
        username: &str,
        email: &str,
        password: &str,
    ) -> ApiResult<&User> {
        let request = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = api.register(&request).await?;
        Ok(self.accept(response))
    }

    /// Validate a stored token with the backend.
    ///
    /// Any failure, or a user without an id, clears the token.
    pub async fn restore<A: ProjectApi + ?Sized>(&mut self, api: &A) -> Option<&User> {
        let token = self.token()?;
        match api.me(&token).await {
            Ok(user) if !user.id.is_empty() => Some(self.user.insert(user)),
            Ok(_) => {
                log::warn!("Stored session has no user; signing out");
                self.logout();
                None
            }
            Err(e) => {
                log::info!("Stored session rejected: {}", e);
                self.logout();
                None
            }
        }
    }

    /// Forget the user and the stored token.
    pub fn logout(&mut self) {
        if let Err(e) = self.tokens.clear() {
            log::warn!("Could not clear session token: {}", e);
        }
        self.user = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryApi, MemoryTokenStore};
    use crate::testing::block_on;

    #[test]
    fn test_register_persists_token() {
        let api = MemoryApi::new();
        let mut auth = AuthSession::new(Box::new(MemoryTokenStore::new()));

        let user = block_on(auth.register(&api, "ann", "ann@example.com", "pw")).unwrap();
        assert_eq!(user.username, "ann");
        assert!(auth.token().is_some());
        assert!(auth.is_signed_in());
    }

    #[test]
    fn test_rejected_login_surfaces_detail() {
        let api = MemoryApi::new();
        let mut auth = AuthSession::new(Box::new(MemoryTokenStore::new()));

        let err = block_on(auth.login(&api, "nobody@example.com", "pw")).unwrap_err();
        assert_eq!(err.detail(), "Invalid credentials");
        assert!(auth.token().is_none());
        assert!(!auth.is_signed_in());
    }

    #[test]
    fn test_restore_with_valid_token() {
        let api = MemoryApi::new();
        let mut first = AuthSession::new(Box::new(MemoryTokenStore::new()));
        block_on(first.register(&api, "ann", "ann@example.com", "pw")).unwrap();
        let token = first.token().unwrap();

        let mut second = AuthSession::new(Box::new(MemoryTokenStore::with_token(token)));
        let user = block_on(second.restore(&api)).unwrap();
        assert_eq!(user.email, "ann@example.com");
    }

    #[test]
    fn test_invalid_token_clears_itself() {
        let api = MemoryApi::new();
        let mut auth = AuthSession::new(Box::new(MemoryTokenStore::with_token("stale")));

        assert!(block_on(auth.restore(&api)).is_none());
        assert!(auth.token().is_none());
    }

    #[test]
    fn test_logout_clears_everything() {
        let api = MemoryApi::new();
        let mut auth = AuthSession::new(Box::new(MemoryTokenStore::new()));
        block_on(auth.register(&api, "ann", "ann@example.com", "pw")).unwrap();

        auth.logout();
        assert!(auth.user().is_none());
        assert_eq!(auth.require_token(), Err(ApiError::NotAuthenticated));
    }
}
