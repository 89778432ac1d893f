//! Fixed username/password authenticator

use crate::socks::{Authenticator, Request};
use std::fmt;

/// Accepts requests carrying exactly the configured credentials
#[derive(Clone)]
pub struct PasswordAuthenticator {
    username: String,
    password: String,
}

impl PasswordAuthenticator {
    /// Accept only `username` with `password`
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        PasswordAuthenticator {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for PasswordAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordAuthenticator")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Authenticator for PasswordAuthenticator {
    fn authenticate(&self, request: &Request) -> bool {
        request.username == self.username && request.password == self.password
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socks::Version;

    fn request(username: &str, password: &str) -> Request {
        let mut request = Request::new(Version::Socks5, None);
        request.username = username.to_string();
        request.password = password.to_string();
        request
    }

    #[test]
    fn test_authenticate() {
        let auth = PasswordAuthenticator::new("alice", "secret");
        assert!(auth.authenticate(&request("alice", "secret")));
        assert!(!auth.authenticate(&request("alice", "wrong")));
        assert!(!auth.authenticate(&request("bob", "secret")));
        assert!(!auth.authenticate(&request("", "")));
    }

    #[test]
    fn test_debug_hides_password() {
        let auth = PasswordAuthenticator::new("alice", "secret");
        assert!(!format!("{:?}", auth).contains("secret"));
    }
}
