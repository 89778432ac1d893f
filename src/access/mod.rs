//! Access control built from the configuration
//!
//! [`ConfigRuleSet`] filters requests by destination site, client address
//! and destination port. [`PasswordAuthenticator`] checks a fixed
//! username/password pair.

mod password;
mod rules;

pub use password::PasswordAuthenticator;
pub use rules::{ConfigRuleSet, Denial};
