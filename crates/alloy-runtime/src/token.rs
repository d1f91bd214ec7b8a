//! Opaque value-injection tokens.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(1);

/// An opaque token carrying a unique identity and a human-readable
/// description.
///
/// Tokens are never resolvable as services; they only yield values provided
/// explicitly via `Container::provide_value`.
#[derive(Clone)]
pub struct Token(Arc<TokenInner>);

struct TokenInner {
    id: u64,
    description: Option<String>,
}

/// Create a token. Two calls always yield distinct tokens, description or
/// not.
pub fn create_token(description: Option<&str>) -> Token {
    Token(Arc::new(TokenInner {
        id: NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed),
        description: description.map(|s| s.to_string()),
    }))
}

impl Token {
    /// The human-readable description, or a synthetic one
    pub fn description(&self) -> String {
        match &self.0.description {
            Some(description) => description.clone(),
            None => format!("token#{}", self.0.id),
        }
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self.description())
    }
}
