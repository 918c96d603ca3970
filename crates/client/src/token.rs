//! Anti-forgery token sources.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

/// Supplies the anti-forgery token sent with each batch.
///
/// Returning an empty string means "no token available".
pub trait TokenProvider: Send + Sync {
    /// Current token.
    fn token(&self) -> String;
}

impl<F> TokenProvider for F
where
    F: Fn() -> String + Send + Sync,
{
    fn token(&self) -> String {
        self()
    }
}

/// A fixed token, e.g. from configuration.
pub struct StaticToken(SecretString);

impl StaticToken {
    /// Wrap a token.
    #[must_use]
    pub const fn new(token: SecretString) -> Self {
        Self(token)
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken([REDACTED])")
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> String {
        self.0.expose_secret().to_string()
    }
}

/// Tries each provider in order and returns the first non-empty token.
///
/// Mirrors the page's lookup order: the navigation manager first, then the
/// token field embedded in the page.
#[derive(Clone, Default)]
pub struct TokenChain {
    providers: Vec<Arc<dyn TokenProvider>>,
}

impl TokenChain {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider.
    #[must_use]
    pub fn with(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.providers.push(provider);
        self
    }
}

impl TokenProvider for TokenChain {
    fn token(&self) -> String {
        self.providers
            .iter()
            .map(|provider| provider.token())
            .find(|token| !token.is_empty())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_prefers_first_non_empty() {
        let chain = TokenChain::new()
            .with(Arc::new(String::new))
            .with(Arc::new(|| "dom-token".to_string()))
            .with(Arc::new(|| "late-token".to_string()));

        assert_eq!(chain.token(), "dom-token");
    }

    #[test]
    fn test_empty_chain_yields_empty_token() {
        assert_eq!(TokenChain::new().token(), "");
    }

    #[test]
    fn test_static_token_debug_redacts() {
        let token = StaticToken::new(SecretString::from("csrf_secret_value"));
        assert_eq!(token.token(), "csrf_secret_value");
        assert!(!format!("{token:?}").contains("csrf_secret_value"));
    }
}
