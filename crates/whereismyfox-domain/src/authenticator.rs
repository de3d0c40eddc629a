/// The parts of an incoming request the authenticator inspects
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerRequest {
    /// Raw `Authorization` header value
    pub authorization: Option<String>,
}

impl CallerRequest {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_authorization(value: impl Into<String>) -> Self {
        Self {
            authorization: Some(value.into()),
        }
    }

    /// Token from a `Bearer <token>` header, if present
    pub fn bearer_token(&self) -> Option<&str> {
        let header = self.authorization.as_deref()?;
        header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

/// Resolves who is calling. An empty identity counts as unauthenticated.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait Authenticator: Send + Sync {
    fn is_authenticated(&self, request: &CallerRequest) -> bool;

    fn caller_identity(&self, request: &CallerRequest) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_extraction() {
        let request = CallerRequest::with_authorization("Bearer abc.def.ghi");
        assert_eq!(request.bearer_token(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_lowercase_bearer() {
        let request = CallerRequest::with_authorization("bearer abc");
        assert_eq!(request.bearer_token(), Some("abc"));
    }

    #[test]
    fn test_missing_or_malformed_header() {
        assert_eq!(CallerRequest::anonymous().bearer_token(), None);
        assert_eq!(
            CallerRequest::with_authorization("Basic dXNlcjpwYXNz").bearer_token(),
            None
        );
        assert_eq!(CallerRequest::with_authorization("Bearer ").bearer_token(), None);
    }
}
