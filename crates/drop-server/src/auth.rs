use tracing::warn;

use crate::error::{ServerError, ServerResult};

/// Shared secret guarding the admin endpoints.
///
/// Only a BLAKE3 digest of the secret is kept, and presented secrets are
/// compared digest to digest in constant time.
#[derive(Clone)]
pub struct AdminSecret {
    digest: Option<blake3::Hash>,
}

impl AdminSecret {
    /// A missing or empty secret disables the admin endpoints.
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            digest: secret.filter(|s| !s.is_empty()).map(|s| blake3::hash(s.as_bytes())),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.digest.is_some()
    }

    pub fn verify(&self, presented: &str) -> ServerResult<()> {
        let Some(expected) = &self.digest else {
            warn!("admin request refused: no admin secret configured");
            return Err(ServerError::Unauthorized);
        };
        if blake3::hash(presented.as_bytes()) == *expected {
            Ok(())
        } else {
            warn!("admin request refused: wrong secret");
            Err(ServerError::Unauthorized)
        }
    }
}

impl std::fmt::Debug for AdminSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSecret")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_only_the_configured_secret() {
        let secret = AdminSecret::new(Some("hunter2"));
        assert!(secret.verify("hunter2").is_ok());
        assert!(matches!(
            secret.verify("hunter3"),
            Err(ServerError::Unauthorized)
        ));
    }

    #[test]
    fn empty_secret_disables_admin() {
        for secret in [AdminSecret::new(None), AdminSecret::new(Some(""))] {
            assert!(!secret.is_enabled());
            assert!(secret.verify("").is_err());
        }
    }

    #[test]
    fn debug_does_not_leak() {
        let rendered = format!("{:?}", AdminSecret::new(Some("hunter2")));
        assert!(!rendered.contains("hunter2"));
    }
}
