use std::sync::Arc;

use anyhow::{bail, Context, Result};
use oo7::Keyring;

use crate::config::APP_ID;

const TOKEN_LABEL: &str = "TripChat session token";

/// Lookup attributes for the one secret this app keeps.
const TOKEN_ATTRIBUTES: &[(&str, &str)] =
    &[("application", APP_ID), ("secret-kind", "access-token")];

/// Secret Service storage for the backend access token.
#[derive(Debug, Clone)]
pub struct KeyringService {
    keyring: Arc<Keyring>,
}

impl KeyringService {
    pub async fn new() -> Result<Self> {
        let keyring = Keyring::new()
            .await
            .context("Failed to initialize keyring")?;
        Ok(Self {
            keyring: Arc::new(keyring),
        })
    }

    /// Saves the token, replacing whatever session was stored before.
    pub async fn store_token(&self, token: &str) -> Result<()> {
        let token = token.trim();
        if token.is_empty() {
            bail!("Refusing to store an empty access token");
        }
        self.keyring
            .create_item(TOKEN_LABEL, &TOKEN_ATTRIBUTES, token, true)
            .await
            .context("Failed to store access token in keyring")
    }

    /// The stored token, or `None` when signed out.
    pub async fn retrieve_token(&self) -> Result<Option<String>> {
        let items = self
            .keyring
            .search_items(&TOKEN_ATTRIBUTES)
            .await
            .context("Failed to search keyring")?;

        let Some(item) = items.first() else {
            return Ok(None);
        };
        let secret = item.secret().await.context("Failed to read access token")?;
        decode_token(secret.to_vec())
    }

    pub async fn delete_token(&self) -> Result<()> {
        self.keyring
            .delete(&TOKEN_ATTRIBUTES)
            .await
            .context("Failed to delete access token from keyring")
    }
}

/// A blank secret counts as no session at all.
fn decode_token(bytes: Vec<u8>) -> Result<Option<String>> {
    let token = String::from_utf8(bytes).context("Access token is not valid UTF-8")?;
    let token = token.trim();
    Ok((!token.is_empty()).then(|| token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_token() {
        assert_eq!(
            decode_token(b"eyJhbGciOi.abc\n".to_vec()).unwrap().as_deref(),
            Some("eyJhbGciOi.abc")
        );
        assert_eq!(decode_token(b"  ".to_vec()).unwrap(), None);
        assert!(decode_token(vec![0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_attributes_scope_to_app() {
        assert!(TOKEN_ATTRIBUTES.contains(&("application", APP_ID)));
        assert_eq!(TOKEN_ATTRIBUTES.len(), 2);
    }
}
