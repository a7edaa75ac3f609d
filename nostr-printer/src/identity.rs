//! One-time public key lookup through a `/.well-known/nostr.json` document.

use crate::errors::IdentityError;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightningAddress {
    pub name: String,
    pub domain: String,
}

impl LightningAddress {
    pub fn base_url(&self) -> String {
        format!("https://{}", self.domain)
    }
}

impl FromStr for LightningAddress {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('@') {
            Some((name, domain))
                if !name.is_empty() && !domain.is_empty() && !domain.contains('@') =>
            {
                Ok(Self {
                    name: name.to_string(),
                    domain: domain.to_string(),
                })
            }
            _ => Err(IdentityError::InvalidAddress(s.to_string())),
        }
    }
}

impl fmt::Display for LightningAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.domain)
    }
}

/// Checks `key` is a 32-byte hex public key and returns it lowercased.
pub fn validate_pubkey(key: &str) -> Result<String, IdentityError> {
    match hex::decode(key) {
        Ok(bytes) if bytes.len() == 32 => Ok(key.to_ascii_lowercase()),
        _ => Err(IdentityError::InvalidKey(key.to_string())),
    }
}

/// `GET <base_url>/.well-known/nostr.json?name=<name>` and read `names.<name>`.
pub async fn resolve_pubkey(base_url: &str, name: &str) -> Result<String, IdentityError> {
    let url = format!("{}/.well-known/nostr.json", base_url.trim_end_matches('/'));
    let doc: Value = reqwest::Client::new()
        .get(url)
        .query(&[("name", name)])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let key = doc
        .get("names")
        .and_then(|names| names.get(name))
        .and_then(Value::as_str)
        .ok_or_else(|| IdentityError::UnknownName(name.to_string()))?;
    let pubkey = validate_pubkey(key)?;

    tracing::info!(name = %name, pubkey = %pubkey, "identity resolved");
    Ok(pubkey)
}

pub async fn resolve_address(address: &LightningAddress) -> Result<String, IdentityError> {
    resolve_pubkey(&address.base_url(), &address.name).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    const PUBKEY: &str = "e17feb5f2cf83546bcf7fd9c8237b05275be958bd521543c2285ffc6c2d654b3";

    async fn serve_well_known() -> String {
        async fn nostr_json(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
            let mut names = serde_json::Map::new();
            if params.get("name").map(String::as_str) == Some("alice") {
                names.insert("alice".to_string(), json!(PUBKEY));
            }
            if params.get("name").map(String::as_str) == Some("mallory") {
                names.insert("mallory".to_string(), json!("not-a-key"));
            }
            Json(json!({ "names": names }))
        }

        let app = Router::new().route("/.well-known/nostr.json", get(nostr_json));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_parse_lightning_address() {
        let address: LightningAddress = "alice@example.com".parse().unwrap();
        assert_eq!(address.name, "alice");
        assert_eq!(address.domain, "example.com");
        assert_eq!(address.base_url(), "https://example.com");
        assert_eq!(address.to_string(), "alice@example.com");

        for bad in ["alice", "@example.com", "alice@", "a@b@c"] {
            assert!(matches!(
                bad.parse::<LightningAddress>(),
                Err(IdentityError::InvalidAddress(_))
            ));
        }
    }

    #[test]
    fn test_validate_pubkey() {
        assert_eq!(validate_pubkey(PUBKEY).unwrap(), PUBKEY);
        assert_eq!(
            validate_pubkey(&PUBKEY.to_ascii_uppercase()).unwrap(),
            PUBKEY
        );
        assert!(validate_pubkey("abcd").is_err());
        assert!(validate_pubkey("zz").is_err());
    }

    #[tokio::test]
    async fn test_resolve_pubkey() {
        let base = serve_well_known().await;
        assert_eq!(resolve_pubkey(&base, "alice").await.unwrap(), PUBKEY);
    }

    #[tokio::test]
    async fn test_resolve_unknown_or_invalid() {
        let base = serve_well_known().await;
        assert!(matches!(
            resolve_pubkey(&base, "bob").await,
            Err(IdentityError::UnknownName(_))
        ));
        assert!(matches!(
            resolve_pubkey(&base, "mallory").await,
            Err(IdentityError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_http_error() {
        let base = serve_well_known().await;
        assert!(matches!(
            resolve_pubkey(&format!("{base}/missing"), "alice").await,
            Err(IdentityError::Request(_))
        ));
    }
}
