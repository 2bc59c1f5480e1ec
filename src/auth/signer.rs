use base64::{ engine::general_purpose::STANDARD, Engine as _ };
use hmac::{ Hmac, Mac };
use sha2::Sha256;

use crate::config::require;
use crate::error::SparkError;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "hmac-sha256";
pub const SIGNED_HEADERS: &str = "host date request-line";

/// The exact bytes the service expects to be signed.
pub fn canonical_string(host: &str, date: &str, path: &str) -> String {
    format!("host: {}\ndate: {}\nGET {} HTTP/1.1", host, date, path)
}

/// Base64 HMAC-SHA256 of `canonical` under `secret`.
pub fn sign(secret: &str, canonical: &str) -> Result<String, SparkError> {
    require("api secret", secret)?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e|
        SparkError::Configuration(format!("unusable api secret: {}", e))
    )?;
    mac.update(canonical.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

#[derive(Clone)]
pub struct CredentialSigner {
    api_key: String,
    api_secret: String,
}

impl CredentialSigner {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Result<Self, SparkError> {
        let api_key = api_key.into();
        let api_secret = api_secret.into();
        require("api key", &api_key)?;
        require("api secret", &api_secret)?;
        Ok(Self { api_key, api_secret })
    }

    pub fn signature(&self, host: &str, date: &str, path: &str) -> Result<String, SparkError> {
        sign(&self.api_secret, &canonical_string(host, date, path))
    }

    /// Base64 of the `api_key=..., algorithm=..., headers=..., signature=...` blob.
    pub fn authorization(&self, host: &str, date: &str, path: &str) -> Result<String, SparkError> {
        let signature = self.signature(host, date, path)?;
        let origin = format!(
            "api_key=\"{}\", algorithm=\"{}\", headers=\"{}\", signature=\"{}\"",
            self.api_key,
            ALGORITHM,
            SIGNED_HEADERS,
            signature
        );
        Ok(STANDARD.encode(origin.as_bytes()))
    }
}

impl std::fmt::Debug for CredentialSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSigner")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}
