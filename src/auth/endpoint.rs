use chrono::{ DateTime, Utc };
use url::Url;

use super::signer::CredentialSigner;
use crate::config::SparkConfig;
use crate::error::SparkError;

/// RFC 1123 date, the form the service signs and echoes back.
pub fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Builds a freshly signed connect URL for every attempt.
#[derive(Debug, Clone)]
pub struct ConnectionBuilder {
    signer: CredentialSigner,
    endpoint: Url,
}

impl ConnectionBuilder {
    pub fn new(config: &SparkConfig) -> Result<Self, SparkError> {
        let signer = CredentialSigner::new(config.api_key.clone(), config.api_secret.clone())?;
        let endpoint = config.endpoint()?;
        Ok(Self { signer, endpoint })
    }

    pub fn host(&self) -> &str {
        self.endpoint.host_str().unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        self.endpoint.path()
    }

    pub fn build(&self) -> Result<String, SparkError> {
        self.build_at(Utc::now())
    }

    pub fn build_at(&self, now: DateTime<Utc>) -> Result<String, SparkError> {
        let date = http_date(now);
        let host = self.host();
        let authorization = self.signer.authorization(host, &date, self.path())?;

        let mut url = self.endpoint.clone();
        url.set_query(None);
        url.query_pairs_mut()
            .append_pair("authorization", &authorization)
            .append_pair("date", &date)
            .append_pair("host", host);
        Ok(url.into())
    }
}
