// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Request signing for the serverless cloud endpoint.

use std::fmt;

use hmac::{Hmac, Mac};
use md5::Md5;
use serde::Serialize;

type HmacMd5 = Hmac<Md5>;

/// Body of a request to the multiplexed cloud endpoint.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct CloudRequest {
    /// Server-side method name.
    pub method: String,
    /// JSON-encoded method parameters.
    pub params: String,
    /// Serverless workspace identifier.
    #[serde(rename = "spaceId")]
    pub space_id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Authorization token, absent for the anonymous authorize call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl CloudRequest {
    /// Builds the canonical string covered by the signature.
    ///
    /// Non-empty fields are sorted by their wire name and joined as
    /// `key=value` pairs separated by `&`.
    #[must_use]
    pub fn canonical_string(&self) -> String {
        let timestamp = self.timestamp.to_string();
        let mut pairs = vec![
            ("method", self.method.as_str()),
            ("params", self.params.as_str()),
            ("spaceId", self.space_id.as_str()),
            ("timestamp", if self.timestamp == 0 { "" } else { timestamp.as_str() }),
            ("token", self.token.as_deref().unwrap_or_default()),
        ];
        pairs.retain(|(_, value)| !value.is_empty());
        pairs.sort_by_key(|(key, _)| *key);

        pairs
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

// Params may carry the account password.
impl fmt::Debug for CloudRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudRequest")
            .field("method", &self.method)
            .field("space_id", &self.space_id)
            .field("timestamp", &self.timestamp)
            .field("has_token", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

/// Strategy that signs outbound cloud requests.
///
/// Implementations must be pure: the same request always yields the same
/// signature.
pub trait RequestSigner: Send + Sync {
    /// Returns the value of the signature header for `request`.
    fn sign(&self, request: &CloudRequest) -> String;
}

/// Default signer: lowercase hex HMAC-MD5 of the canonical string.
#[derive(Clone)]
pub struct HmacMd5Signer {
    mac: HmacMd5,
}

impl HmacMd5Signer {
    /// Creates a signer keyed with the shared secret.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        let Ok(mac) = HmacMd5::new_from_slice(secret.as_bytes()) else {
            unreachable!("HMAC accepts keys of any length");
        };
        Self { mac }
    }

    fn sign_str(&self, message: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl RequestSigner for HmacMd5Signer {
    fn sign(&self, request: &CloudRequest) -> String {
        self.sign_str(&request.canonical_string())
    }
}

impl fmt::Debug for HmacMd5Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HmacMd5Signer")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CloudRequest {
        CloudRequest {
            method: "serverless.function.runtime.invoke".to_string(),
            params: r#"{"a":1}"#.to_string(),
            space_id: "space".to_string(),
            timestamp: 1_700_000_000_000,
            token: None,
        }
    }

    #[test]
    fn canonical_string_is_sorted_and_skips_empty() {
        let mut req = request();
        req.params = String::new();

        assert_eq!(
            req.canonical_string(),
            "method=serverless.function.runtime.invoke&spaceId=space&timestamp=1700000000000"
        );
    }

    #[test]
    fn canonical_string_includes_token() {
        let mut req = request();
        req.token = Some("tok".to_string());

        assert!(req.canonical_string().ends_with("&timestamp=1700000000000&token=tok"));
    }

    #[test]
    fn signing_is_deterministic() {
        let signer = HmacMd5Signer::new("secret");
        assert_eq!(signer.sign(&request()), signer.sign(&request()));
    }

    #[test]
    fn signature_depends_on_every_field() {
        let signer = HmacMd5Signer::new("secret");
        let base = signer.sign(&request());

        let mut changed = request();
        changed.timestamp += 1;
        assert_ne!(signer.sign(&changed), base);

        let mut changed = request();
        changed.token = Some("tok".to_string());
        assert_ne!(signer.sign(&changed), base);

        assert_ne!(HmacMd5Signer::new("other").sign(&request()), base);
    }

    #[test]
    fn hmac_md5_known_vector() {
        let signer = HmacMd5Signer::new("Jefe");
        assert_eq!(
            signer.sign_str("what do ya want for nothing?"),
            "750c783e6ab0b503eaa86e310a5db738"
        );
    }

    #[test]
    fn debug_omits_params() {
        let mut req = request();
        req.params = r#"{"password":"hunter2"}"#.to_string();

        assert!(!format!("{req:?}").contains("hunter2"));
    }
}
