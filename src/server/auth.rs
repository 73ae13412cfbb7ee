//! Stream token validation and issuance.
//!
//! Stream links carry an HS256 JWT minted by the catalog. The token binds one
//! content id and, for catalog content, a quality/season/episode selection.
//! A token may additionally bind a file reference id: a request for exactly
//! that id is a bundle request and is authorized even though it differs from
//! the token's content id.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use rand::RngCore;
use reelstream_common::{ContentReference, Error, MediaType, Result};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const JWT_ALGORITHM: &str = "HS256";

#[derive(Debug, Serialize, Deserialize)]
struct JwtHeader {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// Claims carried by a stream token.
///
/// Ids may arrive as JSON strings or numbers. When both `expiry` and `exp`
/// are present the earlier one applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawClaims")]
pub struct StreamClaims {
    /// Content id the token was issued for.
    pub id: String,
    /// File reference id that may be requested directly (bundle override).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    /// `movie`, `show` (or `tv`), or `bundle`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_number: Option<u32>,
    /// Expiry as Unix seconds.
    pub expiry: f64,
}

/// Wire form of [`StreamClaims`] before ids and expiry are normalized.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawClaims {
    #[serde(deserialize_with = "id_text")]
    id: String,
    #[serde(default, deserialize_with = "optional_id_text")]
    file_id: Option<String>,
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default)]
    quality_index: Option<u32>,
    #[serde(default)]
    season_number: Option<u32>,
    #[serde(default)]
    episode_number: Option<u32>,
    #[serde(default)]
    expiry: Option<f64>,
    #[serde(default)]
    exp: Option<f64>,
}

impl TryFrom<RawClaims> for StreamClaims {
    type Error = String;

    fn try_from(raw: RawClaims) -> std::result::Result<Self, Self::Error> {
        let expiry = match (raw.expiry, raw.exp) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => return Err("missing field `expiry`".to_string()),
        };
        Ok(Self {
            id: raw.id,
            file_id: raw.file_id,
            media_type: raw.media_type,
            quality_index: raw.quality_index,
            season_number: raw.season_number,
            episode_number: raw.episode_number,
            expiry,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl From<IdValue> for String {
    fn from(value: IdValue) -> Self {
        match value {
            IdValue::Text(text) => text,
            IdValue::Integer(n) => n.to_string(),
            IdValue::Float(n) => n.to_string(),
        }
    }
}

fn id_text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    IdValue::deserialize(deserializer).map(String::from)
}

fn optional_id_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    Option::<IdValue>::deserialize(deserializer).map(|id| id.map(String::from))
}

impl StreamClaims {
    /// Claims for `reference`, valid for `ttl_secs` from now.
    pub fn for_reference(reference: &ContentReference, ttl_secs: u64) -> Self {
        Self {
            id: reference.content_id.clone(),
            file_id: reference.file_reference_id.clone(),
            media_type: Some(reference.media_type.as_str().to_string()),
            quality_index: Some(reference.quality_index),
            season_number: reference.season_number,
            episode_number: reference.episode_number,
            expiry: now_secs() + ttl_secs as f64,
        }
    }
}

/// Selection parameters from the query string.
///
/// These are defaults only; token claims override them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestedSelection {
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub quality_index: Option<u32>,
    #[serde(default)]
    pub season_number: Option<u32>,
    #[serde(default)]
    pub episode_number: Option<u32>,
}

/// Validates and issues stream tokens with a shared secret.
#[derive(Clone)]
pub struct TokenAuthority {
    secret: Vec<u8>,
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority").finish_non_exhaustive()
    }
}

impl TokenAuthority {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self) -> Result<HmacSha256> {
        if self.secret.is_empty() {
            return Err(Error::auth("no token secret configured"));
        }
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| Error::internal(format!("invalid HMAC key: {}", e)))
    }

    /// Sign `claims` into a compact JWT.
    pub fn issue(&self, claims: &StreamClaims) -> Result<String> {
        let header = JwtHeader {
            alg: JWT_ALGORITHM.to_string(),
            typ: Some("JWT".to_string()),
        };
        let header = serde_json::to_vec(&header)
            .map_err(|e| Error::internal(format!("token header: {}", e)))?;
        let payload = serde_json::to_vec(claims)
            .map_err(|e| Error::internal(format!("token claims: {}", e)))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", signing_input, signature))
    }

    /// Check signature, algorithm, and expiry, and return the claims.
    ///
    /// Every failure is `AuthRejected`; the reason is only logged.
    pub fn validate(&self, token: &str) -> Result<StreamClaims> {
        let mut parts = token.trim().split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::auth("malformed token"));
        };

        let header: JwtHeader = decode_segment(header)?;
        if header.alg != JWT_ALGORITHM {
            return Err(Error::auth(format!("unsupported algorithm {}", header.alg)));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| Error::auth("malformed signature"))?;
        let mut mac = self.mac()?;
        mac.update(header_and_payload(token).as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| Error::auth("bad signature"))?;

        let claims: StreamClaims = decode_segment(payload)?;
        if claims.expiry <= now_secs() {
            return Err(Error::auth("token expired"));
        }

        Ok(claims)
    }

    /// Decide what a request for `requested_id` may stream.
    pub fn authorize(
        &self,
        token: &str,
        requested_id: &str,
        selection: &RequestedSelection,
    ) -> Result<ContentReference> {
        let claims = self.validate(token)?;
        resolve_reference(&claims, requested_id, selection)
    }
}

/// Apply the token's scope to a request.
///
/// - `requested_id == claims.file_id`: bundle request for that file
/// - `requested_id != claims.id`: rejected
/// - otherwise the claims' selection wins over the query string
pub fn resolve_reference(
    claims: &StreamClaims,
    requested_id: &str,
    selection: &RequestedSelection,
) -> Result<ContentReference> {
    if claims.file_id.as_deref() == Some(requested_id) {
        return Ok(ContentReference::bundle(requested_id));
    }

    if claims.id != requested_id {
        return Err(Error::auth(format!(
            "token for {} used for {}",
            claims.id, requested_id
        )));
    }

    let media_type = claims
        .media_type
        .as_deref()
        .or(selection.media_type.as_deref())
        .ok_or_else(|| Error::auth("no media type in token or request"))?
        .parse::<MediaType>()
        .map_err(Error::auth)?;

    if media_type == MediaType::Bundle {
        return Ok(ContentReference::bundle(requested_id));
    }

    Ok(ContentReference {
        content_id: requested_id.to_string(),
        file_reference_id: claims.file_id.clone(),
        media_type,
        quality_index: claims
            .quality_index
            .or(selection.quality_index)
            .unwrap_or(0),
        season_number: claims.season_number.or(selection.season_number),
        episode_number: claims.episode_number.or(selection.episode_number),
    })
}

fn header_and_payload(token: &str) -> &str {
    let token = token.trim();
    match token.rfind('.') {
        Some(idx) => &token[..idx],
        None => token,
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|_| Error::auth("malformed token segment"))?;
    serde_json::from_slice(&bytes).map_err(|e| Error::auth(format!("bad token segment: {}", e)))
}

fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Generate a random secret for signing stream tokens.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
