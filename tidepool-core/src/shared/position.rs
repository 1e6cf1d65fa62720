//! Converts resume keys to and from opaque position tokens
//!
//! A token is built in three passes:
//!
//! 1. every field becomes `field=<tag><text>`, with the field name and the
//!    tagged value percent encoded separately, joined with `&`
//! 2. the joined text is base64 encoded
//! 3. the base64 text is percent encoded again so the token is safe to put in
//!    a URL query parameter
//!
//! Only string (`S`) and numeric (`N`) scalars can be part of a position.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use tracing::instrument;

use super::values::{parse_number, ResumeKey, Scalar};
use crate::client::Errors;

/// The longest token accepted by default
pub const DEFAULT_MAX_TOKEN_LEN: usize = 8 * 1024;

/// Encodes and decodes position tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionCodec {
    /// The longest token this codec will try to decode
    max_token_len: usize,
}

impl Default for PositionCodec {
    fn default() -> Self {
        PositionCodec {
            max_token_len: DEFAULT_MAX_TOKEN_LEN,
        }
    }
}

impl PositionCodec {
    /// Create a codec with a custom token length bound
    ///
    /// # Arguments
    ///
    /// * `max_token_len` - The longest token to accept when decoding
    #[must_use]
    pub fn new(max_token_len: usize) -> Self {
        PositionCodec { max_token_len }
    }

    /// The longest token this codec will decode
    #[must_use]
    pub fn max_token_len(&self) -> usize {
        self.max_token_len
    }

    /// Encode a resume key into a position token
    ///
    /// # Arguments
    ///
    /// * `key` - The key to encode
    #[instrument(name = "PositionCodec::encode", skip_all, fields(fields = key.len()), err(Debug))]
    pub fn encode(&self, key: &ResumeKey) -> Result<String, Errors> {
        // a position with no fields cannot point anywhere
        if key.is_empty() {
            return Err(Errors::CorruptPosition(
                "a position needs at least one key field".to_owned(),
            ));
        }
        let mut entries = Vec::with_capacity(key.len());
        for (field, value) in key.iter() {
            // tag this value by its kind
            let (tag, text) = match value {
                Scalar::S(text) => ('S', text),
                Scalar::N(text) => {
                    // a number we could not decode later is rejected now
                    if parse_number(text).is_none() {
                        return Err(Errors::InvalidNumber {
                            field: field.clone(),
                            text: text.clone(),
                        });
                    }
                    ('N', text)
                }
                other => {
                    return Err(Errors::UnsupportedScalarKind {
                        field: field.clone(),
                        kind: other.kind(),
                    })
                }
            };
            // escape the field and tagged value on their own so they can't break our delimiters
            let field = utf8_percent_encode(field, NON_ALPHANUMERIC);
            let tagged = format!("{tag}{text}");
            let value = utf8_percent_encode(&tagged, NON_ALPHANUMERIC);
            entries.push(format!("{field}={value}"));
        }
        // wrap the joined entries and make the result url safe
        let wrapped = STANDARD.encode(entries.join("&"));
        Ok(utf8_percent_encode(&wrapped, NON_ALPHANUMERIC).to_string())
    }

    /// Decode a position token back into a resume key
    ///
    /// # Arguments
    ///
    /// * `token` - The token to decode
    #[instrument(name = "PositionCodec::decode", skip_all, fields(len = token.len()), err(Debug))]
    pub fn decode(&self, token: &str) -> Result<ResumeKey, Errors> {
        if token.is_empty() {
            return Err(Errors::CorruptPosition("position token is empty".to_owned()));
        }
        if token.len() > self.max_token_len {
            return Err(Errors::CorruptPosition(format!(
                "position token is {} bytes but at most {} are accepted",
                token.len(),
                self.max_token_len
            )));
        }
        // our tokens only ever contain alphanumerics and escapes
        if let Some(bad) = token
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '%'))
        {
            return Err(Errors::CorruptPosition(format!(
                "position token contains {bad:?}"
            )));
        }
        // undo the url safe pass and then the base64 pass
        let wrapped = unescape(token)?;
        let raw = STANDARD.decode(wrapped.as_bytes())?;
        let joined = String::from_utf8(raw)?;
        let mut key = ResumeKey::new();
        for entry in joined.split('&') {
            // every entry must be exactly one field and one value
            let parts = entry.split('=').collect::<Vec<&str>>();
            let [field, value] = parts.as_slice() else {
                return Err(Errors::CorruptPosition(format!(
                    "entry {entry:?} is not a field=value pair"
                )));
            };
            let field = unescape(field)?;
            let value = unescape(value)?;
            // split the tag off of our value
            let mut chars = value.chars();
            let tag = chars.next();
            let text = chars.as_str();
            let scalar = match tag {
                Some('S') => Scalar::S(text.to_owned()),
                Some('N') => match parse_number(text) {
                    Some(_) => Scalar::N(text.to_owned()),
                    None => {
                        return Err(Errors::CorruptPosition(format!(
                            "field {field:?} is tagged numeric but holds {text:?}"
                        )))
                    }
                },
                _ => {
                    return Err(Errors::CorruptPosition(format!(
                        "field {field:?} has an unknown value tag"
                    )))
                }
            };
            if key.insert(field.clone(), scalar).is_some() {
                return Err(Errors::CorruptPosition(format!(
                    "field {field:?} appears more than once"
                )));
            }
        }
        Ok(key)
    }
}

/// Undo one percent encoding pass
///
/// # Arguments
///
/// * `escaped` - The escaped text
fn unescape(escaped: &str) -> Result<String, Errors> {
    match percent_decode_str(escaped).decode_utf8() {
        Ok(text) => Ok(text.into_owned()),
        Err(_) => Err(Errors::CorruptPosition(
            "escaped text is not valid utf-8".to_owned(),
        )),
    }
}

/// Encode a resume key with the default codec
///
/// # Arguments
///
/// * `key` - The key to encode
pub fn encode(key: &ResumeKey) -> Result<String, Errors> {
    PositionCodec::default().encode(key)
}

/// Decode a position token with the default codec
///
/// # Arguments
///
/// * `token` - The token to decode
pub fn decode(token: &str) -> Result<ResumeKey, Errors> {
    PositionCodec::default().decode(token)
}
