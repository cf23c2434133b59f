//! HTTP Digest authentication
//!
//! Implements the response computation of RFC 7616 §3.4 and keeps the
//! RFC 2069 §2.1.2 form for servers that send no `qop`.

use super::{Authenticator, AUTHORIZATION};
use crate::error::{Error, Result};
use crate::secret::Secret;
use crate::types::Method;
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256, Sha512, Sha512_256};
use std::any::Any;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// RFC 5987 `attr-char`: everything else is percent-encoded
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

// ============================================================================
// Algorithm and QOP
// ============================================================================

/// Digest hash algorithm (RFC 7616 §6.1, plus SHA-512)
///
/// Session variants hash with the same function as their base algorithm;
/// they only change how A1 is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DigestAlgorithm {
    #[default]
    Md5,
    Md5Sess,
    Sha256,
    Sha256Sess,
    Sha512Trunc256,
    Sha512Trunc256Sess,
    Sha512,
    Sha512Sess,
}

impl DigestAlgorithm {
    pub const ALL: [DigestAlgorithm; 8] = [
        DigestAlgorithm::Md5,
        DigestAlgorithm::Md5Sess,
        DigestAlgorithm::Sha256,
        DigestAlgorithm::Sha256Sess,
        DigestAlgorithm::Sha512Trunc256,
        DigestAlgorithm::Sha512Trunc256Sess,
        DigestAlgorithm::Sha512,
        DigestAlgorithm::Sha512Sess,
    ];

    /// Token as written in the `algorithm` directive
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "MD5",
            DigestAlgorithm::Md5Sess => "MD5-sess",
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha256Sess => "SHA-256-sess",
            DigestAlgorithm::Sha512Trunc256 => "SHA-512-256",
            DigestAlgorithm::Sha512Trunc256Sess => "SHA-512-256-sess",
            DigestAlgorithm::Sha512 => "SHA-512",
            DigestAlgorithm::Sha512Sess => "SHA-512-sess",
        }
    }

    pub fn is_session(&self) -> bool {
        matches!(
            self,
            DigestAlgorithm::Md5Sess
                | DigestAlgorithm::Sha256Sess
                | DigestAlgorithm::Sha512Trunc256Sess
                | DigestAlgorithm::Sha512Sess
        )
    }

    /// Lowercase hex digest of `data`
    pub fn hash(&self, data: &[u8]) -> String {
        match self {
            DigestAlgorithm::Md5 | DigestAlgorithm::Md5Sess => {
                format!("{:x}", md5::compute(data))
            }
            DigestAlgorithm::Sha256 | DigestAlgorithm::Sha256Sess => {
                hex::encode(Sha256::digest(data))
            }
            DigestAlgorithm::Sha512Trunc256 | DigestAlgorithm::Sha512Trunc256Sess => {
                hex::encode(Sha512_256::digest(data))
            }
            DigestAlgorithm::Sha512 | DigestAlgorithm::Sha512Sess => {
                hex::encode(Sha512::digest(data))
            }
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DigestAlgorithm::ALL
            .into_iter()
            .find(|algo| algo.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownAlgorithm {
                name: s.to_string(),
            })
    }
}

impl TryFrom<String> for DigestAlgorithm {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DigestAlgorithm> for String {
    fn from(algo: DigestAlgorithm) -> Self {
        algo.as_str().to_string()
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quality of protection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Qop {
    /// Authentication only
    Auth,
    /// Authentication with body integrity
    AuthInt,
}

impl Qop {
    pub fn as_str(&self) -> &'static str {
        match self {
            Qop::Auth => "auth",
            Qop::AuthInt => "auth-int",
        }
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// Directives of the `Authorization: Digest` header (RFC 7616 §3.4)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestParameters {
    pub algorithm: DigestAlgorithm,
    /// Protection space
    pub realm: String,
    /// Request target, as sent by the client
    pub uri: String,
    /// `None` selects the RFC 2069 response form
    pub qop: Option<Qop>,
    /// Server nonce
    pub nonce: String,
    /// Client nonce
    pub cnonce: String,
    /// Nonce count, 8 hex digits
    pub nc: String,
    pub userhash: bool,
    pub opaque: String,
}

impl DigestParameters {
    pub fn hash(&self, data: &[u8]) -> String {
        self.algorithm.hash(data)
    }
}

/// One `key=value` directive of the header
struct Directive {
    key: &'static str,
    value: String,
    quoted: bool,
    extended: bool,
}

impl Directive {
    fn plain(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
            quoted: false,
            extended: false,
        }
    }

    fn quoted(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            quoted: true,
            ..Self::plain(key, value)
        }
    }
}

/// Join directives with `", "`, skipping empty values
fn render(directives: &[Directive]) -> String {
    directives
        .iter()
        .filter(|d| !d.value.is_empty())
        .map(|d| {
            let star = if d.extended { "*" } else { "" };
            if d.quoted {
                format!("{}{star}=\"{}\"", d.key, d.value)
            } else {
                format!("{}{star}={}", d.key, d.value)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7e).contains(&b))
}

// ============================================================================
// Authenticator
// ============================================================================

/// Digest authenticator
#[derive(Debug, Clone)]
pub struct Digest {
    username: String,
    secret: Secret,
    parameters: DigestParameters,
}

impl Digest {
    pub const NAME: &'static str = "auth.Digest";

    /// Create a Digest authenticator.
    ///
    /// Username, secret, realm, nonce and uri must be non-empty.
    pub fn new(
        username: impl Into<String>,
        secret: impl Into<Secret>,
        parameters: DigestParameters,
    ) -> Result<Self> {
        let username = username.into();
        let secret = secret.into();

        if username.is_empty() {
            return Err(Error::MissingUserId);
        }
        if secret.is_empty() {
            return Err(Error::MissingSecret);
        }
        if parameters.realm.is_empty() {
            return Err(Error::MissingRealm);
        }
        if parameters.nonce.is_empty() {
            return Err(Error::MissingNonce);
        }
        if parameters.uri.is_empty() {
            return Err(Error::MissingUri);
        }

        Ok(Self {
            username,
            secret,
            parameters,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn parameters(&self) -> &DigestParameters {
        &self.parameters
    }

    /// Mutable access, e.g. to bump `nc` or take a new server nonce
    pub fn parameters_mut(&mut self) -> &mut DigestParameters {
        &mut self.parameters
    }

    /// A1 (RFC 7616 §3.4.2). Session algorithms bind the nonces into it.
    pub fn a1(&self) -> String {
        let p = &self.parameters;
        let a1 = format!("{}:{}:{}", self.username, p.realm, self.secret.expose());

        if p.algorithm.is_session() {
            format!("{}:{}:{}", p.hash(a1.as_bytes()), p.nonce, p.cnonce)
        } else {
            a1
        }
    }

    /// A2 (RFC 7616 §3.4.3). `auth-int` binds the body hash into it.
    pub fn a2(&self, method: &Method, body: &[u8]) -> String {
        let p = &self.parameters;
        match p.qop {
            Some(Qop::AuthInt) => format!("{method}:{}:{}", p.uri, p.hash(body)),
            _ => format!("{method}:{}", p.uri),
        }
    }

    /// Unhashed response string (RFC 7616 §3.4.1, or RFC 2069 without qop)
    pub fn response(&self, a1: &str, a2: &str) -> String {
        let p = &self.parameters;
        let ha1 = p.hash(a1.as_bytes());
        let ha2 = p.hash(a2.as_bytes());

        match p.qop {
            Some(qop) => format!(
                "{ha1}:{}:{}:{}:{}:{ha2}",
                p.nonce,
                p.nc,
                p.cnonce,
                qop.as_str()
            ),
            None => format!("{ha1}:{}:{ha2}", p.nonce),
        }
    }

    fn username_directive(&self) -> Directive {
        let p = &self.parameters;
        if p.userhash {
            let hashed = p.hash(format!("{}:{}", self.username, p.realm).as_bytes());
            Directive::quoted("username", hashed)
        } else if is_printable_ascii(&self.username) {
            Directive::quoted("username", self.username.clone())
        } else {
            // RFC 7616 §4 / RFC 5987 extended notation
            Directive {
                extended: true,
                ..Directive::plain(
                    "username",
                    format!("UTF-8''{}", utf8_percent_encode(&self.username, ATTR_CHAR)),
                )
            }
        }
    }
}

#[async_trait]
impl Authenticator for Digest {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn update(&self) -> Result<()> {
        Ok(())
    }

    fn header(&self, method: &Method, _url: &Url, body: &[u8]) -> Result<(String, String)> {
        let p = &self.parameters;
        let a1 = self.a1();
        let a2 = self.a2(method, body);
        let response = p.hash(self.response(&a1, &a2).as_bytes());

        let directives = [
            Directive::quoted("uri", p.uri.clone()),
            Directive::plain("algorithm", p.algorithm.as_str()),
            Directive::quoted("response", response),
            Directive::quoted("realm", p.realm.clone()),
            Directive::quoted("nonce", p.nonce.clone()),
            Directive::plain("nc", p.nc.clone()),
            Directive::quoted("cnonce", p.cnonce.clone()),
            Directive::plain("qop", p.qop.map(|q| q.as_str()).unwrap_or_default()),
            Directive::quoted("opaque", p.opaque.clone()),
            Directive::plain("userhash", p.userhash.to_string()),
            self.username_directive(),
        ];

        Ok((AUTHORIZATION.to_string(), format!("Digest {}", render(&directives))))
    }

    fn clone_box(&self) -> Box<dyn Authenticator> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
