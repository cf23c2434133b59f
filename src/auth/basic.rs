//! HTTP Basic authentication (RFC 2617 §2)

use super::{Authenticator, AUTHORIZATION};
use crate::error::{Error, Result};
use crate::secret::Secret;
use crate::types::Method;
use async_trait::async_trait;
use base64::Engine;
use std::any::Any;
use url::Url;

/// Basic authenticator: a user id and its secret
#[derive(Debug, Clone)]
pub struct Basic {
    user_id: String,
    secret: Secret,
}

impl Basic {
    pub const NAME: &'static str = "auth.Basic";

    /// Create a Basic authenticator. Both credentials must be non-empty.
    pub fn new(user_id: impl Into<String>, secret: impl Into<Secret>) -> Result<Self> {
        let user_id = user_id.into();
        let secret = secret.into();

        if user_id.is_empty() {
            return Err(Error::MissingUserId);
        }
        if secret.is_empty() {
            return Err(Error::MissingSecret);
        }

        Ok(Self { user_id, secret })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

#[async_trait]
impl Authenticator for Basic {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn update(&self) -> Result<()> {
        Ok(())
    }

    fn header(&self, _method: &Method, _url: &Url, _body: &[u8]) -> Result<(String, String)> {
        Ok((
            AUTHORIZATION.to_string(),
            format!("Basic {}", basic_user_pass(&self.user_id, self.secret.expose())),
        ))
    }

    fn clone_box(&self) -> Box<dyn Authenticator> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Base64 of `user_id:secret`, the Basic credential token
pub fn basic_user_pass(user_id: &str, secret: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(format!("{user_id}:{secret}"))
}
