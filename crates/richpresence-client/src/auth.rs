//! Authorization over IPC.
//!
//! `AUTHORIZE` makes the peer show a consent prompt and returns an OAuth2
//! code. Turning that code into an access token is an HTTP call outside
//! this crate, supplied through [`TokenExchange`].

use richpresence_protocol::AuthorizeArgs;

use crate::connector::BoxFuture;
use crate::error::ClientResult;

/// Exchanges an authorization code for an access token.
///
/// Failures should be reported as [`crate::ClientError::TokenExchange`].
pub trait TokenExchange: Send + Sync {
    fn exchange_code<'a>(&'a self, code: &'a str) -> BoxFuture<'a, ClientResult<String>>;
}

/// Parameters of an authorization request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizeOptions {
    pub scopes: Vec<String>,
    /// `"none"` skips the consent prompt for already-authorized apps.
    pub prompt: Option<String>,
    pub rpc_token: Option<String>,
    /// Skips `AUTHORIZE` entirely when a token is already known.
    pub access_token: Option<String>,
}

impl AuthorizeOptions {
    pub fn new<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scopes: scopes.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Builder: set the prompt behaviour.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Builder: set an RPC token.
    pub fn with_rpc_token(mut self, token: impl Into<String>) -> Self {
        self.rpc_token = Some(token.into());
        self
    }

    /// Builder: reuse an access token from an earlier login.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub(crate) fn to_args(&self, client_id: &str) -> AuthorizeArgs {
        AuthorizeArgs {
            client_id: client_id.to_string(),
            scopes: self.scopes.clone(),
            prompt: self.prompt.clone(),
            rpc_token: self.rpc_token.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_args_wire_format() {
        let options = AuthorizeOptions::new(["rpc", "identify"]).with_prompt("none");
        insta::assert_json_snapshot!(options.to_args("123"), @r#"
        {
          "client_id": "123",
          "scopes": [
            "rpc",
            "identify"
          ],
          "prompt": "none"
        }
        "#);
    }

    #[test]
    fn builder_sets_tokens() {
        let options = AuthorizeOptions::new(Vec::<String>::new())
            .with_rpc_token("rpc-tok")
            .with_access_token("access-tok");
        assert!(options.scopes.is_empty());
        assert_eq!(options.rpc_token.as_deref(), Some("rpc-tok"));
        assert_eq!(options.access_token.as_deref(), Some("access-tok"));
    }
}
