use std::collections::HashSet;
use std::sync::Arc;
use tonic::metadata::{AsciiMetadataValue, MetadataMap};
use tonic::{Response, Status};
use tracing::{debug, error};

use crate::auth::TokenIssuer;

/// Metadata key carrying the user token in both directions.
pub const TOKEN_METADATA: &str = "token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Mint a user when the token is missing or invalid.
    Lenient,
    /// Reject with `Unauthenticated` (and a fresh token) instead.
    Strict,
}

/// Identity resolved for one call, plus the token to hand back if one was
/// minted.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    user_id: Option<String>,
    issued: Option<AsciiMetadataValue>,
}

impl Caller {
    /// Caller of a public method; carries no identity.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn require_user(&self) -> Result<&str, Status> {
        self.user_id()
            .ok_or_else(|| Status::unauthenticated("authentication required"))
    }

    #[cfg(test)]
    fn issued_token(&self) -> Option<&str> {
        self.issued.as_ref().and_then(|v| v.to_str().ok())
    }

    pub fn respond<T>(&self, message: T) -> Response<T> {
        let mut response = Response::new(message);
        self.attach(response.metadata_mut());
        response
    }

    pub fn fail(&self, status: impl Into<Status>) -> Status {
        let mut status = status.into();
        self.attach(status.metadata_mut());
        status
    }

    fn attach(&self, metadata: &mut MetadataMap) {
        if let Some(token) = &self.issued {
            metadata.insert(TOKEN_METADATA, token.clone());
        }
    }
}

/// Metadata-based counterpart of the HTTP auth middleware.
pub struct RpcAuth {
    tokens: Arc<TokenIssuer>,
    public_methods: HashSet<String>,
}

impl RpcAuth {
    pub fn new<I, S>(tokens: Arc<TokenIssuer>, public_methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens,
            public_methods: public_methods.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_public(&self, method: &str) -> bool {
        self.public_methods.contains(method)
    }

    /// Resolve the caller of `method` under `policy`.
    ///
    /// Public methods skip token handling entirely.
    pub fn authenticate(
        &self,
        method: &str,
        policy: Policy,
        metadata: &MetadataMap,
    ) -> Result<Caller, Status> {
        if self.is_public(method) {
            return Ok(Caller::anonymous());
        }

        let presented = metadata
            .get(TOKEN_METADATA)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty());
        if let Some(token) = presented {
            match self.tokens.verify(token) {
                Ok(user_id) => {
                    return Ok(Caller {
                        user_id: Some(user_id),
                        issued: None,
                    })
                }
                Err(err) => debug!(method, error = %err, "Rejected token metadata"),
            }
        }

        let (user_id, token) = self.tokens.issue_new_user().map_err(|err| {
            error!(method, error = %err, "Failed to issue user token");
            Status::internal("internal server error")
        })?;
        let issued = AsciiMetadataValue::try_from(token.as_str()).map_err(|err| {
            error!(method, error = %err, "Issued token is not valid metadata");
            Status::internal("internal server error")
        })?;

        match policy {
            Policy::Lenient => Ok(Caller {
                user_id: Some(user_id),
                issued: Some(issued),
            }),
            Policy::Strict => {
                let caller = Caller {
                    user_id: None,
                    issued: Some(issued),
                };
                Err(caller.fail(Status::unauthenticated("authentication required")))
            }
        }
    }
}
