//! Auth Definitions
//!
//! Authentication information used when invoking functions. The shape of
//! `properties` depends on `scheme`:
//!
//! ```yaml
//! auth:
//!   - name: petstore
//!     scheme: basic
//!     properties:
//!       username: admin
//!       password: "${ $SECRETS.petstorePassword }"
//!   - name: billing
//!     scheme: bearer
//!     properties: billingToken     # string shorthand: a secret name
//! ```
//!
//! In memory the scheme is carried by the [`AuthProperties`] variant, so a
//! scheme and a mismatched properties payload cannot coexist.

use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

use super::Object;

/// Supported authentication schemes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    #[default]
    Basic,
    Bearer,
    #[serde(rename = "oauth2")]
    OAuth2,
}

impl AuthScheme {
    /// Wire name of the scheme.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Bearer => "bearer",
            Self::OAuth2 => "oauth2",
        }
    }

    /// Parses a wire name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "basic" => Some(Self::Basic),
            "bearer" => Some(Self::Bearer),
            "oauth2" => Some(Self::OAuth2),
            _ => None,
        }
    }

    pub const ACCEPTED: &'static str = "basic, bearer, oauth2";
}

/// A named authentication definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Auth {
    pub name: String,
    pub properties: AuthProperties,
}

impl Auth {
    pub fn new(name: impl Into<String>, properties: AuthProperties) -> Self {
        Self {
            name: name.into(),
            properties,
        }
    }

    pub fn scheme(&self) -> AuthScheme {
        self.properties.scheme()
    }
}

impl Serialize for Auth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut auth = serializer.serialize_struct("Auth", 3)?;
        auth.serialize_field("name", &self.name)?;
        auth.serialize_field("scheme", &self.scheme())?;
        auth.serialize_field("properties", &self.properties)?;
        auth.end()
    }
}

/// Scheme-specific auth payload.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum AuthProperties {
    Basic(BasicAuthProperties),
    Bearer(BearerAuthProperties),
    OAuth2(OAuth2AuthProperties),
}

impl AuthProperties {
    pub fn scheme(&self) -> AuthScheme {
        match self {
            Self::Basic(_) => AuthScheme::Basic,
            Self::Bearer(_) => AuthScheme::Bearer,
            Self::OAuth2(_) => AuthScheme::OAuth2,
        }
    }

    /// Empty payload for `scheme`.
    pub fn empty(scheme: AuthScheme) -> Self {
        match scheme {
            AuthScheme::Basic => Self::Basic(BasicAuthProperties::default()),
            AuthScheme::Bearer => Self::Bearer(BearerAuthProperties::default()),
            AuthScheme::OAuth2 => Self::OAuth2(OAuth2AuthProperties::default()),
        }
    }

    /// Builds the payload for `scheme` that only names a secret.
    pub fn from_secret(scheme: AuthScheme, secret: impl Into<String>) -> Self {
        let secret = Some(secret.into());
        let mut properties = Self::empty(scheme);
        match &mut properties {
            Self::Basic(p) => p.secret = secret,
            Self::Bearer(p) => p.secret = secret,
            Self::OAuth2(p) => p.secret = secret,
        }
        properties
    }

    /// Secret the credentials are read from, if any.
    pub fn secret(&self) -> Option<&str> {
        match self {
            Self::Basic(p) => p.secret.as_deref(),
            Self::Bearer(p) => p.secret.as_deref(),
            Self::OAuth2(p) => p.secret.as_deref(),
        }
    }

    /// True when credentials are given inline rather than via a secret.
    pub fn has_inline_credentials(&self) -> bool {
        match self {
            Self::Basic(p) => p.username.is_some() || p.password.is_some(),
            Self::Bearer(p) => p.token.is_some(),
            Self::OAuth2(p) => p.grant_type.is_some() || p.client_id.is_some(),
        }
    }

    /// Inline credential fields the scheme requires but which are missing.
    pub fn missing_inline_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        match self {
            Self::Basic(p) => {
                if p.username.is_none() {
                    missing.push("username");
                }
                if p.password.is_none() {
                    missing.push("password");
                }
            }
            Self::Bearer(p) => {
                if p.token.is_none() {
                    missing.push("token");
                }
            }
            Self::OAuth2(p) => {
                if p.grant_type.is_none() {
                    missing.push("grantType");
                }
                if p.client_id.is_none() {
                    missing.push("clientId");
                }
            }
        }
        missing
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct BasicAuthProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Object>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct BearerAuthProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Object>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// OAuth2 grant types.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum GrantType {
    Password,
    ClientCredentials,
    TokenExchange,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct OAuth2AuthProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Object>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub authority: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant_type: Option<GrantType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub audiences: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_subject: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_issuer: Option<String>,
}
