use serde_json::Value;
use snafu::{Location, Snafu};

use crate::Located;

use super::Endpoint;

pub type Result<T, E = TikTokError> = ::std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TikTokError {
    #[snafu(display("`{field}` is not configured"))]
    Configuration {
        field: &'static str,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("authorization code exchange failed (HTTP {status}): {details}"))]
    TokenExchange {
        status: u16,
        details: Value,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("{endpoint} rejected the access token"))]
    Unauthorized {
        endpoint: Endpoint,
        details: Value,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("{endpoint} failed (HTTP {status}): {details}"))]
    Provider {
        endpoint: Endpoint,
        status: u16,
        details: Value,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("could not reach {endpoint}: {source}"))]
    Network {
        endpoint: Endpoint,
        source: reqwest::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("{endpoint} returned a malformed body: {source}"))]
    Decode {
        endpoint: Endpoint,
        status: u16,
        source: serde_json::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("statistics response is inconsistent: {reason}"))]
    AggregationInvariant {
        reason: String,
        #[snafu(implicit)]
        location: Location,
    },
}

impl TikTokError {
    /// Transport failures are worth one more attempt, everything else is final.
    pub fn is_network(&self) -> bool {
        matches!(self, TikTokError::Network { .. })
    }

    /// The raw provider payload, when the provider answered at all.
    pub fn details(&self) -> Option<&Value> {
        match self {
            TikTokError::TokenExchange { details, .. }
            | TikTokError::Unauthorized { details, .. }
            | TikTokError::Provider { details, .. } => Some(details),
            _ => None,
        }
    }

    /// HTTP status the provider answered with, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            TikTokError::TokenExchange { status, .. }
            | TikTokError::Provider { status, .. }
            | TikTokError::Decode { status, .. } => Some(*status),
            TikTokError::Unauthorized { .. } => Some(401),
            _ => None,
        }
    }
}

impl Located for TikTokError {
    fn location(&self) -> Location {
        match self {
            TikTokError::Configuration { location, .. }
            | TikTokError::TokenExchange { location, .. }
            | TikTokError::Unauthorized { location, .. }
            | TikTokError::Provider { location, .. }
            | TikTokError::Network { location, .. }
            | TikTokError::Decode { location, .. }
            | TikTokError::AggregationInvariant { location, .. } => *location,
        }
    }
}
