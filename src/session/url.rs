//! Collector URL construction and parsing.
//!
//! The connection URL is built deterministically from a fixed template:
//!
//! ```text
//! wss://connect<-env>.{host}/client/v1?sessionId=..&token=..&orgId=..&clientId=..
//! ```
//!
//! where `<-env>` is empty for the production tier and `-<tier>` otherwise.
//! The same URL is persisted after a successful connect and parsed back on
//! process restart to resume the session.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::identifiers::{ClientId, SessionId};

// ============================================================================
// Environment
// ============================================================================

/// Deployment tier of the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Production tier; no host prefix.
    #[default]
    Prod,
    /// Staging tier.
    Stage,
    /// QA tier.
    Qa,
    /// Development tier.
    Dev,
}

impl Environment {
    /// Returns the host-name infix for this tier.
    ///
    /// Empty for production, `-<tier>` otherwise.
    #[inline]
    #[must_use]
    pub const fn url_prefix(&self) -> &'static str {
        match self {
            Self::Prod => "",
            Self::Stage => "-stage",
            Self::Qa => "-qa",
            Self::Dev => "-dev",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Prod => "prod",
            Self::Stage => "stage",
            Self::Qa => "qa",
            Self::Dev => "dev",
        };
        f.write_str(name)
    }
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prod" | "" => Ok(Self::Prod),
            "stage" => Ok(Self::Stage),
            "qa" => Ok(Self::Qa),
            "dev" => Ok(Self::Dev),
            _ => Err(()),
        }
    }
}

// ============================================================================
// URL Construction
// ============================================================================

/// Builds the collector connection URL.
///
/// `org_id` is taken raw and URL-encoded here; all other parameters are
/// identifier-safe.
#[must_use]
pub fn build_connection_url(
    host: &str,
    environment: Environment,
    session_id: &SessionId,
    token: &str,
    org_id: &str,
    client_id: &ClientId,
) -> String {
    format!(
        "wss://connect{prefix}.{host}/client/v1?sessionId={session}&token={token}&orgId={org}&clientId={client}",
        prefix = environment.url_prefix(),
        session = session_id,
        org = urlencoding::encode(org_id),
        client = client_id,
    )
}

// ============================================================================
// StoredSession
// ============================================================================

/// Session coordinates recovered from a persisted connection URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    /// The session identifier.
    pub session_id: SessionId,
    /// The authorization token.
    pub token: String,
    /// Organization identifier, if present (decoded).
    pub org_id: Option<String>,
    /// Deployment tier inferred from the host name.
    pub environment: Environment,
}

/// Parses a persisted connection URL back into session coordinates.
///
/// Returns `None` unless the URL is well-formed and contains both a
/// non-empty `sessionId` and a non-empty `token`; without both, no
/// reconnection is possible and the caller falls back to a fresh
/// authorization flow.
#[must_use]
pub fn parse_connection_url(stored: &str) -> Option<StoredSession> {
    let url = Url::parse(stored).ok()?;

    let mut session_id = None;
    let mut token = None;
    let mut org_id = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "sessionId" if !value.is_empty() => session_id = Some(value.into_owned()),
            "token" if !value.is_empty() => token = Some(value.into_owned()),
            "orgId" if !value.is_empty() => org_id = Some(value.into_owned()),
            _ => {}
        }
    }

    let environment = url
        .host_str()
        .and_then(|host| host.split('.').next())
        .and_then(|label| label.strip_prefix("connect"))
        .and_then(|tier| tier.strip_prefix('-').or(Some("")))
        .and_then(|tier| Environment::from_str(tier).ok())
        .unwrap_or_default();

    Some(StoredSession {
        session_id: SessionId::new(session_id?),
        token: token?,
        org_id,
        environment,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: &str = "relay.example.com";

    fn sample_url(env: Environment) -> String {
        build_connection_url(
            HOST,
            env,
            &SessionId::new("4ae99b2d-9c44-4b13-bb0a-d3a1f2b5ef63"),
            "8917",
            "ABC123@AdobeOrg",
            &ClientId::new("client-7"),
        )
    }

    #[test]
    fn test_production_url_has_no_tier_infix() {
        let url = sample_url(Environment::Prod);
        assert!(url.starts_with("wss://connect.relay.example.com/client/v1?"));
    }

    #[test]
    fn test_non_production_url_tier_infix() {
        let url = sample_url(Environment::Stage);
        assert!(url.starts_with("wss://connect-stage.relay.example.com/client/v1?"));

        let url = sample_url(Environment::Qa);
        assert!(url.starts_with("wss://connect-qa.relay.example.com/client/v1?"));
    }

    #[test]
    fn test_org_id_is_url_encoded() {
        let url = sample_url(Environment::Prod);
        assert!(url.contains("orgId=ABC123%40AdobeOrg"));
        assert!(!url.contains('@'));
    }

    #[test]
    fn test_query_parameter_set() {
        let url = sample_url(Environment::Prod);
        assert!(url.contains("sessionId=4ae99b2d-9c44-4b13-bb0a-d3a1f2b5ef63"));
        assert!(url.contains("token=8917"));
        assert!(url.contains("clientId=client-7"));
    }

    #[test]
    fn test_parse_round_trip() {
        let url = sample_url(Environment::Stage);
        let stored = parse_connection_url(&url).expect("parse");

        assert_eq!(stored.session_id.as_str(), "4ae99b2d-9c44-4b13-bb0a-d3a1f2b5ef63");
        assert_eq!(stored.token, "8917");
        // Decoded on the way back out
        assert_eq!(stored.org_id.as_deref(), Some("ABC123@AdobeOrg"));
        assert_eq!(stored.environment, Environment::Stage);
    }

    #[test]
    fn test_parse_production_environment() {
        let url = sample_url(Environment::Prod);
        let stored = parse_connection_url(&url).expect("parse");
        assert_eq!(stored.environment, Environment::Prod);
    }

    #[test]
    fn test_parse_rejects_missing_token() {
        let url = "wss://connect.relay.example.com/client/v1?sessionId=abc&orgId=x";
        assert!(parse_connection_url(url).is_none());
    }

    #[test]
    fn test_parse_rejects_missing_session_id() {
        let url = "wss://connect.relay.example.com/client/v1?token=8917";
        assert!(parse_connection_url(url).is_none());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_connection_url("not a url").is_none());
        assert!(parse_connection_url("").is_none());
    }

    #[test]
    fn test_environment_from_str() {
        assert_eq!("stage".parse::<Environment>(), Ok(Environment::Stage));
        assert_eq!("prod".parse::<Environment>(), Ok(Environment::Prod));
        assert!("mars".parse::<Environment>().is_err());
    }
}
