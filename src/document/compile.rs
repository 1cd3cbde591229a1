//! Route compilation: registry records → document fragments.
//!
//! # Responsibilities
//! - Translate one [`DomainRecord`] into a route fragment
//! - Decompose imported fragments back into records
//!
//! # Design Decisions
//! - Pure and side-effect free; deterministic for the same input
//! - `redirect_url` presence is authoritative: a record compiles to a
//!   redirect route or a proxy route, never both
//! - Missing destination/port on a proxy record is a contract violation
//!   (request validation happens upstream), surfaced as `InvalidRecord`

use std::collections::BTreeMap;

use thiserror::Error;

use crate::document::types::{
    AuthProviders, BasicAuthAccount, HandlerStage, HashAlgorithm, HeaderSet, HostMatcher,
    HttpBasicAuth, ProxyHeaders, RouteFragment, TlsTransport, Transport, Upstream,
};
use crate::registry::record::{BasicAuthCredential, DomainRecord};

/// Path/query-preserving placeholder the engine expands at request time.
const REQUEST_URI_PLACEHOLDER: &str = "{http.request.uri}";

/// Compilation contract violations. These indicate a caller bug, not
/// bad user input.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("record for {host} is not compilable: {reason}")]
    InvalidRecord { host: String, reason: &'static str },
}

/// Failures turning an imported route fragment back into a record.
#[derive(Debug, Error)]
pub enum DecomposeError {
    #[error("route has no host matcher")]
    MissingHost,

    #[error("route for {host} has no recognizable terminal handler")]
    UnrecognizedHandler { host: String },

    #[error("route for {host} has malformed upstream dial '{dial}'")]
    MalformedDial { host: String, dial: String },
}

/// Compile one registry record into its route fragment.
pub fn compile_route(record: &DomainRecord) -> Result<RouteFragment, CompileError> {
    let handle = match record.redirect_target() {
        Some(target) => vec![redirect_stage(target, record.enable_https)],
        None => {
            if record.destination_address.trim().is_empty() {
                return Err(CompileError::InvalidRecord {
                    host: record.incoming_address.clone(),
                    reason: "proxy record has no destination address",
                });
            }
            if record.port == 0 {
                return Err(CompileError::InvalidRecord {
                    host: record.incoming_address.clone(),
                    reason: "proxy record has no upstream port",
                });
            }

            let mut chain = Vec::with_capacity(2);
            if let Some(auth) = &record.basic_auth {
                chain.push(auth_stage(auth));
            }
            chain.push(proxy_stage(record));
            chain
        }
    };

    Ok(RouteFragment {
        matchers: vec![HostMatcher {
            host: vec![record.incoming_address.clone()],
        }],
        handle,
    })
}

fn redirect_stage(target: &str, enable_https: bool) -> HandlerStage {
    let scheme = if enable_https { "https" } else { "http" };
    let mut headers = BTreeMap::new();
    headers.insert(
        "Location".to_string(),
        vec![format!("{scheme}://{target}{REQUEST_URI_PLACEHOLDER}")],
    );
    HandlerStage::StaticResponse {
        status_code: 301,
        headers,
    }
}

fn proxy_stage(record: &DomainRecord) -> HandlerStage {
    let mut set = BTreeMap::new();
    set.insert(
        "Host".to_string(),
        vec!["{http.reverse_proxy.upstream.hostport}".to_string()],
    );
    set.insert(
        "X-Origin-Host".to_string(),
        vec!["{http.reverse_proxy.upstream.host}".to_string()],
    );
    set.insert(
        "X-Origin-IP".to_string(),
        vec!["{http.reverse_proxy.upstream.address}".to_string()],
    );

    HandlerStage::ReverseProxy {
        upstreams: vec![Upstream {
            dial: format!("{}:{}", record.destination_address, record.port),
        }],
        headers: Some(ProxyHeaders {
            request: HeaderSet { set },
        }),
        transport: Some(Transport {
            protocol: "http".to_string(),
            tls: record.enable_https.then(TlsTransport::default),
            versions: record.transport_versions.clone(),
        }),
    }
}

fn auth_stage(credential: &BasicAuthCredential) -> HandlerStage {
    HandlerStage::Authentication {
        providers: AuthProviders {
            http_basic: HttpBasicAuth {
                accounts: vec![BasicAuthAccount {
                    username: credential.username.clone(),
                    password: credential.password_hash.clone(),
                }],
                hash: HashAlgorithm {
                    algorithm: "bcrypt".to_string(),
                },
            },
        },
    }
}

/// Turn an imported route fragment back into a registry record.
///
/// Subroute nesting is flattened before inspecting the chain, so
/// documents written by older installs (which wrapped redirects in a
/// subroute) decompose the same as flat ones.
pub fn decompose_route(fragment: &RouteFragment) -> Result<DomainRecord, DecomposeError> {
    let host = fragment
        .primary_host()
        .ok_or(DecomposeError::MissingHost)?
        .to_string();

    let mut basic_auth = None;
    for stage in flatten_stages(&fragment.handle) {
        match stage {
            HandlerStage::ReverseProxy {
                upstreams,
                transport,
                ..
            } => {
                let dial = upstreams
                    .first()
                    .map(|u| u.dial.as_str())
                    .unwrap_or_default();
                let (destination, port) =
                    split_dial(dial).ok_or_else(|| DecomposeError::MalformedDial {
                        host: host.clone(),
                        dial: dial.to_string(),
                    })?;

                let mut record = DomainRecord::proxy(&host, destination, port);
                record.enable_https = transport.as_ref().is_some_and(|t| t.tls.is_some());
                record.transport_versions =
                    transport.as_ref().and_then(|t| t.versions.clone());
                record.basic_auth = basic_auth;
                return Ok(record);
            }
            HandlerStage::StaticResponse { headers, .. } => {
                let location = headers
                    .get("Location")
                    .and_then(|values| values.first())
                    .ok_or_else(|| DecomposeError::UnrecognizedHandler { host: host.clone() })?;
                let (target, https) = parse_redirect_location(location);
                let mut record = DomainRecord::redirect(&host, &target);
                record.enable_https = https;
                return Ok(record);
            }
            HandlerStage::Authentication { providers } => {
                basic_auth = providers.http_basic.accounts.first().map(|account| {
                    BasicAuthCredential::from_hash(&account.username, &account.password)
                });
            }
            HandlerStage::Subroute { .. } => unreachable!("flattened above"),
        }
    }

    Err(DecomposeError::UnrecognizedHandler { host })
}

/// Depth-first walk over the handler chain with subroutes inlined.
fn flatten_stages(stages: &[HandlerStage]) -> Vec<&HandlerStage> {
    let mut out = Vec::new();
    for stage in stages {
        match stage {
            HandlerStage::Subroute { routes } => {
                for route in routes {
                    out.extend(flatten_stages(&route.handle));
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn split_dial(dial: &str) -> Option<(&str, u16)> {
    let (addr, port) = dial.rsplit_once(':')?;
    if addr.is_empty() {
        return None;
    }
    port.parse().ok().map(|port| (addr, port))
}

/// Recover `(target, enable_https)` from a compiled Location header.
fn parse_redirect_location(location: &str) -> (String, bool) {
    let (https, rest) = match location.strip_prefix("https://") {
        Some(rest) => (true, rest),
        None => (false, location.strip_prefix("http://").unwrap_or(location)),
    };
    let target = rest.strip_suffix(REQUEST_URI_PLACEHOLDER).unwrap_or(rest);
    (target.to_string(), https)
}
