//! Serde model of the proxy engine's configuration document.
//!
//! The engine's admin API exchanges one JSON document describing the
//! entire HTTP app. Optional sub-blocks are expressed by field
//! presence, not boolean flags; most importantly the upstream TLS
//! block, whose absence means "plaintext upstream".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Admin endpoint the engine itself listens on.
pub const ADMIN_LISTEN: &str = "0.0.0.0:2019";

/// Public listeners of the main HTTP server.
pub const SERVER_LISTEN: [&str; 2] = [":80", ":443"];

/// The full live configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub admin: AdminConfig,
    pub apps: Apps,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminConfig {
    pub listen: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Apps {
    pub http: HttpApp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpApp {
    pub servers: Servers,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Servers {
    pub main: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen: Vec<String>,
    pub automatic_https: AutomaticHttps,
    pub routes: Vec<RouteFragment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomaticHttps {
    pub disable: bool,
}

/// One hostname's match predicate and handler chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteFragment {
    /// Absent on the wire means "match everything".
    #[serde(rename = "match", default, skip_serializing_if = "Vec::is_empty")]
    pub matchers: Vec<HostMatcher>,
    pub handle: Vec<HandlerStage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostMatcher {
    pub host: Vec<String>,
}

/// One step in a route's processing chain.
///
/// The engine discriminates on the `handler` field; subroute nesting is
/// kept so documents produced by the engine itself (or imported from
/// older installs) parse cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "handler", rename_all = "snake_case")]
pub enum HandlerStage {
    ReverseProxy {
        upstreams: Vec<Upstream>,
        #[serde(skip_serializing_if = "Option::is_none")]
        headers: Option<ProxyHeaders>,
        #[serde(skip_serializing_if = "Option::is_none")]
        transport: Option<Transport>,
    },
    StaticResponse {
        status_code: u16,
        headers: BTreeMap<String, Vec<String>>,
    },
    Authentication {
        providers: AuthProviders,
    },
    Subroute {
        routes: Vec<RouteFragment>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Upstream {
    pub dial: String,
}

/// Request-header rewrites applied before dialing the upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyHeaders {
    pub request: HeaderSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderSet {
    pub set: BTreeMap<String, Vec<String>>,
}

/// Upstream transport block.
///
/// `tls` is `Some` iff the upstream should be dialed over TLS; the
/// wire format has no boolean for this, only block presence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transport {
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsTransport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub versions: Option<Vec<TransportVersion>>,
}

/// Empty marker block; presence alone enables TLS to the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TlsTransport {}

/// HTTP protocol versions the upstream transport may negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportVersion {
    #[serde(rename = "h1")]
    H1,
    #[serde(rename = "h2")]
    H2,
    #[serde(rename = "h2c")]
    H2c,
    #[serde(rename = "h3")]
    H3,
}

/// Authentication provider block for the basic-auth handler stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthProviders {
    pub http_basic: HttpBasicAuth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpBasicAuth {
    pub accounts: Vec<BasicAuthAccount>,
    pub hash: HashAlgorithm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicAuthAccount {
    pub username: String,
    /// Salted hash, never a plaintext password.
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashAlgorithm {
    pub algorithm: String,
}

impl Document {
    /// Empty document with the process-wide listener defaults.
    pub fn base(routes: Vec<RouteFragment>) -> Self {
        Self {
            admin: AdminConfig {
                listen: ADMIN_LISTEN.to_string(),
            },
            apps: Apps {
                http: HttpApp {
                    servers: Servers {
                        main: ServerConfig {
                            listen: SERVER_LISTEN.iter().map(|s| s.to_string()).collect(),
                            automatic_https: AutomaticHttps { disable: false },
                            routes,
                        },
                    },
                },
            },
        }
    }

    pub fn routes(&self) -> &[RouteFragment] {
        &self.apps.http.servers.main.routes
    }

    pub fn routes_mut(&mut self) -> &mut Vec<RouteFragment> {
        &mut self.apps.http.servers.main.routes
    }

    /// Whether any route's host matcher includes the given hostname.
    pub fn has_route_for(&self, host: &str) -> bool {
        self.routes().iter().any(|route| route.matches_host(host))
    }

    /// Drop every route whose host matcher includes the given hostname.
    /// Returns how many routes were removed.
    pub fn remove_routes_for(&mut self, host: &str) -> usize {
        let routes = self.routes_mut();
        let before = routes.len();
        routes.retain(|route| !route.matches_host(host));
        before - routes.len()
    }
}

impl RouteFragment {
    pub fn matches_host(&self, host: &str) -> bool {
        self.matchers
            .iter()
            .any(|m| m.host.iter().any(|h| h == host))
    }

    /// First hostname in the match predicate, if any.
    pub fn primary_host(&self) -> Option<&str> {
        self.matchers
            .iter()
            .flat_map(|m| m.host.iter())
            .next()
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(host: &str) -> RouteFragment {
        RouteFragment {
            matchers: vec![HostMatcher {
                host: vec![host.to_string()],
            }],
            handle: vec![HandlerStage::StaticResponse {
                status_code: 301,
                headers: BTreeMap::new(),
            }],
        }
    }

    #[test]
    fn host_lookup_and_removal() {
        let mut doc = Document::base(vec![fragment("a.example.com"), fragment("b.example.com")]);
        assert!(doc.has_route_for("a.example.com"));
        assert!(!doc.has_route_for("c.example.com"));

        assert_eq!(doc.remove_routes_for("a.example.com"), 1);
        assert!(!doc.has_route_for("a.example.com"));
        assert_eq!(doc.routes().len(), 1);
    }

    #[test]
    fn handler_tag_round_trip() {
        let stage = HandlerStage::ReverseProxy {
            upstreams: vec![Upstream {
                dial: "10.0.0.5:8080".to_string(),
            }],
            headers: None,
            transport: Some(Transport {
                protocol: "http".to_string(),
                tls: Some(TlsTransport::default()),
                versions: None,
            }),
        };

        let json = serde_json::to_value(&stage).unwrap();
        assert_eq!(json["handler"], "reverse_proxy");
        assert_eq!(json["transport"]["tls"], serde_json::json!({}));
        assert!(json["transport"].get("versions").is_none());

        let back: HandlerStage = serde_json::from_value(json).unwrap();
        assert_eq!(back, stage);
    }

    #[test]
    fn tls_block_absent_when_none() {
        let transport = Transport {
            protocol: "http".to_string(),
            tls: None,
            versions: None,
        };
        let json = serde_json::to_value(&transport).unwrap();
        assert!(json.get("tls").is_none());
    }

    #[test]
    fn parses_engine_subroute_documents() {
        let raw = serde_json::json!({
            "admin": { "listen": "0.0.0.0:2019" },
            "apps": { "http": { "servers": { "main": {
                "listen": [":80", ":443"],
                "automatic_https": { "disable": false },
                "routes": [{
                    "match": [{ "host": ["old.example.com"] }],
                    "handle": [{
                        "handler": "subroute",
                        "routes": [{
                            "match": [{ "host": ["old.example.com"] }],
                            "handle": [{
                                "handler": "static_response",
                                "status_code": 301,
                                "headers": { "Location": ["https://new.example.com{http.request.uri}"] }
                            }]
                        }]
                    }]
                }]
            }}}}
        });

        let doc: Document = serde_json::from_value(raw).unwrap();
        assert!(doc.has_route_for("old.example.com"));
    }
}
