use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Extra request headers: a header name mapped to its ordered list of values.
///
/// Header names keep their insertion order and every value is transmitted, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(IndexMap<String, Vec<String>>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` after any value already registered for `key`.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    /// Replaces every value of `key`.
    pub fn set(&mut self, key: impl Into<String>, values: Vec<String>) {
        self.0.insert(key.into(), values);
    }

    /// All values registered for `key`, in insertion order.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Iterates over every `(key, value)` pair, keys in insertion order, values in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |v| (key.as_str(), v.as_str())))
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (key, value) in iter {
            headers.append(key, value);
        }
        headers
    }
}

/// Everything needed to build a [`super::Client`].
///
/// Empty strings and paths mean "not set".
#[derive(Debug, Clone, Default)]
pub struct ClientEndpoint {
    /// `host:port` of the server. May be empty for a degenerate gRPC-Web client.
    pub address: String,
    /// Overrides the name used to verify the server certificate (standard client only).
    pub server_name: String,
    /// Path prefix appended to the address of gRPC-Web requests.
    pub prefix: String,
    /// Selects the gRPC-Web client instead of the standard gRPC client.
    pub web: bool,
    /// Whether the schema should be discovered through server reflection.
    pub reflection: bool,
    /// Whether the connection is secured with TLS.
    pub tls: bool,
    pub ca_cert: PathBuf,
    pub cert: PathBuf,
    pub cert_key: PathBuf,
    /// Metadata attached to every call.
    pub headers: Headers,
    /// Deadline announced on every call.
    pub timeout: Option<Duration>,
}

impl ClientEndpoint {
    pub(crate) fn scheme(&self) -> &'static str {
        if self.tls { "https" } else { "http" }
    }

    /// The origin requests are sent to: scheme, address and, for gRPC-Web, the path prefix.
    ///
    /// An address that already carries a scheme is kept as is.
    pub fn origin(&self) -> String {
        let prefix = if self.web {
            self.prefix.trim_end_matches('/')
        } else {
            ""
        };

        if self.address.contains("://") {
            return format!("{}{}", self.address, prefix);
        }

        format!("{}://{}{}", self.scheme(), self.address, prefix)
    }
}
