//! # Fully-qualified names
//!
//! Helpers to compose and decompose `package.Leaf` identifiers.
//!
//! Everything here is purely syntactic: identifiers are never validated, and malformed input
//! degrades to a leaf-only name instead of failing.

/// Joins a package and a service name (e.g. `my.pkg` + `Greeter` = `my.pkg.Greeter`).
///
/// An empty package never produces a leading `.`, and an empty service returns the package alone.
pub fn join_service_name(package: &str, service: &str) -> String {
    join(package, service)
}

/// Joins a package and a message name, following the same rules as [`join_service_name`].
pub fn join_message_name(package: &str, message: &str) -> String {
    join(package, message)
}

/// Splits a fully-qualified service name on its last `.`.
///
/// Returns `(package, service)`. Without any `.` the package is empty and the whole input is
/// the service name.
pub fn split_service_name(fqsn: &str) -> (&str, &str) {
    match fqsn.rfind('.') {
        Some(i) => (&fqsn[..i], &fqsn[i + 1..]),
        None => ("", fqsn),
    }
}

/// Splits a fully-qualified RPC name into `(service, method)`.
///
/// Both `package.Service/Method` and `package.Service.Method` are accepted.
/// Returns `None` when either half is empty.
pub fn split_rpc_name(fqrn: &str) -> Option<(&str, &str)> {
    let (service, method) = match fqrn.split_once('/') {
        Some(parts) => parts,
        None => {
            let i = fqrn.rfind('.')?;
            (&fqrn[..i], &fqrn[i + 1..])
        }
    };

    if service.is_empty() || method.is_empty() || method.contains('/') {
        return None;
    }

    Some((service, method))
}

fn join(package: &str, leaf: &str) -> String {
    match (package.is_empty(), leaf.is_empty()) {
        (true, true) => String::new(),
        (false, true) => package.to_string(),
        (true, false) => leaf.to_string(),
        (false, false) => format!("{package}.{leaf}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_service_name() {
        assert_eq!(join_service_name("", ""), "");
        assert_eq!(join_service_name("a", ""), "a");
        assert_eq!(join_service_name("", "b"), "b");
        assert_eq!(join_service_name("a", "b"), "a.b");
        assert_eq!(join_service_name("my.pkg.v1", "Greeter"), "my.pkg.v1.Greeter");
    }

    #[test]
    fn test_join_message_name() {
        assert_eq!(join_message_name("", ""), "");
        assert_eq!(join_message_name("echo", ""), "echo");
        assert_eq!(join_message_name("", "EchoRequest"), "EchoRequest");
        assert_eq!(join_message_name("echo", "EchoRequest"), "echo.EchoRequest");
    }

    #[test]
    fn test_split_service_name() {
        assert_eq!(split_service_name("a.b.C"), ("a.b", "C"));
        assert_eq!(split_service_name("C"), ("", "C"));
        assert_eq!(split_service_name(""), ("", ""));
        // Malformed input is still split syntactically
        assert_eq!(split_service_name("a..b"), ("a.", "b"));
        assert_eq!(split_service_name("trailing."), ("trailing", ""));
    }

    #[test]
    fn test_split_rpc_name() {
        assert_eq!(
            split_rpc_name("echo.EchoService/UnaryEcho"),
            Some(("echo.EchoService", "UnaryEcho"))
        );
        assert_eq!(
            split_rpc_name("echo.EchoService.UnaryEcho"),
            Some(("echo.EchoService", "UnaryEcho"))
        );
        assert_eq!(split_rpc_name("Svc/Method"), Some(("Svc", "Method")));
        assert_eq!(split_rpc_name("invalid-fqrn"), None);
        assert_eq!(split_rpc_name("echo.EchoService/"), None);
        assert_eq!(split_rpc_name("/UnaryEcho"), None);
        assert_eq!(split_rpc_name("a/b/c"), None);
        assert_eq!(split_rpc_name(""), None);
    }
}
