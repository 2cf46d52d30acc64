use colored::*;
use grepl_core::{config::DefaultConfig, tonic::Status};

/// A wrapper struct for a formatted, colored string.
///
/// Implements `Display` so it can be printed directly.
pub struct FormattedString(pub String);

pub struct PackageList(pub Vec<String>);

pub struct ServiceList(pub Vec<String>);

/// The default target of a session.
pub struct Defaults<'a>(pub &'a DefaultConfig);

impl std::fmt::Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.0)?;
        Ok(())
    }
}

impl From<serde_json::Value> for FormattedString {
    fn from(value: serde_json::Value) -> Self {
        FormattedString(serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()))
    }
}

impl From<Status> for FormattedString {
    fn from(status: Status) -> Self {
        FormattedString(format!(
            "{} code={:?} message={:?}",
            "gRPC Failed:".red().bold(),
            status.code(),
            status.message()
        ))
    }
}

impl From<anyhow::Error> for FormattedString {
    fn from(err: anyhow::Error) -> Self {
        FormattedString(format!("{}\n\n'{:#}'", "Error:".red().bold(), err))
    }
}

impl From<PackageList> for FormattedString {
    fn from(PackageList(packages): PackageList) -> Self {
        if packages.is_empty() {
            return FormattedString("No packages found.".yellow().to_string());
        }

        let mut out = String::from("Available Packages:\n");
        for pkg in packages {
            let name = if pkg.is_empty() {
                "(no package)".dimmed()
            } else {
                pkg.green()
            };
            out.push_str(&format!("  - {name}\n"));
        }
        FormattedString(out.trim_end().to_string())
    }
}

impl From<ServiceList> for FormattedString {
    fn from(ServiceList(services): ServiceList) -> Self {
        if services.is_empty() {
            return FormattedString("No services found.".yellow().to_string());
        }

        let mut out = String::from("Available Services:\n");
        for svc in services {
            out.push_str(&format!("  - {}\n", svc.green()));
        }
        FormattedString(out.trim_end().to_string())
    }
}

impl From<Defaults<'_>> for FormattedString {
    fn from(Defaults(defaults): Defaults<'_>) -> Self {
        let show = |value: &str| {
            if value.is_empty() {
                "(unset)".dimmed()
            } else {
                value.green()
            }
        };

        FormattedString(format!(
            "{} {}\n{} {}",
            "package:".cyan(),
            show(&defaults.package),
            "service:".cyan(),
            show(&defaults.service)
        ))
    }
}
