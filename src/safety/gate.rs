// SafetyGate - lexical risk classification of shell commands and file paths

use super::rules::{
    self, ALTERNATIVES, BLOCKED_PACKAGES, CAUTION_COMMANDS, DANGEROUS_COMMANDS,
    FORBIDDEN_COMMANDS, PIPE_TO_SHELL, SAFE_COMMANDS, SAFE_PACKAGE_PATTERNS,
};
use super::{RiskLevel, SafetyConfig, SafetyVerdict};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Pure command classifier. Holds no mutable state, so the same input
/// always yields the same verdict.
#[derive(Debug, Clone)]
pub struct SafetyGate {
    config: SafetyConfig,
    safe_prefixes: Vec<String>,
}

impl SafetyGate {
    pub fn new(config: SafetyConfig) -> Self {
        let safe_prefixes = SAFE_COMMANDS
            .iter()
            .map(|s| s.to_string())
            .chain(config.extra_safe_commands.iter().map(|s| rules::normalize(s)))
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            config,
            safe_prefixes,
        }
    }

    pub fn config(&self) -> &SafetyConfig {
        &self.config
    }

    /// Classify a command. `context` is recorded for audit only and never changes the verdict.
    pub fn classify(&self, command: &str, context: &str) -> SafetyVerdict {
        let normalized = rules::normalize(command);
        let verdict = self.classify_normalized(command, &normalized);

        debug!(
            command = %command.chars().take(100).collect::<String>(),
            context = %context.chars().take(100).collect::<String>(),
            risk = %verdict.risk_level,
            allowed = verdict.allowed,
            requires_approval = verdict.requires_approval,
            "command classified"
        );
        verdict
    }

    fn classify_normalized(&self, command: &str, normalized: &str) -> SafetyVerdict {
        if Self::is_forbidden(normalized) {
            return SafetyVerdict::forbidden(
                "Command contains forbidden operations",
                Self::suggest_alternative(normalized),
            );
        }

        if Self::matches_any(normalized, DANGEROUS_COMMANDS) {
            return SafetyVerdict::danger(
                "Command requires human approval due to system modification risk",
            );
        }

        if Self::matches_any(normalized, CAUTION_COMMANDS) {
            if self.is_package_install(normalized) {
                return self.validate_package_install(command);
            }
            return SafetyVerdict::caution("Command allowed with monitoring");
        }

        if self
            .safe_prefixes
            .iter()
            .any(|prefix| rules::starts_with_rule(normalized, prefix))
        {
            return SafetyVerdict::safe("Command is on safe list");
        }

        SafetyVerdict::warning("Unknown command pattern - requires validation")
    }

    fn is_forbidden(normalized: &str) -> bool {
        Self::matches_any(normalized, FORBIDDEN_COMMANDS) || PIPE_TO_SHELL.is_match(normalized)
    }

    fn matches_any(normalized: &str, table: &[&str]) -> bool {
        table
            .iter()
            .any(|entry| rules::contains_rule(normalized, entry))
    }

    fn is_package_install(&self, normalized: &str) -> bool {
        self.config
            .package_managers
            .iter()
            .any(|pm| rules::contains_rule(normalized, &format!("{} install", pm.to_lowercase())))
    }

    fn suggest_alternative(normalized: &str) -> Option<String> {
        ALTERNATIVES
            .iter()
            .find(|(pattern, _)| normalized.contains(pattern))
            .map(|(_, alternative)| alternative.to_string())
    }

    /// Validate a package manager install invocation token by token
    pub fn validate_package_install(&self, command: &str) -> SafetyVerdict {
        let Some(parts) = rules::split_shell_words(command.trim()) else {
            return SafetyVerdict::warning(
                "Could not parse package install command: unbalanced quoting",
            );
        };

        let manager_ok = parts.first().is_some_and(|first| {
            self.config
                .package_managers
                .iter()
                .any(|pm| pm.eq_ignore_ascii_case(first))
        });
        if parts.len() < 3 || !manager_ok || parts[1] != "install" {
            return SafetyVerdict::warning("Invalid package install command format");
        }

        let packages: Vec<&str> = parts[2..]
            .iter()
            .map(String::as_str)
            .filter(|token| !token.starts_with('-'))
            .collect();

        if packages.is_empty() {
            return SafetyVerdict::warning("Package install command names no packages");
        }

        for package in &packages {
            let bare = package.split("==").next().unwrap_or(package).to_lowercase();
            if BLOCKED_PACKAGES.contains(&bare.as_str()) {
                return SafetyVerdict::danger(format!(
                    "Package '{}' is potentially dangerous",
                    package
                ));
            }

            if !SAFE_PACKAGE_PATTERNS.iter().any(|p| p.is_match(package)) {
                return SafetyVerdict::warning(format!(
                    "Package name '{}' doesn't match safe patterns",
                    package
                ));
            }
        }

        SafetyVerdict::caution(format!(
            "Package installation approved: {}",
            packages.join(", ")
        ))
    }

    /// Restrict file mutation to allow-listed roots; system paths are always forbidden
    pub fn validate_file_operation(&self, path: &str, operation: &str) -> SafetyVerdict {
        let unified = path.replace('\\', "/").to_lowercase();

        let touches_system = self.config.system_directories.iter().any(|sys| {
            let sys = sys.replace('\\', "/").to_lowercase();
            touches_path(&unified, sys.trim_end_matches('/'))
        });
        if touches_system {
            return SafetyVerdict::forbidden("Access to system directories is forbidden", None);
        }

        let Some(normalized) = lexical_normalize(Path::new(path)) else {
            return SafetyVerdict::danger(format!(
                "File {} escapes the working directory: {}",
                operation, path
            ));
        };

        let inside_allowed = self.config.allowed_directories.iter().any(|dir| {
            lexical_normalize(Path::new(dir)).is_some_and(|root| normalized.starts_with(root))
        });

        if !inside_allowed {
            return SafetyVerdict::danger(format!(
                "File {} outside allowed directories: {}",
                operation, path
            ));
        }

        SafetyVerdict::safe("File operation within safe boundaries")
    }
}

impl Default for SafetyGate {
    fn default() -> Self {
        Self::new(SafetyConfig::default())
    }
}

/// Quick check: allowed without approval and no worse than CAUTION
pub fn is_command_safe(gate: &SafetyGate, command: &str) -> bool {
    let verdict = gate.classify(command, "");
    verdict.allowed && verdict.risk_level <= RiskLevel::Caution
}

/// Whether `path` contains the directory `dir` as a whole path segment run
fn touches_path(path: &str, dir: &str) -> bool {
    if dir.is_empty() {
        return false;
    }
    path.match_indices(dir).any(|(idx, _)| {
        let before_ok = dir.starts_with('/') || idx == 0 || path[..idx].ends_with('/');
        let after_ok = path[idx + dir.len()..]
            .chars()
            .next()
            .is_none_or(|c| c == '/');
        before_ok && after_ok
    })
}

/// Resolve `.` and `..` without touching the filesystem.
/// `None` when `..` climbs above the starting point.
fn lexical_normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                out.pop();
                depth -= 1;
            }
            Component::Normal(part) => {
                out.push(part);
                depth += 1;
            }
            other => out.push(other.as_os_str()),
        }
    }
    Some(out)
}
