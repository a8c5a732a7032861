// ErrorDiagnoser - maps raw stderr to a category and remediation hints

use super::ErrorCategory;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Ordered indicator table. The first row with a matching needle wins.
const CATEGORY_TABLE: &[(ErrorCategory, &[&str])] = &[
    (
        ErrorCategory::MissingModule,
        &["modulenotfounderror", "no module named", "cannot find module"],
    ),
    (ErrorCategory::SyntaxError, &["syntaxerror"]),
    (ErrorCategory::IndentationError, &["indentationerror"]),
    (ErrorCategory::NameError, &["nameerror"]),
    (ErrorCategory::TypeError, &["typeerror"]),
    (ErrorCategory::ValueError, &["valueerror"]),
    (ErrorCategory::FileNotFound, &["filenotfounderror"]),
    (ErrorCategory::PermissionError, &["permissionerror"]),
];

/// Import names whose installable distribution is named differently.
const PACKAGE_ALIASES: &[(&str, &str)] = &[
    ("cv2", "opencv-python"),
    ("PIL", "pillow"),
    ("sklearn", "scikit-learn"),
    ("yaml", "pyyaml"),
    ("bs4", "beautifulsoup4"),
];

static MISSING_MODULE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"No module named '([^']+)'",
        r"ModuleNotFoundError: No module named '([^']+)'",
        r"ImportError: No module named ([^\s']+)",
        r"Cannot find module '([^']+)'",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("missing-module pattern is a valid regex"))
    .collect()
});

/// Stateless stderr analyzer
#[derive(Debug, Clone)]
pub struct ErrorDiagnoser {
    /// Package manager named in install suggestions
    package_manager: String,
}

impl ErrorDiagnoser {
    pub fn new(package_manager: impl Into<String>) -> Self {
        Self {
            package_manager: package_manager.into(),
        }
    }

    /// Classify stderr into a coarse category (case-insensitive, first match wins)
    pub fn classify(&self, stderr: &str) -> ErrorCategory {
        let lower = stderr.to_lowercase();
        CATEGORY_TABLE
            .iter()
            .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
            .map(|(category, _)| *category)
            .unwrap_or(ErrorCategory::UnknownError)
    }

    /// Category-specific advice; for missing modules the exact install command comes first
    pub fn suggest_fixes(&self, stderr: &str, command: &str) -> Vec<String> {
        let category = self.classify(stderr);
        let mut fixes = Vec::new();

        if category == ErrorCategory::MissingModule {
            if let Some(package) = self.extract_missing_packages(stderr).into_iter().next() {
                fixes.push(format!(
                    "Install missing module: {} install {}",
                    self.package_manager, package
                ));
            }
        }

        fixes.extend(self.fixes_for(category));

        if category == ErrorCategory::FileNotFound && !command.is_empty() {
            fixes.push(format!(
                "Paths used by `{}` resolve relative to the workspace directory",
                command
            ));
        }

        debug!(category = %category, fix_count = fixes.len(), "diagnosed stderr");
        fixes
    }

    /// Canned advice for a category, engine-level categories included
    pub fn fixes_for(&self, category: ErrorCategory) -> Vec<String> {
        let fixes: &[&str] = match category {
            ErrorCategory::MissingModule => &["Add the missing dependency or remove the import"],
            ErrorCategory::SyntaxError => &[
                "Check Python syntax - look for missing colons, parentheses, or quotes",
                "Verify indentation is consistent",
            ],
            ErrorCategory::IndentationError => &[
                "Fix indentation - use consistent spaces or tabs",
                "Check that code blocks are properly indented",
            ],
            ErrorCategory::NameError => &[
                "Define the name before it is used or fix its spelling",
                "Check that the required import is present",
            ],
            ErrorCategory::TypeError => &[
                "Check argument types and counts at the failing call",
                "Convert values explicitly before combining them",
            ],
            ErrorCategory::ValueError => &[
                "Validate input values before converting or unpacking them",
            ],
            ErrorCategory::FileNotFound => &[
                "Check that the file path is correct",
                "Ensure the file exists in the expected location",
            ],
            ErrorCategory::PermissionError => &[
                "Check file permissions",
                "Ensure you have write access to the target directory",
            ],
            ErrorCategory::Timeout => &[
                "Check for infinite loops or code waiting on interactive input",
                "Increase the execution timeout for long-running work",
            ],
            ErrorCategory::SafetyViolation => &[
                "Rewrite the command without destructive or privileged operations",
            ],
            ErrorCategory::UserDenied => &["Revise the command so it no longer needs approval"],
            ErrorCategory::ExecutionError => &[
                "Check that the interpreter and shell are installed and on PATH",
            ],
            ErrorCategory::PythonExecutionError => {
                &["Check file permissions", "Verify Python installation"]
            }
            ErrorCategory::UnknownError => {
                &["Unrecognized error - inspect the full output manually"]
            }
        };
        fixes.iter().map(|s| s.to_string()).collect()
    }

    /// Union of every missing-module pattern, normalized to installable names,
    /// de-duplicated in first-seen order
    pub fn extract_missing_packages(&self, stderr: &str) -> Vec<String> {
        let mut packages: Vec<String> = Vec::new();

        for pattern in MISSING_MODULE_PATTERNS.iter() {
            for caps in pattern.captures_iter(stderr) {
                let Some(raw) = caps.get(1).map(|m| m.as_str()) else {
                    continue;
                };
                if let Some(name) = normalize_package_name(raw)
                    && !packages.contains(&name)
                {
                    packages.push(name);
                }
            }
        }

        packages
    }
}

impl Default for ErrorDiagnoser {
    fn default() -> Self {
        Self::new("pip")
    }
}

/// Reduce an import path to the distribution to install
fn normalize_package_name(raw: &str) -> Option<String> {
    let raw = raw.trim();
    // relative imports and file paths are never installable
    if raw.is_empty() || raw.starts_with('.') || raw.starts_with('/') {
        return None;
    }

    let top_level = raw.split('.').next().unwrap_or(raw);
    let name = PACKAGE_ALIASES
        .iter()
        .find(|(import, _)| *import == top_level)
        .map(|(_, dist)| dist.to_string())
        .unwrap_or_else(|| top_level.to_string());

    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagnoser() -> ErrorDiagnoser {
        ErrorDiagnoser::default()
    }

    #[test]
    fn test_classify_missing_module() {
        let stderr = "Traceback (most recent call last):\n  File \"a.py\", line 1\nModuleNotFoundError: No module named 'requests'";
        assert_eq!(diagnoser().classify(stderr), ErrorCategory::MissingModule);
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        assert_eq!(
            diagnoser().classify("SYNTAXERROR: invalid syntax"),
            ErrorCategory::SyntaxError
        );
    }

    #[test]
    fn test_classify_order_prefers_earlier_rows() {
        // mentions both; missing module is earlier in the table
        let stderr = "ImportError: No module named foo\nTypeError: bad";
        assert_eq!(diagnoser().classify(stderr), ErrorCategory::MissingModule);
    }

    #[test]
    fn test_classify_each_category() {
        let d = diagnoser();
        assert_eq!(d.classify("IndentationError: unexpected indent"), ErrorCategory::IndentationError);
        assert_eq!(d.classify("NameError: name 'x' is not defined"), ErrorCategory::NameError);
        assert_eq!(d.classify("TypeError: unsupported operand"), ErrorCategory::TypeError);
        assert_eq!(d.classify("ValueError: invalid literal"), ErrorCategory::ValueError);
        assert_eq!(d.classify("FileNotFoundError: [Errno 2]"), ErrorCategory::FileNotFound);
        assert_eq!(d.classify("PermissionError: [Errno 13]"), ErrorCategory::PermissionError);
        assert_eq!(d.classify("Segmentation fault"), ErrorCategory::UnknownError);
    }

    #[test]
    fn test_suggest_fixes_missing_module_first_is_install() {
        let fixes = diagnoser().suggest_fixes("ModuleNotFoundError: No module named 'numpy'", "python3 a.py");
        assert_eq!(fixes[0], "Install missing module: pip install numpy");
    }

    #[test]
    fn test_suggest_fixes_known_category_non_empty() {
        let fixes = diagnoser().suggest_fixes("ValueError: oops", "python3 a.py");
        assert!(!fixes.is_empty());
    }

    #[test]
    fn test_suggest_fixes_unknown_is_generic() {
        let fixes = diagnoser().suggest_fixes("something odd happened", "python3 a.py");
        assert_eq!(fixes.len(), 1);
        assert!(fixes[0].contains("manually"));
    }

    #[test]
    fn test_extract_missing_packages_dedup() {
        let stderr = "ModuleNotFoundError: No module named 'foo'\nNo module named 'foo'\nNo module named 'bar'";
        let packages = diagnoser().extract_missing_packages(stderr);
        assert_eq!(packages, vec!["foo".to_string(), "bar".to_string()]);
    }

    #[test]
    fn test_extract_missing_packages_legacy_import_error() {
        let packages = diagnoser().extract_missing_packages("ImportError: No module named yaml");
        assert_eq!(packages, vec!["pyyaml".to_string()]);
    }

    #[test]
    fn test_extract_missing_packages_dotted_and_alias() {
        let stderr = "No module named 'sklearn.linear_model'\nNo module named 'cv2'";
        let packages = diagnoser().extract_missing_packages(stderr);
        assert_eq!(packages, vec!["scikit-learn".to_string(), "opencv-python".to_string()]);
    }

    #[test]
    fn test_extract_missing_packages_node() {
        let stderr = "Error: Cannot find module 'express'\nError: Cannot find module './local'";
        let packages = diagnoser().extract_missing_packages(stderr);
        assert_eq!(packages, vec!["express".to_string()]);
    }

    #[test]
    fn test_extract_missing_packages_none() {
        assert!(diagnoser().extract_missing_packages("all good").is_empty());
    }
}
