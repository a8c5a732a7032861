// Fixed rule tables and the matcher that applies them

use regex::Regex;
use std::sync::LazyLock;

/// Never allowed, regardless of context
pub const FORBIDDEN_COMMANDS: &[&str] = &[
    "rm -rf",
    "rm -fr",
    "format",
    "fdisk",
    "dd",
    "mkfs",
    ":(){ :|:& };:",
    "curl | bash",
    "wget | bash",
    "eval",
    "exec",
    "shutdown",
    "reboot",
];

/// System modification, needs human approval
pub const DANGEROUS_COMMANDS: &[&str] = &[
    "rm",
    "del",
    "rmdir",
    "git push",
    "git pull",
    "git merge",
    "chmod",
    "chown",
    "sudo",
    "su",
    "systemctl",
    "service",
];

/// Allowed with monitoring
pub const CAUTION_COMMANDS: &[&str] = &[
    "pip install",
    "pip uninstall",
    "pip3 install",
    "pip3 uninstall",
    "git add",
    "git commit",
    "cp",
    "copy",
    "mv",
    "move",
    "touch",
    "nano",
    "vim",
];

/// Known-safe command prefixes
pub const SAFE_COMMANDS: &[&str] = &[
    "python",
    "python3",
    "python -m",
    "pip",
    "ls",
    "dir",
    "cat",
    "type",
    "head",
    "tail",
    "mkdir",
    "cd",
    "pwd",
    "echo",
    "grep",
    "find",
    "wc",
    "sort",
    "uniq",
    "git status",
    "git diff",
    "git log",
    "pytest",
];

/// Names that must never be "installed" as packages
pub const BLOCKED_PACKAGES: &[&str] = &["subprocess", "os", "sys", "eval", "exec", "compile"];

/// Safer-alternative suggestions, looked up by substring in table order
pub const ALTERNATIVES: &[(&str, &str)] = &[
    ("rm -rf", "Use specific file deletion: rm filename.txt"),
    ("rm -fr", "Use specific file deletion: rm filename.txt"),
    ("sudo", "Run commands without elevated privileges"),
    ("| bash", "Download first, then review before executing"),
    ("| sh", "Download first, then review before executing"),
    ("rm", "Specify exact files to delete, avoid wildcards"),
];

/// Download piped straight into a shell
pub static PIPE_TO_SHELL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(curl|wget)\b[^|;&]*\|\s*(sudo\s+)?(ba|z|da)?sh\b")
        .expect("pipe-to-shell pattern is a valid regex")
});

pub static SAFE_PACKAGE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^[a-zA-Z][a-zA-Z0-9_-]*$",
        r"^[a-zA-Z][a-zA-Z0-9_-]*==[\d.]+$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("package pattern is a valid regex"))
    .collect()
});

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Lower-case and collapse runs of whitespace
pub fn normalize(command: &str) -> String {
    command
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Substring match where alphanumeric edges of `needle` may not be glued
/// to identifier characters in `haystack`. A needle ending in a flag token
/// also matches longer flag clusters (`rm -rf` hits `rm -rfv`). Both sides
/// must be normalized.
pub fn contains_rule(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let ends_with_flag = needle
        .rsplit(' ')
        .next()
        .is_some_and(|token| token.starts_with('-'));
    let guard_start = needle.chars().next().is_some_and(is_word_char);
    let guard_end = !ends_with_flag && needle.chars().next_back().is_some_and(is_word_char);

    haystack.match_indices(needle).any(|(idx, _)| {
        let before_ok =
            !guard_start || haystack[..idx].chars().next_back().is_none_or(|c| !is_word_char(c));
        let after_ok = !guard_end
            || haystack[idx + needle.len()..]
                .chars()
                .next()
                .is_none_or(|c| !is_word_char(c));
        before_ok && after_ok
    })
}

/// Prefix match that ends at a token boundary
pub fn starts_with_rule(haystack: &str, prefix: &str) -> bool {
    haystack.starts_with(prefix)
        && haystack[prefix.len()..]
            .chars()
            .next()
            .is_none_or(char::is_whitespace)
}

/// Split a command into words, honoring single quotes, double quotes and backslashes.
/// Returns `None` on an unterminated quote or trailing escape.
pub fn split_shell_words(command: &str) -> Option<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = command.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next()? {
                        '\'' => break,
                        other => current.push(other),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next()? {
                        '"' => break,
                        '\\' => {
                            let escaped = chars.next()?;
                            if !matches!(escaped, '"' | '\\' | '$' | '`') {
                                current.push('\\');
                            }
                            current.push(escaped);
                        }
                        other => current.push(other),
                    }
                }
            }
            '\\' => {
                in_word = true;
                current.push(chars.next()?);
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            other => {
                in_word = true;
                current.push(other);
            }
        }
    }

    if in_word {
        words.push(current);
    }
    Some(words)
}
