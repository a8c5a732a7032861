// Safety configuration

use super::SafetyConfigError;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Policy knobs for the safety gate. The command rule tables are fixed;
/// only these lists can be extended.
#[derive(Debug, Clone)]
pub struct SafetyConfig {
    /// Directory roots where file mutation is permitted
    pub allowed_directories: Vec<String>,
    /// Paths that may never be touched
    pub system_directories: Vec<String>,
    /// Executables treated as package managers by the install validator
    pub package_managers: Vec<String>,
    /// Additional known-safe command prefixes
    pub extra_safe_commands: Vec<String>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            allowed_directories: vec![
                "ai_workspace".to_string(),
                "generated_code".to_string(),
                "temp".to_string(),
            ],
            system_directories: vec![
                "/etc".to_string(),
                "/sys".to_string(),
                "/proc".to_string(),
                "/boot".to_string(),
                "/dev".to_string(),
                r"C:\Windows".to_string(),
                r"C:\System".to_string(),
            ],
            package_managers: vec!["pip".to_string(), "pip3".to_string()],
            extra_safe_commands: Vec::new(),
        }
    }
}

/// On-disk policy file, every table optional
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PolicyFile {
    extra_safe_commands: Vec<String>,
    allowed_directories: Vec<String>,
    system_directories: Vec<String>,
}

impl SafetyConfig {
    /// Defaults extended by the TOML policy at `path`. A missing file is not an error.
    pub fn load(path: &Path) -> Result<Self, SafetyConfigError> {
        let mut config = Self::default();

        if !path.exists() {
            debug!(path = %path.display(), "safety policy not found, using defaults");
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|source| SafetyConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        config.merge_policy(&content)?;

        debug!(
            path = %path.display(),
            extra_safe = config.extra_safe_commands.len(),
            allowed_dirs = config.allowed_directories.len(),
            "loaded safety policy"
        );
        Ok(config)
    }

    /// Load from the path named by `SAFETY_POLICY_PATH`, default `safety.toml`
    pub fn from_env() -> Result<Self, SafetyConfigError> {
        let path = crate::env::string_env_var("SAFETY_POLICY_PATH", "safety.toml");
        Self::load(Path::new(&path))
    }

    fn merge_policy(&mut self, content: &str) -> Result<(), SafetyConfigError> {
        let policy: PolicyFile = toml::from_str(content)?;
        extend_unique(&mut self.extra_safe_commands, policy.extra_safe_commands);
        extend_unique(&mut self.allowed_directories, policy.allowed_directories);
        extend_unique(&mut self.system_directories, policy.system_directories);
        Ok(())
    }

    /// Permit file mutation under `dir` as well
    pub fn allow_directory(&mut self, dir: impl Into<String>) {
        extend_unique(&mut self.allowed_directories, [dir.into()]);
    }
}

fn extend_unique(target: &mut Vec<String>, items: impl IntoIterator<Item = String>) {
    for item in items {
        if !target.contains(&item) {
            target.push(item);
        }
    }
}
