use std::path::{Path, PathBuf};

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::window::Breakpoints;

const MAX_RETENTION_CAPACITY: usize = 4096;

pub fn config_dir() -> Option<PathBuf> { dirs::config_dir().map(|dir| dir.join("stratum")) }

pub fn config_file() -> Option<PathBuf> { config_dir().map(|dir| dir.join("config.toml")) }

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub flatten: FlattenSettings,
    #[serde(default)]
    pub retention: RetentionSettings,
    #[serde(default)]
    pub window: WindowSettings,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy)]
#[serde(deny_unknown_fields)]
pub struct FlattenSettings {
    /// Z-order distance between two nesting levels. Entering surfaces of a
    /// transition sit at half this distance above the exiting one.
    #[serde(default = "default_z_increment")]
    pub z_increment: i32,
}

impl Default for FlattenSettings {
    fn default() -> Self { Self { z_increment: default_z_increment() } }
}

impl FlattenSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.z_increment < 2 {
            issues.push(format!(
                "flatten.z_increment must be at least 2 (got {})",
                self.z_increment
            ));
        } else if self.z_increment % 2 != 0 {
            issues.push(format!(
                "flatten.z_increment must be even so entering surfaces land between levels (got {})",
                self.z_increment
            ));
        }
        issues
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy)]
#[serde(deny_unknown_fields)]
pub struct RetentionSettings {
    /// Number of retained entries before LRU eviction kicks in.
    #[serde(default = "default_retention_capacity")]
    pub capacity: usize,
}

impl Default for RetentionSettings {
    fn default() -> Self { Self { capacity: default_retention_capacity() } }
}

impl RetentionSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.capacity == 0 {
            issues.push("retention.capacity must be at least 1".to_string());
        }
        if self.capacity > MAX_RETENTION_CAPACITY {
            issues.push(format!(
                "retention.capacity should not exceed {} (got {})",
                MAX_RETENTION_CAPACITY, self.capacity
            ));
        }
        issues
    }
}

/// Breakpoints separating compact, medium and expanded windows, in
/// density-independent units.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy)]
#[serde(deny_unknown_fields)]
pub struct WindowSettings {
    #[serde(default = "default_medium_width")]
    pub medium_width: f64,
    #[serde(default = "default_expanded_width")]
    pub expanded_width: f64,
    #[serde(default = "default_medium_height")]
    pub medium_height: f64,
    #[serde(default = "default_expanded_height")]
    pub expanded_height: f64,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            medium_width: default_medium_width(),
            expanded_width: default_expanded_width(),
            medium_height: default_medium_height(),
            expanded_height: default_expanded_height(),
        }
    }
}

impl WindowSettings {
    pub fn breakpoints(&self) -> Breakpoints {
        Breakpoints {
            medium_width: self.medium_width,
            expanded_width: self.expanded_width,
            medium_height: self.medium_height,
            expanded_height: self.expanded_height,
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let pairs = [
            ("width", self.medium_width, self.expanded_width),
            ("height", self.medium_height, self.expanded_height),
        ];
        for (axis, medium, expanded) in pairs {
            if !(medium.is_finite() && medium > 0.0) {
                issues.push(format!("window.medium_{axis} must be a positive number"));
            }
            if !(expanded.is_finite() && expanded > 0.0) {
                issues.push(format!("window.expanded_{axis} must be a positive number"));
            }
            if medium >= expanded {
                issues.push(format!(
                    "window.medium_{axis} ({medium}) must be less than window.expanded_{axis} ({expanded})"
                ));
            }
        }
        issues
    }
}

fn default_z_increment() -> i32 { 100 }

fn default_retention_capacity() -> usize { 16 }

fn default_medium_width() -> f64 { 600.0 }
fn default_expanded_width() -> f64 { 840.0 }
fn default_medium_height() -> f64 { 480.0 }
fn default_expanded_height() -> f64 { 900.0 }

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)?;
        Self::parse(&buf)
    }

    /// The configuration shipped with the crate.
    pub fn builtin() -> anyhow::Result<Config> {
        Self::parse(include_str!("../../stratum.default.toml"))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, toml_string.as_bytes())?;
        Ok(())
    }

    /// Validates the entire configuration and returns a list of issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        issues.extend(self.flatten.validate());
        issues.extend(self.retention.validate());
        issues.extend(self.window.validate());
        issues
    }

    fn parse(buf: &str) -> anyhow::Result<Config> {
        match toml::from_str::<Config>(buf) {
            Ok(config) => Ok(config),
            Err(e) => {
                let msg = e.to_string();
                match Self::suggest_field(&msg) {
                    Some(suggestion) => bail!("{msg}\nDid you mean `{suggestion}`?"),
                    None => bail!("{msg}"),
                }
            }
        }
    }

    // serde reports unknown fields as "unknown field `x`, expected `a`" or
    // "... expected one of `a`, `b`". Pick the closest expected name.
    fn suggest_field(err: &str) -> Option<String> {
        let needle = "unknown field `";
        let start = err.find(needle)? + needle.len();
        let rest = &err[start..];
        let unknown = &rest[..rest.find('`')?];

        let mut candidates = Vec::new();
        let mut tail = &rest[unknown.len() + 1..];
        while let Some(open) = tail.find('`') {
            let after = &tail[open + 1..];
            let Some(close) = after.find('`') else { break };
            candidates.push(&after[..close]);
            tail = &after[close + 1..];
        }

        candidates
            .into_iter()
            .map(|cand| (cand, Self::levenshtein(unknown, cand)))
            .filter(|(_, dist)| *dist <= 3)
            .min_by_key(|(_, dist)| *dist)
            .map(|(cand, _)| cand.to_string())
    }

    fn levenshtein(a: &str, b: &str) -> usize {
        let a_chars: Vec<char> = a.chars().collect();
        let b_chars: Vec<char> = b.chars().collect();
        let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
        let mut cur = vec![0usize; b_chars.len() + 1];
        for i in 1..=a_chars.len() {
            cur[0] = i;
            for j in 1..=b_chars.len() {
                let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
                cur[j] = (prev[j] + 1).min(cur[j - 1] + 1).min(prev[j - 1] + cost);
            }
            std::mem::swap(&mut prev, &mut cur);
        }
        prev[b_chars.len()]
    }
}
