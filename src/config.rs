use regex::Regex;
use serde::Deserialize;

/// Interceptor configuration. Patterns are compiled once here; a malformed
/// pattern is a startup error, never a per-request one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    /// Include header maps in both the request and response records.
    #[serde(default)]
    pub log_headers: bool,
    /// Calls whose path matches are passed through untouched.
    #[serde(default, deserialize_with = "deserialize_ignore_patterns")]
    pub ignore_patterns: Option<Regex>,
}

impl AuditConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_headers(mut self, log_headers: bool) -> Self {
        self.log_headers = log_headers;
        self
    }

    pub fn with_ignore_patterns(mut self, pattern: &str) -> anyhow::Result<Self> {
        self.ignore_patterns = Some(compile_pattern(pattern)?);
        Ok(self)
    }

    pub fn ignores(&self, path: &str) -> bool {
        self.ignore_patterns
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(path))
    }
}

// Whole-path match: "/admin" must not exempt "/administrator".
fn compile_pattern(pattern: &str) -> anyhow::Result<Regex> {
    Ok(Regex::new(&format!("^(?:{pattern})$"))?)
}

fn deserialize_ignore_patterns<'de, D>(deserializer: D) -> Result<Option<Regex>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let pattern: Option<String> = Deserialize::deserialize(deserializer)?;
    match pattern {
        Some(pattern) => compile_pattern(&pattern)
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}
