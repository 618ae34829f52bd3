//! Level thresholds and noise suppression applied before formatting

use crate::domain::{Level, LoggerOverride, NoiseFilterConfig};

/// Decides which records reach the formatter
#[derive(Debug, Clone)]
pub struct RecordFilter {
    default_level: Level,
    /// Sorted longest prefix first
    overrides: Vec<LoggerOverride>,
    noise_prefixes: Vec<String>,
    /// Lowercased
    noise_fragments: Vec<String>,
}

impl RecordFilter {
    pub fn new(default_level: Level, overrides: &[LoggerOverride], noise: &NoiseFilterConfig) -> Self {
        let mut overrides = overrides.to_vec();
        overrides.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));

        Self {
            default_level,
            overrides,
            noise_prefixes: noise.logger_prefixes.clone(),
            noise_fragments: noise.message_fragments.iter().map(|f| f.to_lowercase()).collect(),
        }
    }

    /// Minimum level for `logger`: the longest matching override, else the
    /// default
    pub fn threshold_for(&self, logger: &str) -> Level {
        self.overrides
            .iter()
            .find(|o| is_dotted_prefix(&o.prefix, logger))
            .map(|o| o.level)
            .unwrap_or(self.default_level)
    }

    pub fn enabled(&self, logger: &str, level: Level) -> bool {
        level >= self.threshold_for(logger)
    }

    pub fn is_noise(&self, logger: &str, message: &str) -> bool {
        if self.noise_prefixes.iter().any(|p| is_dotted_prefix(p, logger)) {
            return true;
        }
        if self.noise_fragments.is_empty() {
            return false;
        }
        let message = message.to_lowercase();
        self.noise_fragments.iter().any(|f| message.contains(f.as_str()))
    }
}

/// `app.db` is a prefix of `app.db` and `app.db.pool`, not of `app.dbx`
fn is_dotted_prefix(prefix: &str, name: &str) -> bool {
    match name.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('.'),
        None => false,
    }
}
