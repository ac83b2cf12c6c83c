//! Per-run counters and the end-of-run report.

use serde::Serialize;

#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Entries in the input file
    entries: usize,

    /// Entries replaced with a DeepL translation in this run
    translated: usize,

    /// Entries written without an API call (empty, no Japanese, skip pattern)
    passthrough: usize,

    /// Entries whose translation was carried over from a previous run
    kept: usize,

    /// Translate requests that succeeded (retries not counted)
    batches: usize,

    /// Source characters sent to DeepL (what the quota is billed on)
    api_characters: usize,
}

impl RunStats {
    pub fn new(entries: usize) -> Self {
        Self {
            entries,
            ..Self::default()
        }
    }

    pub fn record_passthrough(&mut self) {
        self.passthrough += 1;
    }

    pub fn record_kept(&mut self) {
        self.kept += 1;
    }

    /// Record a successful batch of `texts`.
    pub fn record_batch<S: AsRef<str>>(&mut self, texts: &[S]) {
        self.batches += 1;
        self.translated += texts.len();
        self.api_characters += texts.iter().map(|t| t.as_ref().chars().count()).sum::<usize>();
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn translated(&self) -> usize {
        self.translated
    }

    pub fn passthrough(&self) -> usize {
        self.passthrough
    }

    pub fn kept(&self) -> usize {
        self.kept
    }

    pub fn batches(&self) -> usize {
        self.batches
    }

    pub fn api_characters(&self) -> usize {
        self.api_characters
    }

    /// Entries accounted for so far
    pub fn processed(&self) -> usize {
        self.translated + self.passthrough + self.kept
    }

    pub fn report(&self) -> StatsReport {
        let percent = |n: usize| {
            if self.entries > 0 {
                (n as f64 / self.entries as f64) * 100.0
            } else {
                0.0
            }
        };

        StatsReport {
            entries: self.entries,
            translated: self.translated,
            passthrough: self.passthrough,
            kept: self.kept,
            batches: self.batches,
            api_characters: self.api_characters,
            translated_percent: percent(self.translated),
            processed_percent: percent(self.processed()),
        }
    }
}

/// Summary of a run, suitable for logging or JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub entries: usize,
    pub translated: usize,
    pub passthrough: usize,
    pub kept: usize,
    pub batches: usize,
    pub api_characters: usize,
    /// Share of entries translated in this run (0-100)
    pub translated_percent: f64,
    /// Share of entries accounted for (0-100); below 100 after a failed run
    pub processed_percent: f64,
}

impl std::fmt::Display for StatsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} entries: {} translated, {} passed through, {} kept from previous output \
             ({} API calls, {} characters)",
            self.entries,
            self.translated,
            self.passthrough,
            self.kept,
            self.batches,
            self.api_characters
        )
    }
}
