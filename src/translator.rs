use crate::config::Config;
use crate::deepl::DeepLClient;
use crate::filter::PassthroughFilter;
use crate::mtool::TranslationFile;
use crate::retry::RetryConfig;
use crate::stats::{RunStats, StatsReport};
use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// What happens to one entry of the input file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryAction {
    /// Send the key to DeepL
    Translate,
    /// Write without an API call
    Passthrough,
    /// Reuse the translation found in the previous output
    Kept,
}

/// Per-entry actions, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    actions: Vec<EntryAction>,
}

impl Plan {
    pub fn actions(&self) -> &[EntryAction] {
        &self.actions
    }

    /// Positions of the entries that need a DeepL request.
    pub fn pending_indices(&self) -> Vec<usize> {
        self.indices_of(EntryAction::Translate)
    }

    pub fn count(&self, action: EntryAction) -> usize {
        self.actions.iter().filter(|a| **a == action).count()
    }

    fn indices_of(&self, action: EntryAction) -> Vec<usize> {
        self.actions
            .iter()
            .enumerate()
            .filter(|(_, a)| **a == action)
            .map(|(i, _)| i)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Keep translations already present in the output file
    pub resume: bool,
    /// Plan only: no API calls, no writes
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub report: StatsReport,
    pub output_file: PathBuf,
    /// Entries that still need DeepL (non-zero only for dry runs)
    pub pending: usize,
    /// Characters those entries would cost
    pub pending_characters: usize,
    pub dry_run: bool,
}

pub struct Translator {
    config: Config,
    client: DeepLClient,
    filter: PassthroughFilter,
    retry: RetryConfig,
}

impl Translator {
    pub fn new(config: Config) -> Result<Self> {
        let client = DeepLClient::new(&config)?;
        let filter = PassthroughFilter::new(&config.skip_patterns);
        let retry = RetryConfig::deepl(config.max_retries, config.retry_base_delay());

        Ok(Self {
            config,
            client,
            filter,
            retry,
        })
    }

    pub fn client(&self) -> &DeepLClient {
        &self.client
    }

    /// Classify every entry of `input`.
    ///
    /// With a `previous` output, an entry whose stored value is non-empty and
    /// differs from its key counts as already translated.
    pub fn plan(&self, input: &TranslationFile, previous: Option<&TranslationFile>) -> Plan {
        let previous = previous.map(TranslationFile::to_lookup);

        let actions = input
            .keys()
            .map(|key| {
                let done = previous
                    .as_ref()
                    .and_then(|prev| prev.get(key))
                    .is_some_and(|value| !value.is_empty() && *value != key);

                if done {
                    EntryAction::Kept
                } else if self.filter.needs_translation(key) {
                    EntryAction::Translate
                } else {
                    EntryAction::Passthrough
                }
            })
            .collect();

        Plan { actions }
    }

    /// Translate the configured input file and write the output file.
    pub async fn run(&self, options: &RunOptions) -> Result<RunSummary> {
        let input = TranslationFile::load(&self.config.input_file)?;

        let previous = if options.resume && self.config.output_file.exists() {
            info!(
                "Resuming from existing output {}",
                self.config.output_file.display()
            );
            Some(TranslationFile::load(&self.config.output_file)?)
        } else {
            if options.resume {
                info!("No previous output found, starting from scratch");
            }
            None
        };

        let plan = self.plan(&input, previous.as_ref());
        let (mut output, mut stats) = prepare_output(&input, &plan, previous.as_ref());
        let pending = plan.pending_indices();
        let pending_characters = pending
            .iter()
            .filter_map(|&i| input.entry_at(i))
            .map(|(key, _)| key.chars().count())
            .sum::<usize>();

        info!(
            "Starting translation of {} entries: {} to translate in batches of {}, {} passed through, {} kept",
            input.len(),
            pending.len(),
            self.config.batch_size,
            stats.passthrough(),
            stats.kept()
        );

        if options.dry_run {
            info!(
                "Dry run: {} texts ({} characters) would be sent to DeepL",
                pending.len(),
                pending_characters
            );
            return Ok(RunSummary {
                report: stats.report(),
                output_file: self.config.output_file.clone(),
                pending: pending.len(),
                pending_characters,
                dry_run: true,
            });
        }

        if let Err(e) = self.translate_pending(&input, &pending, &mut output, &mut stats).await {
            if self.config.save_partial_on_error {
                match output.save(&self.config.output_file) {
                    Ok(()) => warn!(
                        "Saved partial output ({} translated) to {}; rerun with --resume to continue",
                        stats.translated(),
                        self.config.output_file.display()
                    ),
                    Err(save_err) => warn!("Failed to save partial output: {:#}", save_err),
                }
            }
            return Err(e);
        }

        output.save(&self.config.output_file)?;

        let report = stats.report();
        info!(
            "Translation complete! Saved to {}",
            self.config.output_file.display()
        );
        info!("{}", report);

        Ok(RunSummary {
            report,
            output_file: self.config.output_file.clone(),
            pending: 0,
            pending_characters: 0,
            dry_run: false,
        })
    }

    /// Send pending entries batch by batch, applying results to `output` as they arrive.
    async fn translate_pending(
        &self,
        input: &TranslationFile,
        pending: &[usize],
        output: &mut TranslationFile,
        stats: &mut RunStats,
    ) -> Result<()> {
        let total_batches = pending.len().div_ceil(self.config.batch_size);
        let delay = self.config.delay_between_requests();

        for (batch_index, indices) in pending.chunks(self.config.batch_size).enumerate() {
            let batch_num = batch_index + 1;
            if batch_index > 0 && !delay.is_zero() {
                sleep(delay).await;
            }

            let texts: Vec<String> = indices
                .iter()
                .filter_map(|&i| input.entry_at(i))
                .map(|(key, _)| key.to_string())
                .collect();

            let translations = self
                .client
                .translate_with_retry(&texts, &self.retry)
                .await
                .with_context(|| format!("Batch {}/{} failed", batch_num, total_batches))?;

            for (source, translated) in texts.iter().zip(&translations) {
                debug!("Translated: '{}' -> '{}'", source, translated);
            }
            stats.record_batch(texts.as_slice());
            apply_translations(output, indices, translations);

            let done = stats.translated();
            info!(
                "Progress: {}/{} ({:.1}%) - Batch {}/{}",
                done,
                pending.len(),
                done as f64 / pending.len() as f64 * 100.0,
                batch_num,
                total_batches
            );
        }

        Ok(())
    }
}

/// Start the output from the input: kept entries take the previous value,
/// passthrough entries keep a non-empty value or fall back to the key.
fn prepare_output(
    input: &TranslationFile,
    plan: &Plan,
    previous: Option<&TranslationFile>,
) -> (TranslationFile, RunStats) {
    let mut output = input.clone();
    let mut stats = RunStats::new(input.len());
    let previous = previous.map(TranslationFile::to_lookup);

    for (index, ((key, value), action)) in input.iter().zip(plan.actions()).enumerate() {
        match action {
            EntryAction::Kept => {
                if let Some(prev) = previous.as_ref().and_then(|p| p.get(key)) {
                    output.set_at(index, prev.to_string());
                }
                stats.record_kept();
            }
            EntryAction::Passthrough => {
                if value.is_empty() {
                    output.set_at(index, key.to_string());
                }
                stats.record_passthrough();
            }
            EntryAction::Translate => {}
        }
    }

    (output, stats)
}

/// Write `translations[n]` into the entry at `indices[n]`.
pub fn apply_translations(file: &mut TranslationFile, indices: &[usize], translations: Vec<String>) {
    for (&index, translated) in indices.iter().zip(translations) {
        file.set_at(index, translated);
    }
}
