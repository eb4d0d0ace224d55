//! The run orchestrator: resolve, load, transform, write, report.

use crate::config::RulesetConfig;
use crate::diff::{self, DiffSummary};
use crate::error::{PatchError, Result};
use crate::matcher::FileMatcher;
use crate::report::{FileOutcome, Outcome, RunReport};
use crate::rule::{Pipeline, PipelineOutcome};
use crate::source::{LineEndingPolicy, SourceFile, TextEncoding};
use crate::writer::{self, WriteStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, info_span, warn};

/// Cooperative stop request, checked between files.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the run to stop once the current file is finished.
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// The underlying flag, for signal handlers.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

/// A configured batch rewrite.
///
/// ```rust,no_run
/// use source_patch::prelude::*;
///
/// let pipeline = Pipeline::new(vec![
///     Rule::skip_if_present("licensed", Pattern::literal("MIT License")?),
///     Rule::insert_before("license", Pattern::start_of_file()?, "/* MIT License */\n"),
/// ])?;
///
/// let report = Rewrite::new(pipeline)
///     .root("src/main/java")
///     .matching(|f| f.extension("java"))
///     .run()?;
///
/// println!("{report}");
/// # Ok::<(), source_patch::error::PatchError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Rewrite {
    roots: Vec<PathBuf>,
    matcher: FileMatcher,
    pipeline: Pipeline,
    encoding: TextEncoding,
    line_endings: LineEndingPolicy,
    dry_run: bool,
    verify: bool,
    previews: bool,
    stop: StopSignal,
}

impl Rewrite {
    /// Creates a rewrite that runs `pipeline` over every file of the roots.
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            roots: Vec::new(),
            matcher: FileMatcher::new(),
            pipeline,
            encoding: TextEncoding::UTF_8,
            line_endings: LineEndingPolicy::Preserve,
            dry_run: false,
            verify: false,
            previews: false,
            stop: StopSignal::new(),
        }
    }

    /// Builds a rewrite from a rule-set file's settings.
    pub fn from_config(config: &RulesetConfig) -> Result<Self> {
        Ok(Self::new(config.pipeline()?)
            .matching(|_| config.file_matcher())
            .encoding(config.text_encoding()?)
            .line_endings(config.line_ending))
    }

    /// Adds a root directory (or single file).
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.roots.push(path.into());
        self
    }

    /// Adds several roots.
    pub fn roots(mut self, paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.roots.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Adjusts the file selection.
    pub fn matching<F>(mut self, f: F) -> Self
    where
        F: FnOnce(FileMatcher) -> FileMatcher,
    {
        self.matcher = f(self.matcher);
        self
    }

    /// Sets the declared encoding of the files.
    pub fn encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn line_endings(mut self, policy: LineEndingPolicy) -> Self {
        self.line_endings = policy;
        self
    }

    /// Computes outcomes without writing anything.
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Re-runs the rules over each output and fails files where that changes anything.
    pub fn verify_idempotence(mut self) -> Self {
        self.verify = true;
        self
    }

    /// Keeps a unified diff of each changed file in its outcome.
    pub fn with_previews(mut self) -> Self {
        self.previews = true;
        self
    }

    /// Shares a stop signal with the run.
    pub fn stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Processes every file and returns the report.
    ///
    /// Only configuration problems are returned as errors; anything that goes
    /// wrong with a single file is recorded in the report and the run moves on.
    pub fn run(&self) -> Result<RunReport> {
        if self.roots.is_empty() {
            return Err(PatchError::Config("no root directories given".to_string()));
        }

        let mut files = self.matcher.resolve(&self.roots)?;
        let mut report = RunReport::new(self.dry_run);
        report.missing_roots = files.missing_roots().to_vec();

        while let Some(entry) = files.next() {
            if self.stop.is_stopped() {
                warn!("stop requested, ending run early");
                report.interrupted = true;
                break;
            }

            let outcome = match entry {
                Ok(path) => self.process_file(&path),
                Err(err) => walk_failure(&err, files.current_root()),
            };
            report.record(outcome);
        }

        info!(
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            "run finished"
        );
        Ok(report)
    }

    /// Runs one file through load, pipeline and write.
    pub fn process_file(&self, path: &Path) -> FileOutcome {
        let _span = info_span!("file", path = %path.display()).entered();
        match self.try_process(path) {
            Ok(outcome) => {
                match &outcome.outcome {
                    Outcome::Updated => info!(rules = ?outcome.rules_applied, "updated"),
                    Outcome::AlreadyApplied { marker } => info!(marker = %marker, "already applied"),
                    _ => {}
                }
                outcome
            }
            Err(err) => {
                warn!(error = %err, kind = %err.kind(), "file failed");
                FileOutcome::failed(path, &err)
            }
        }
    }

    fn try_process(&self, path: &Path) -> Result<FileOutcome> {
        let source = SourceFile::load(path, self.encoding)?;

        let newline = source.line_ending().rule_newline();
        let (text, rules) = match self.pipeline.apply_with(source.text(), path, newline) {
            PipelineOutcome::AlreadyApplied { rule } => {
                return Ok(FileOutcome::new(path, Outcome::AlreadyApplied { marker: rule }));
            }
            PipelineOutcome::Completed { text, rules } => (text, rules),
        };

        if self.verify && !self.pipeline.is_idempotent_on(&text, path, newline) {
            return Err(PatchError::NotIdempotent(path.to_path_buf()));
        }

        // Some encodings do not round-trip every byte sequence, so unchanged
        // text must never reach the encoder.
        if text == source.text() && self.line_endings.keeps(source.line_ending()) {
            return Ok(FileOutcome::with_rules(path, Outcome::Unchanged, &rules));
        }

        let bytes = writer::encode(&source, &text, self.line_endings)?;
        if bytes == source.raw() {
            return Ok(FileOutcome::with_rules(path, Outcome::Unchanged, &rules));
        }

        if !self.dry_run {
            match writer::write_back(&source, &bytes)? {
                WriteStatus::Written => {}
                WriteStatus::Unchanged => {
                    return Ok(FileOutcome::with_rules(path, Outcome::Unchanged, &rules));
                }
            }
        }

        let mut outcome = FileOutcome::with_rules(path, Outcome::Updated, &rules);
        outcome.diff = Some(DiffSummary::from_diff(source.text(), &text));
        if self.previews {
            outcome.preview = Some(diff::render(source.text(), &text, path));
        }
        Ok(outcome)
    }
}

/// Records a directory entry that could not be read, attributed to the
/// entry's path or, failing that, the root being walked.
fn walk_failure(err: &PatchError, root: Option<&Path>) -> FileOutcome {
    let path = err.path().or(root).map(Path::to_path_buf).unwrap_or_default();
    warn!(path = %path.display(), error = %err, "cannot read directory entry");
    FileOutcome::failed(path, err)
}
