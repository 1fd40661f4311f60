//! The bounded healing loop: extract → classify → trace → fix → re-test,
//! repeated until the suite passes or the round budget runs out.
//!
//! The controller exclusively owns the [`Run`] and its iteration/fix trail.
//! Collaborator failures degrade (a failed iteration, an uncommitted fix);
//! only a failure of the working tree itself aborts the run, and even then
//! the partial record is preserved.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::classify::Classifier;
use crate::config::Policy;
use crate::extract::SymptomExtractor;
use crate::model::{
    Defect, DefectKind, FixStatus, Iteration, Run, RunStatus, TestOutput, UNKNOWN_FILE,
};
use crate::scan::StaticScanner;
use crate::snippet;
use crate::strategy::FixEngine;
use crate::trace::RootCauseTracer;
use crate::util::truncate;

const MESSAGE_CAP: usize = 200;

/// External test-execution collaborator: runs the suite in the working tree
/// and reports counts plus a framework hint.
pub trait TestRunner {
    fn run_suite(&self, repo: &Path) -> Result<TestOutput>;
}

/// External commit collaborator, consumed as a sink only: one `(file,
/// message)` pair per accepted fix.
pub trait CommitSink {
    fn commit_fix(&self, file: &str, message: &str) -> Result<()>;
}

pub struct Healer<'a> {
    root: PathBuf,
    policy: Policy,
    runner: &'a dyn TestRunner,
    sink: Option<&'a dyn CommitSink>,
    extractor: SymptomExtractor,
    classifier: Classifier,
    tracer: RootCauseTracer,
    scanner: StaticScanner,
    engine: FixEngine,
}

impl<'a> Healer<'a> {
    pub fn new(repo_root: &Path, policy: Policy, runner: &'a dyn TestRunner) -> Self {
        Self {
            root: repo_root.to_path_buf(),
            policy,
            runner,
            sink: None,
            extractor: SymptomExtractor::new(repo_root),
            classifier: Classifier::new(),
            tracer: RootCauseTracer::new(repo_root),
            scanner: StaticScanner::new(repo_root),
            engine: FixEngine::new(repo_root),
        }
    }

    pub fn with_commit_sink(mut self, sink: &'a dyn CommitSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Run one end-to-end healing session. Never panics past this boundary:
    /// any uncaught step failure lands the run in `Error` status with its
    /// partial iteration/fix trail intact.
    pub fn heal(&self) -> Run {
        let mut run = Run::new(&self.root.display().to_string());
        info!(target = %run.target, run_id = %run.id, "healing session started");

        match self.heal_inner(&mut run) {
            Ok(status) => run.status = status,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "healing session aborted");
                run.status = RunStatus::Error;
                run.error = Some(format!("{:#}", e));
            }
        }

        run.finished_at = Some(Utc::now());
        info!(status = ?run.status, fixes = run.fixes.len(), "healing session finished");
        run
    }

    fn heal_inner(&self, run: &mut Run) -> Result<RunStatus> {
        let mut current = self.execute_tests();
        self.record_iteration(run, 0, &current, 0, 0);

        if current.all_green() {
            info!("suite already green, no healing needed");
            return Ok(RunStatus::Passed);
        }

        // Whether any round so far observed passing tests; gates the
        // one-shot extraction retry when a later round yields no defects.
        let mut seen_passing = current.passed > 0;

        for round in 1..=self.policy.max_iterations {
            info!(round, budget = self.policy.max_iterations, "healing round");

            let mut defects = self.analyze(&current);
            if defects.is_empty() && seen_passing {
                debug!("no defects found, retrying extraction on combined output");
                defects = self.analyze_concatenated(&current);
            }
            if defects.is_empty() {
                info!(round, "no defects detected, stopping");
                self.record_iteration(run, round, &current, 0, 0);
                return Ok(RunStatus::Failed);
            }

            let mut applied = 0;
            for defect in &defects {
                match self.engine.attempt(defect)? {
                    Some(mut fix) => {
                        fix.commit_message = format!(
                            "auto-heal: fix {} in {}:{}",
                            fix.kind, fix.file, fix.line
                        );
                        fix.status = FixStatus::Applied;
                        if let Some(sink) = self.sink {
                            if let Err(e) = sink.commit_fix(&fix.file, &fix.commit_message) {
                                // Fix stays applied but uncommitted
                                warn!(file = %fix.file, error = %format!("{:#}", e), "commit failed");
                            } else {
                                run.total_commits += 1;
                            }
                        }
                        applied += 1;
                        run.fixes.push(fix);
                    }
                    None => {
                        debug!(file = %defect.file, line = defect.line, kind = %defect.kind, "no fix found");
                    }
                }
            }

            current = self.execute_tests();
            self.record_iteration(run, round, &current, defects.len(), applied);
            if current.passed > 0 {
                seen_passing = true;
            }

            if current.all_green() {
                for fix in &mut run.fixes {
                    if fix.status == FixStatus::Applied {
                        fix.status = FixStatus::Verified;
                    }
                }
                info!(round, "suite green, all applied fixes verified");
                return Ok(RunStatus::Passed);
            }
        }

        info!("round budget exhausted");
        Ok(RunStatus::Failed)
    }

    /// Test execution never aborts the run: a collaborator failure becomes a
    /// synthetic failing result and an ordinary failed iteration.
    fn execute_tests(&self) -> TestOutput {
        match self.runner.run_suite(&self.root) {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "test execution failed");
                TestOutput {
                    stdout: String::new(),
                    stderr: format!("test execution failed: {:#}", e),
                    exit_code: -1,
                    passed: 0,
                    failed: 0,
                    total: 0,
                    framework: crate::model::Framework::Unknown,
                }
            }
        }
    }

    /// One analysis pass over the latest output: extract, classify, trace,
    /// merge in the static scan, deduplicate by `(file, line)`. Traced
    /// root-cause defects come first in repair order.
    fn analyze(&self, output: &TestOutput) -> Vec<Defect> {
        self.analyze_text(&output.stdout, &output.stderr, output)
    }

    /// The retry shape: everything concatenated into the primary channel.
    fn analyze_concatenated(&self, output: &TestOutput) -> Vec<Defect> {
        let combined = output.combined();
        self.analyze_text(&combined, "", output)
    }

    fn analyze_text(&self, stdout: &str, stderr: &str, output: &TestOutput) -> Vec<Defect> {
        let occurrences = self.extractor.extract(stdout, stderr, output.framework);

        let mut seen: HashSet<(String, usize)> = HashSet::new();
        let mut priority: Vec<Defect> = Vec::new();
        let mut ordinary: Vec<Defect> = Vec::new();

        for occ in occurrences {
            let kind = self.classifier.classify(&occ.message, output.framework);
            let defect = Defect {
                snippet: snippet::read_snippet(&self.root, &occ.file, occ.line),
                file: occ.file,
                line: occ.line,
                kind,
                message: truncate(occ.message.trim(), MESSAGE_CAP),
            };
            self.admit(defect, &mut seen, &mut priority, &mut ordinary);
        }

        // Location-less fallback over the raw text
        if priority.is_empty() && ordinary.is_empty() {
            let combined = format!("{}\n{}", stdout, stderr);
            for (pattern, kind) in self.classifier.table(output.framework) {
                for m in pattern.find_iter(&combined) {
                    ordinary.push(Defect {
                        file: UNKNOWN_FILE.to_string(),
                        line: 0,
                        kind: *kind,
                        message: truncate(m.as_str().trim(), MESSAGE_CAP),
                        snippet: String::new(),
                    });
                    if ordinary.len() >= self.policy.max_unlocated_defects {
                        break;
                    }
                }
                if ordinary.len() >= self.policy.max_unlocated_defects {
                    break;
                }
            }
        }

        // Proactive scan findings, deduplicated against the extracted set
        for defect in self.scanner.scan() {
            self.admit(defect, &mut seen, &mut priority, &mut ordinary);
        }

        priority.extend(ordinary);
        priority
    }

    /// Route one defect through root-cause tracing and the dedup set.
    fn admit(
        &self,
        defect: Defect,
        seen: &mut HashSet<(String, usize)>,
        priority: &mut Vec<Defect>,
        ordinary: &mut Vec<Defect>,
    ) {
        if defect.kind == DefectKind::UnresolvedReference {
            if let Some(traced) = self.tracer.trace(&defect) {
                if seen.insert((traced.file.clone(), traced.line)) {
                    priority.push(traced);
                }
                return;
            }
        }
        if seen.insert((defect.file.clone(), defect.line)) {
            ordinary.push(defect);
        }
    }

    fn record_iteration(
        &self,
        run: &mut Run,
        number: u32,
        output: &TestOutput,
        defects_found: usize,
        fixes_applied: usize,
    ) {
        run.iterations.push(Iteration {
            number,
            passed: output.passed,
            failed: output.failed,
            total: output.total,
            defects_found,
            fixes_applied,
            status: if output.all_green() {
                RunStatus::Passed
            } else {
                RunStatus::Failed
            },
            output: truncate(&output.combined(), self.policy.output_capture_chars),
            timestamp: Utc::now(),
        });
    }
}
