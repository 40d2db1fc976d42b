//! Aggregation of repeated batches and pairwise comparison of two solvers

use crate::{
    config::{SAT_CODE, UNSAT_CODE},
    results::{is_verdict_code, BatchSummary},
};
use std::{borrow::Borrow, collections::BTreeMap};

/// The outcomes of one instance over N batches; `None` marks a timeout or a
/// batch without a run for this instance.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregateEntry {
    pub time: Vec<Option<f64>>,
    pub code: Vec<Option<i32>>,
}

impl AggregateEntry {
    fn padded(&mut self, length: usize) {
        self.time.resize(length, None);
        self.code.resize(length, None);
    }
}

/// Index the runs of several batches by instance name.
///
/// Every entry has exactly one slot per batch, in the order of `summaries`.
pub fn aggregate<S: Borrow<BatchSummary>>(summaries: &[S]) -> BTreeMap<String, AggregateEntry> {
    let mut entries: BTreeMap<String, AggregateEntry> = BTreeMap::new();
    for (repetition, summary) in summaries.iter().enumerate() {
        for (name, run) in summary.borrow().by_instance() {
            let entry = entries.entry(name).or_default();
            entry.padded(repetition);
            entry.time.push(run.time());
            entry.code.push(run.code());
        }
    }
    for entry in entries.values_mut() {
        entry.padded(summaries.len());
    }
    entries
}

/// How the outcomes of solvers X and Y on one instance relate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PairOutcome {
    /// X exited with a code other than SAT or UNSAT.
    XBadCode(i32),
    YBadCode(i32),
    UnsolvedByBoth,
    /// Y timed out; X returned this code.
    SolvedOnlyByX(i32),
    SolvedOnlyByY(i32),
    /// One claims SAT, the other UNSAT.
    Mismatch { x: i32, y: i32 },
    Agree {
        code: i32,
        x_time: Option<f64>,
        y_time: Option<f64>,
    },
}

/// Classify the codes of X and Y, `None` meaning a timeout.
///
/// Bad codes are detected before anything else, X first; then timeouts on
/// both sides, then on one side, then disagreement.
pub fn classify_pair(
    x: Option<i32>,
    y: Option<i32>,
    x_time: Option<f64>,
    y_time: Option<f64>,
) -> PairOutcome {
    if let Some(code) = x.filter(|&code| !is_verdict_code(code)) {
        return PairOutcome::XBadCode(code);
    }
    if let Some(code) = y.filter(|&code| !is_verdict_code(code)) {
        return PairOutcome::YBadCode(code);
    }
    match (x, y) {
        (None, None) => PairOutcome::UnsolvedByBoth,
        (Some(x), None) => PairOutcome::SolvedOnlyByX(x),
        (None, Some(y)) => PairOutcome::SolvedOnlyByY(y),
        (Some(x), Some(y)) if x != y => PairOutcome::Mismatch { x, y },
        (Some(code), Some(_)) => PairOutcome::Agree {
            code,
            x_time,
            y_time,
        },
    }
}

/// The instances of a two-solver comparison sorted into categories.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RelativeComparison {
    pub x_only: Vec<(String, i32)>,
    pub y_only: Vec<(String, i32)>,
    pub unsolved: Vec<String>,
    pub mismatches: Vec<(String, i32, i32)>,
    pub x_bad_codes: Vec<(String, i32)>,
    pub y_bad_codes: Vec<(String, i32)>,
    /// Solve times on the instances both found satisfiable
    pub x_sat: Vec<f64>,
    pub y_sat: Vec<f64>,
    pub x_unsat: Vec<f64>,
    pub y_unsat: Vec<f64>,
}

impl RelativeComparison {
    /// True if nothing indicates a wrong answer.
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty() && self.x_bad_codes.is_empty() && self.y_bad_codes.is_empty()
    }
}

/// Compare solver X, which produced `x`, against solver Y, which produced `y`.
pub fn relative_comparison(x: &BatchSummary, y: &BatchSummary) -> RelativeComparison {
    let mut comparison = RelativeComparison::default();
    for (name, entry) in aggregate(&[x, y]) {
        invariant!(entry.code.len() == 2);
        match classify_pair(entry.code[0], entry.code[1], entry.time[0], entry.time[1]) {
            PairOutcome::XBadCode(code) => comparison.x_bad_codes.push((name, code)),
            PairOutcome::YBadCode(code) => comparison.y_bad_codes.push((name, code)),
            PairOutcome::UnsolvedByBoth => comparison.unsolved.push(name),
            PairOutcome::SolvedOnlyByX(code) => comparison.x_only.push((name, code)),
            PairOutcome::SolvedOnlyByY(code) => comparison.y_only.push((name, code)),
            PairOutcome::Mismatch { x, y } => comparison.mismatches.push((name, x, y)),
            PairOutcome::Agree {
                code,
                x_time,
                y_time,
            } => {
                let (x_times, y_times) = if code == SAT_CODE {
                    (&mut comparison.x_sat, &mut comparison.y_sat)
                } else {
                    invariant!(code == UNSAT_CODE);
                    (&mut comparison.x_unsat, &mut comparison.y_unsat)
                };
                x_times.extend(x_time);
                y_times.extend(y_time);
            }
        }
    }
    comparison
}

/// The sorted solve times of the runs that ended with SAT or UNSAT.
pub fn cactus(summary: &BatchSummary) -> Vec<f64> {
    let mut times: Vec<f64> = summary
        .runs
        .iter()
        .filter(|run| run.solved())
        .map(|run| run.elapsed_time)
        .collect();
    times.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    times
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{RunRecord, RunResult};

    fn run(instance: &str, code: Option<i32>, time: f64) -> RunRecord {
        RunRecord {
            command_line: vec![
                "solver".to_string(),
                format!("bench/{}", instance),
                format!("out/{}.result", instance),
                "-rnd-seed=1".to_string(),
            ],
            elapsed_time: time,
            return_code: code,
            result: if code.is_some() {
                RunResult::Ok
            } else {
                RunResult::Timeout
            },
        }
    }

    fn summary(runs: Vec<RunRecord>) -> BatchSummary {
        BatchSummary { timeout: 100.0, runs }
    }

    #[test]
    fn precedence() {
        assert_eq!(classify_pair(Some(7), Some(10), None, None), PairOutcome::XBadCode(7));
        assert_eq!(classify_pair(Some(7), Some(3), None, None), PairOutcome::XBadCode(7));
        assert_eq!(classify_pair(None, Some(1), None, None), PairOutcome::YBadCode(1));
        assert_eq!(classify_pair(Some(10), Some(-9), None, None), PairOutcome::YBadCode(-9));
        assert_eq!(classify_pair(None, None, None, None), PairOutcome::UnsolvedByBoth);
        assert_eq!(classify_pair(Some(20), None, Some(1.0), None), PairOutcome::SolvedOnlyByX(20));
        assert_eq!(classify_pair(None, Some(10), None, Some(1.0)), PairOutcome::SolvedOnlyByY(10));
        assert_eq!(
            classify_pair(Some(10), Some(20), None, None),
            PairOutcome::Mismatch { x: 10, y: 20 }
        );
        assert_eq!(
            classify_pair(Some(20), Some(20), Some(1.0), Some(2.0)),
            PairOutcome::Agree {
                code: 20,
                x_time: Some(1.0),
                y_time: Some(2.0)
            }
        );
    }

    #[test]
    fn entries_are_dense() {
        let first = summary(vec![run("a.cnf", Some(10), 1.0), run("b.cnf", None, 100.0)]);
        let second = summary(vec![run("b.cnf", Some(20), 5.0)]);
        let third = summary(vec![run("a.cnf", Some(10), 2.0), run("c.cnf", Some(7), 0.5)]);
        let entries = aggregate(&[first, second, third]);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries["a.cnf"].code, vec![Some(10), None, Some(10)]);
        assert_eq!(entries["a.cnf"].time, vec![Some(1.0), None, Some(2.0)]);
        assert_eq!(entries["b.cnf"].code, vec![None, Some(20), None]);
        assert_eq!(entries["c.cnf"].code, vec![None, None, Some(7)]);
        for entry in entries.values() {
            assert_eq!(entry.time.len(), 3);
        }
    }

    #[test]
    fn compares_two_solvers() {
        let x = summary(vec![
            run("bad.cnf", Some(7), 1.0),
            run("both.cnf", Some(10), 1.0),
            run("unsat.cnf", Some(20), 3.0),
            run("mismatch.cnf", Some(10), 1.0),
            run("xonly.cnf", Some(20), 4.0),
            run("yonly.cnf", None, 100.0),
            run("none.cnf", None, 100.0),
        ]);
        let y = summary(vec![
            run("bad.cnf", Some(10), 1.0),
            run("both.cnf", Some(10), 2.0),
            run("unsat.cnf", Some(20), 6.0),
            run("mismatch.cnf", Some(20), 1.0),
            run("xonly.cnf", None, 100.0),
            run("yonly.cnf", Some(10), 9.0),
            run("none.cnf", None, 100.0),
        ]);
        let comparison = relative_comparison(&x, &y);
        assert_eq!(comparison.x_bad_codes, vec![("bad.cnf".to_string(), 7)]);
        assert!(comparison.y_bad_codes.is_empty());
        assert_eq!(comparison.mismatches, vec![("mismatch.cnf".to_string(), 10, 20)]);
        assert_eq!(comparison.x_only, vec![("xonly.cnf".to_string(), 20)]);
        assert_eq!(comparison.y_only, vec![("yonly.cnf".to_string(), 10)]);
        assert_eq!(comparison.unsolved, vec!["none.cnf".to_string()]);
        assert_eq!(comparison.x_sat, vec![1.0]);
        assert_eq!(comparison.y_sat, vec![2.0]);
        assert_eq!(comparison.x_unsat, vec![3.0]);
        assert_eq!(comparison.y_unsat, vec![6.0]);
        assert!(!comparison.is_clean());
    }

    #[test]
    fn cactus_keeps_verdicts() {
        let runs = summary(vec![
            run("a.cnf", Some(10), 3.0),
            run("b.cnf", Some(20), 1.0),
            run("c.cnf", None, 100.0),
            run("d.cnf", Some(1), 0.1),
        ]);
        assert_eq!(cactus(&runs), vec![1.0, 3.0]);
    }
}
