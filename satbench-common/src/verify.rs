//! Cross-checking a reference solver against a modified one
//!
//! Each repetition produces one [BatchSummary](../results/struct.BatchSummary.html)
//! per solver. Per instance, every repetition contributes one symbol:
//!
//! | symbol | meaning                      |
//! |--------|------------------------------|
//! | `S`    | SAT (return code 10)         |
//! | `U`    | UNSAT (return code 20)       |
//! | `-`    | timeout or missing run       |
//! | `E`    | any other return code        |
//!
//! A SAT claim is only trusted after its model has been evaluated on the
//! original, unshuffled instance.

use crate::{
    assignment::Assignment,
    cnf::{CnfFormula, VariableRenaming},
    config::{REPORT_HEADER_EVERY, SAT_CODE, UNSAT_CODE},
    error::Result,
    results::{read_solver_result, BatchSummary, RunRecord, SolverOutcome},
};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    io::{self, Write},
    path::{Path, PathBuf},
};

/// The outcome of one run as shown in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Sat,
    Unsat,
    Timeout,
    Error,
}

impl Symbol {
    fn of(run: Option<&RunRecord>) -> Symbol {
        match run.and_then(RunRecord::code) {
            None => Symbol::Timeout,
            Some(SAT_CODE) => Symbol::Sat,
            Some(UNSAT_CODE) => Symbol::Unsat,
            Some(_) => Symbol::Error,
        }
    }
    pub fn as_char(self) -> char {
        match self {
            Symbol::Sat => 'S',
            Symbol::Unsat => 'U',
            Symbol::Timeout => '-',
            Symbol::Error => 'E',
        }
    }
}

/// The outcomes of one solver on one instance across all repetitions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VariantRow {
    pub symbols: Vec<Symbol>,
    /// The first SAT or UNSAT code over the repetitions
    pub code: Option<i32>,
    /// Two repetitions returned different verdicts.
    pub inconsistent: bool,
    /// Repetitions whose SAT claim did not survive re-evaluation
    pub bad_models: Vec<usize>,
    /// Repetitions that exited with a code other than SAT or UNSAT
    pub bad_codes: Vec<(usize, i32)>,
}

impl VariantRow {
    pub fn symbols(&self) -> String {
        self.symbols.iter().map(|symbol| symbol.as_char()).collect()
    }

    /// True if nothing about this solver alone is suspicious.
    pub fn is_ok(&self) -> bool {
        !self.inconsistent && self.bad_models.is_empty() && self.bad_codes.is_empty()
    }

    fn annotate(&self, prefix: &str, notes: &mut Vec<String>) {
        if self.inconsistent {
            notes.push(format!("{}inconsistent", prefix));
        }
        for repetition in &self.bad_models {
            notes.push(format!("{}bad-model-{}", prefix, repetition));
        }
        for (repetition, code) in &self.bad_codes {
            notes.push(format!("{}bad-code-{}={}", prefix, repetition, code));
        }
    }
}

/// One line of the verification report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRow {
    pub name: String,
    pub reference: VariantRow,
    pub modified: VariantRow,
}

impl VerificationRow {
    /// Both solvers settled on the same verdict, or at least one never
    /// settled on any.
    pub fn agree(&self) -> bool {
        match (self.reference.code, self.modified.code) {
            (Some(reference), Some(modified)) => reference == modified,
            _ => true,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.agree() && self.reference.is_ok() && self.modified.is_ok()
    }

    /// The findings of this row separated by spaces, or `ok`.
    pub fn annotation(&self) -> String {
        let mut notes = Vec::new();
        if !self.agree() {
            notes.push("disagree".to_string());
        }
        self.modified.annotate("", &mut notes);
        self.reference.annotate("ref-", &mut notes);
        if notes.is_empty() {
            "ok".to_string()
        } else {
            notes.join(" ")
        }
    }
}

/// Whether `claimed` satisfies `original`.
///
/// If the claim was made for a shuffled copy of `original`, `renaming` is the
/// renaming that produced that copy; the claim is moved back to the original
/// variables before evaluation.
pub fn verify_against_model(
    original: &CnfFormula,
    renaming: Option<&VariableRenaming>,
    claimed: &Assignment,
) -> bool {
    match renaming {
        Some(renaming) => original.evaluate(&renaming.backward(claimed)),
        None => original.evaluate(claimed),
    }
}

/// Re-checks SAT claims against the original instances.
///
/// Repetition `i` solved copies of the originals shuffled with
/// `randomize_seeds[i]`, or unmodified copies if that seed is absent.
pub struct ModelChecker {
    originals: PathBuf,
    randomize_seeds: Vec<Option<u64>>,
    /// The most recently loaded original and its name
    cached_name: String,
    cached: CnfFormula,
}

impl ModelChecker {
    pub fn new(originals: impl Into<PathBuf>, randomize_seeds: Vec<Option<u64>>) -> ModelChecker {
        ModelChecker {
            originals: originals.into(),
            randomize_seeds,
            cached_name: String::new(),
            cached: CnfFormula::new(Vec::new(), Vec::new()),
        }
    }

    fn original(&mut self, name: &str) -> Result<&CnfFormula> {
        if self.cached_name != name {
            self.cached = CnfFormula::from_file(&self.originals.join(name))?;
            self.cached_name = name.to_string();
        }
        Ok(&self.cached)
    }

    /// Check the model `record` claims for instance `name` in `repetition`.
    ///
    /// A result file that is missing, unreadable or does not hold a model
    /// fails the check. An original that cannot be read is an error.
    pub fn check(&mut self, name: &str, repetition: usize, record: &RunRecord) -> Result<bool> {
        let model = match record.result_path().map(read_solver_result) {
            Some(Ok(SolverOutcome::Sat(model))) => model,
            Some(Ok(outcome)) => {
                let verdict = if outcome.is_indeterminate() { "no verdict" } else { "UNSAT" };
                warn!("{}: return code is SAT but the result file says {}", name, verdict);
                return Ok(false);
            }
            Some(Err(err)) => {
                warn!("{}", err);
                return Ok(false);
            }
            None => {
                warn!("{}: no result file in {}", name, record.command_line.join(" "));
                return Ok(false);
            }
        };
        let seed = self.randomize_seeds.get(repetition).copied().flatten();
        let original = self.original(name)?;
        let renaming = seed.map(|seed| original.renaming(seed));
        Ok(verify_against_model(original, renaming.as_ref(), &model))
    }
}

/// Summarize the runs of one solver on one instance, `runs[i]` being the run
/// of repetition `i`. `model_holds` decides whether a SAT claim is true.
fn verify_variant(
    runs: &[Option<&RunRecord>],
    mut model_holds: impl FnMut(usize, &RunRecord) -> Result<bool>,
) -> Result<VariantRow> {
    let mut row = VariantRow::default();
    for (repetition, &run) in runs.iter().enumerate() {
        let symbol = Symbol::of(run);
        row.symbols.push(symbol);
        let (run, code) = match (run, run.and_then(RunRecord::code)) {
            (Some(run), Some(code)) => (run, code),
            _ => continue,
        };
        if symbol == Symbol::Error {
            row.bad_codes.push((repetition, code));
            continue;
        }
        if symbol == Symbol::Sat && !model_holds(repetition, run)? {
            row.bad_models.push(repetition);
        }
        match row.code {
            None => row.code = Some(code),
            Some(settled) if settled != code => row.inconsistent = true,
            Some(_) => (),
        }
    }
    Ok(row)
}

/// Classify every instance that occurs in any repetition.
///
/// `references[i]` and `modified[i]` are the batches of repetition `i`.
/// Without a `checker`, SAT claims are taken at face value.
pub fn verify(
    references: &[BatchSummary],
    modified: &[BatchSummary],
    mut checker: Option<&mut ModelChecker>,
) -> Result<Vec<VerificationRow>> {
    requires!(references.len() == modified.len());
    let references: Vec<_> = references.iter().map(BatchSummary::by_instance).collect();
    let modified: Vec<_> = modified.iter().map(BatchSummary::by_instance).collect();
    let names: BTreeSet<&String> = references
        .iter()
        .chain(modified.iter())
        .flat_map(|index| index.keys())
        .collect();
    let mut rows = Vec::with_capacity(names.len());
    for name in names {
        let reference_runs = runs_of(&references, name);
        let modified_runs = runs_of(&modified, name);
        if reference_runs.iter().chain(&modified_runs).any(Option::is_none) {
            warn!("{} is missing from some repetitions", name);
        }
        let mut model_holds = |repetition: usize, run: &RunRecord| match checker.as_mut() {
            Some(checker) => checker.check(name, repetition, run),
            None => Ok(true),
        };
        rows.push(VerificationRow {
            name: name.clone(),
            reference: verify_variant(&reference_runs, &mut model_holds)?,
            modified: verify_variant(&modified_runs, &mut model_holds)?,
        });
    }
    Ok(rows)
}

/// The run of each repetition on instance `name`.
fn runs_of<'s>(repetitions: &[BTreeMap<String, &'s RunRecord>], name: &str) -> Vec<Option<&'s RunRecord>> {
    repetitions.iter().map(|index| index.get(name).copied()).collect()
}

/// The number of rows with a finding.
pub fn findings(rows: &[VerificationRow]) -> usize {
    rows.iter().filter(|row| !row.is_ok()).count()
}

fn write_spacer(out: &mut impl Write, width: usize) -> io::Result<()> {
    writeln!(
        out,
        "|=====|={}=|={}=|={}=|========+",
        "=".repeat(32),
        "=".repeat(width),
        "=".repeat(width)
    )
}

fn write_header(out: &mut impl Write, width: usize) -> io::Result<()> {
    write_spacer(out, width)?;
    writeln!(
        out,
        "|  #  | {:<32} | {:^width$} | {:^width$} | result |",
        "  Instance",
        "ref.",
        "mod.",
        width = width
    )?;
    write_spacer(out, width)
}

/// Print the rows as a table, repeating the header every few rows.
pub fn write_report(out: &mut impl Write, rows: &[VerificationRow], repetitions: usize) -> io::Result<()> {
    let width = repetitions.max(8);
    if rows.is_empty() {
        write_header(out, width)?;
    }
    for (index, row) in rows.iter().enumerate() {
        if index % REPORT_HEADER_EVERY == 0 {
            write_header(out, width)?;
        }
        writeln!(
            out,
            "|{:>4} | {:<32} | {:>width$} | {:>width$} | {}",
            index + 1,
            row.name,
            row.reference.symbols(),
            row.modified.symbols(),
            row.annotation(),
            width = width
        )?;
    }
    write_spacer(out, width)
}

/// The verdicts of one batch, checked against the instances it solved.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultCheck {
    pub sat: Vec<String>,
    pub unsat: Vec<String>,
    /// No result, an explicit INDET or a missing result file
    pub indet: Vec<String>,
    /// Models that do not satisfy their instance and unreadable result files
    pub bad: Vec<String>,
}

impl ResultCheck {
    pub fn is_ok(&self) -> bool {
        self.bad.is_empty()
    }
}

impl fmt::Display for ResultCheck {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} sat, {} unsat, {} indet",
            self.sat.len(),
            self.unsat.len(),
            self.indet.len()
        )
    }
}

/// Read the result file of every run of `summary` and evaluate each model on
/// the instance the run solved.
pub fn check_results(summary: &BatchSummary) -> Result<ResultCheck> {
    let mut check = ResultCheck::default();
    for (name, run) in summary.by_instance() {
        let (instance, result) = match (run.instance_path(), run.result_path()) {
            (Some(instance), Some(result)) => (instance, result),
            _ => {
                check.bad.push(name);
                continue;
            }
        };
        match read_result_if_present(result) {
            Ok(SolverOutcome::Unsat) => check.unsat.push(name),
            Ok(SolverOutcome::Sat(model)) => {
                if CnfFormula::from_file(instance)?.evaluate(&model) {
                    check.sat.push(name);
                } else {
                    check.bad.push(name);
                }
            }
            Ok(outcome) => {
                invariant!(outcome.is_indeterminate());
                check.indet.push(name)
            }
            Err(err) => {
                warn!("{}", err);
                check.bad.push(name);
            }
        }
    }
    Ok(check)
}

/// A solver killed on timeout may not have written its result file.
fn read_result_if_present(path: &Path) -> Result<SolverOutcome> {
    if path.exists() {
        read_solver_result(path)
    } else {
        Ok(SolverOutcome::NoResult)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{literal::Literal, results::RunResult};
    use std::fs;

    fn model(literals: &[i32]) -> Assignment {
        literals.iter().map(|&literal| Literal::new(literal)).collect()
    }

    fn record(instance: &Path, result: &Path, code: Option<i32>) -> RunRecord {
        RunRecord {
            command_line: vec![
                "solver".to_string(),
                instance.to_string_lossy().into_owned(),
                result.to_string_lossy().into_owned(),
            ],
            elapsed_time: 1.0,
            return_code: code,
            result: if code.is_some() {
                RunResult::Ok
            } else {
                RunResult::Timeout
            },
        }
    }

    /// One summary per repetition, holding one run per `(instance, code)`.
    fn repetitions(codes: &[&[(&str, Option<i32>)]]) -> Vec<BatchSummary> {
        codes
            .iter()
            .map(|runs| BatchSummary {
                timeout: 10.0,
                runs: runs
                    .iter()
                    .map(|&(name, code)| {
                        record(
                            &Path::new("bench").join(name),
                            &Path::new("out").join(format!("{}.result", name)),
                            code,
                        )
                    })
                    .collect(),
            })
            .collect()
    }

    #[test]
    fn models_are_checked_on_the_original() {
        let formula = CnfFormula::new(vec![vec![1, 2], vec![-1, 3]], vec![]);
        assert!(verify_against_model(&formula, None, &model(&[1, -2, 3])));
        assert!(!verify_against_model(&formula, None, &model(&[1, -2, -3])));
        let (shuffled, renaming) = formula.shuffle_with_renaming(11);
        let found = renaming.forward(&model(&[1, -2, 3]));
        assert!(shuffled.evaluate(&found));
        assert!(verify_against_model(&formula, Some(&renaming), &found));
        let wrong = renaming.forward(&model(&[1, -2, -3]));
        assert!(!verify_against_model(&formula, Some(&renaming), &wrong));
    }

    #[test]
    fn rows() {
        let references = repetitions(&[
            &[("a.cnf", Some(10)), ("b.cnf", Some(20)), ("c.cnf", None), ("d.cnf", Some(20))],
            &[("a.cnf", Some(10)), ("b.cnf", Some(20)), ("c.cnf", None), ("d.cnf", Some(20))],
        ]);
        let modified = repetitions(&[
            &[("a.cnf", Some(10)), ("b.cnf", Some(10)), ("c.cnf", Some(7)), ("d.cnf", Some(20))],
            &[("a.cnf", None), ("b.cnf", Some(20)), ("c.cnf", Some(10)), ("d.cnf", Some(20))],
        ]);
        let rows = verify(&references, &modified, None).unwrap();
        let names: Vec<&str> = rows.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, vec!["a.cnf", "b.cnf", "c.cnf", "d.cnf"]);

        assert_eq!(rows[0].reference.symbols(), "SS");
        assert_eq!(rows[0].modified.symbols(), "S-");
        assert_eq!(rows[0].annotation(), "ok");

        assert_eq!(rows[1].modified.symbols(), "SU");
        assert!(rows[1].modified.inconsistent);
        assert!(!rows[1].agree());
        assert_eq!(rows[1].annotation(), "disagree inconsistent");

        assert_eq!(rows[2].reference.symbols(), "--");
        assert_eq!(rows[2].modified.symbols(), "ES");
        assert_eq!(rows[2].modified.code, Some(10));
        assert_eq!(rows[2].annotation(), "bad-code-0=7");

        assert!(rows[3].is_ok());
        assert_eq!(findings(&rows), 2);
    }

    #[test]
    fn reference_anomalies_are_reported() {
        let references = repetitions(&[&[("a.cnf", Some(1))], &[("a.cnf", Some(20))]]);
        let modified = repetitions(&[&[("a.cnf", Some(20))], &[("a.cnf", Some(20))]]);
        let rows = verify(&references, &modified, None).unwrap();
        assert_eq!(rows[0].reference.symbols(), "EU");
        assert_eq!(rows[0].annotation(), "ref-bad-code-0=1");
    }

    #[test]
    fn missing_runs_count_as_timeouts() {
        let references = repetitions(&[&[("a.cnf", Some(10))], &[]]);
        let modified = repetitions(&[&[("a.cnf", Some(10))], &[("a.cnf", Some(10))]]);
        let rows = verify(&references, &modified, None).unwrap();
        assert_eq!(rows[0].reference.symbols(), "S-");
        assert!(rows[0].is_ok());
    }

    #[test]
    fn model_checker() {
        let dir = tempfile::tempdir().unwrap();
        let originals = dir.path().join("bench");
        let scratch = dir.path().join("scratch");
        fs::create_dir(&originals).unwrap();
        fs::create_dir(&scratch).unwrap();
        let formula = CnfFormula::new(vec![vec![1, 2], vec![-1, 3], vec![-2, -3]], vec![]);
        formula.to_file(&originals.join("a.cnf.gz")).unwrap();
        let original = CnfFormula::from_file(&originals.join("a.cnf.gz")).unwrap();
        let (shuffled, renaming) = original.shuffle_with_renaming(5);
        shuffled.to_file(&scratch.join("a.cnf.gz")).unwrap();

        let good = renaming.forward(&model(&[1, -2, 3]));
        let mut text = "SAT\n".to_string();
        for (variable, value) in good.iter() {
            text.push_str(&format!("{} ", variable.literal(value)));
        }
        text.push_str("0\n");
        fs::write(dir.path().join("good.result"), text).unwrap();
        let bad = renaming.forward(&model(&[1, 2, 3]));
        let mut text = "SAT\n".to_string();
        for (variable, value) in bad.iter() {
            text.push_str(&format!("{} ", variable.literal(value)));
        }
        text.push_str("0\n");
        fs::write(dir.path().join("bad.result"), text).unwrap();
        fs::write(dir.path().join("unsat.result"), "UNSAT\n").unwrap();

        let instance = scratch.join("a.cnf.gz");
        let run = |result: &str| record(&instance, &dir.path().join(result), Some(10));
        let mut checker = ModelChecker::new(&originals, vec![Some(5)]);
        assert!(checker.check("a.cnf.gz", 0, &run("good.result")).unwrap());
        assert!(!checker.check("a.cnf.gz", 0, &run("bad.result")).unwrap());
        assert!(!checker.check("a.cnf.gz", 0, &run("unsat.result")).unwrap());
        assert!(!checker.check("a.cnf.gz", 0, &run("missing.result")).unwrap());

        let summary = BatchSummary {
            timeout: 10.0,
            runs: vec![run("bad.result")],
        };
        let rows = verify(&[summary.clone()], &[summary], Some(&mut checker)).unwrap();
        assert_eq!(rows[0].annotation(), "bad-model-0 ref-bad-model-0");

        let check = check_results(&BatchSummary {
            timeout: 10.0,
            runs: vec![run("good.result")],
        })
        .unwrap();
        assert_eq!(check.sat, vec!["a.cnf.gz".to_string()]);
        assert!(check.is_ok());
    }

    #[test]
    fn checks_a_batch() {
        let dir = tempfile::tempdir().unwrap();
        let instance = |name: &str| {
            let path = dir.path().join(name);
            fs::write(&path, "p cnf 2 2\n1 2 0\n-1 0\n").unwrap();
            path
        };
        let result = |name: &str, text: &str| {
            let path = dir.path().join(name);
            fs::write(&path, text).unwrap();
            path
        };
        let summary = BatchSummary {
            timeout: 10.0,
            runs: vec![
                record(&instance("sat.cnf"), &result("sat.result", "SAT\n-1 2 0\n"), Some(10)),
                record(&instance("bad.cnf"), &result("bad.result", "SAT\n1 2 0\n"), Some(10)),
                record(&instance("unsat.cnf"), &result("unsat.result", "UNSAT\n"), Some(20)),
                record(&instance("indet.cnf"), &result("indet.result", "INDET\n"), Some(0)),
                record(&instance("empty.cnf"), &result("empty.result", ""), Some(0)),
                record(&instance("killed.cnf"), &dir.path().join("killed.result"), None),
                record(&instance("odd.cnf"), &result("odd.result", "MAYBE\n"), Some(0)),
            ],
        };
        let check = check_results(&summary).unwrap();
        assert_eq!(check.sat, vec!["sat.cnf"]);
        assert_eq!(check.unsat, vec!["unsat.cnf"]);
        assert_eq!(check.indet, vec!["empty.cnf", "indet.cnf", "killed.cnf"]);
        assert_eq!(check.bad, vec!["bad.cnf", "odd.cnf"]);
        assert_eq!(check.to_string(), "1 sat, 1 unsat, 3 indet");
        assert!(!check.is_ok());
    }

    #[test]
    fn report_layout() {
        let row = |index: usize| VerificationRow {
            name: format!("i{:02}.cnf", index),
            reference: VariantRow {
                symbols: vec![Symbol::Sat, Symbol::Timeout],
                code: Some(10),
                ..VariantRow::default()
            },
            modified: VariantRow {
                symbols: vec![Symbol::Sat, Symbol::Error],
                code: Some(10),
                bad_codes: vec![(1, 3)],
                ..VariantRow::default()
            },
        };
        let rows: Vec<VerificationRow> = (0..21).map(row).collect();
        let mut out = Vec::new();
        write_report(&mut out, &rows, 2).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        let spacer = format!("|=====|={}=|={}=|={}=|========+", "=".repeat(32), "=".repeat(8), "=".repeat(8));
        assert_eq!(lines[0], spacer);
        assert_eq!(
            lines[1],
            format!("|  #  | {:<32} |   ref.   |   mod.   | result |", "  Instance")
        );
        assert_eq!(lines[2], spacer);
        assert_eq!(
            lines[3],
            format!("|   1 | {:<32} |       S- |       SE | bad-code-1=3", "i00.cnf")
        );
        assert_eq!(text.matches("result |").count(), 2);
        assert_eq!(lines.len(), 3 + 20 + 3 + 1 + 1);
        assert_eq!(lines.last(), Some(&spacer.as_str()));
    }
}
