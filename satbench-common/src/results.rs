//! Batch result records and solver result files
//!
//! A batch summary is stored as JSON:
//!
//! ```text
//! { "timeout": 1000,
//!   "runs": [ { "command_line": ["solver", "a.cnf.gz", "out/a.cnf.gz.result"],
//!               "elapsed_time": 12.5, "return_code": 10, "result": "OK" }, ... ] }
//! ```

use crate::{
    assignment::Assignment,
    config::{SAT_CODE, UNSAT_CODE},
    error::{Error, Result},
    files::write_file_atomically,
    literal::Literal,
};
use serde_derive::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

/// How a run ended.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunResult {
    /// The process exited by itself, whatever its return code.
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "TIMEOUT")]
    Timeout,
}

/// The outcome of one process run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub command_line: Vec<String>,
    /// Wall-clock seconds
    pub elapsed_time: f64,
    pub return_code: Option<i32>,
    pub result: RunResult,
}

/// The runs of a batch, in completion order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct BatchSummary {
    /// Seconds allowed per run
    pub timeout: f64,
    pub runs: Vec<RunRecord>,
}

impl RunRecord {
    /// The command arguments that are not flags, after the executable:
    /// the instance path followed by the result path.
    fn positional_arguments(&self) -> impl Iterator<Item = &String> + '_ {
        self.command_line
            .iter()
            .skip(1)
            .filter(|word| !word.starts_with('-'))
    }

    /// The file name of the instance this run solved.
    pub fn instance_name(&self) -> Option<String> {
        self.positional_arguments().next().map(|path| {
            Path::new(path)
                .file_name()
                .map_or_else(|| path.clone(), |name| name.to_string_lossy().into_owned())
        })
    }

    pub fn instance_path(&self) -> Option<&Path> {
        self.positional_arguments().next().map(Path::new)
    }

    /// Where the solver was asked to write its verdict.
    pub fn result_path(&self) -> Option<&Path> {
        self.positional_arguments().nth(1).map(Path::new)
    }

    /// The return code if the process exited by itself.
    pub fn code(&self) -> Option<i32> {
        match self.result {
            RunResult::Ok => self.return_code,
            RunResult::Timeout => None,
        }
    }

    /// The elapsed time if the process exited by itself.
    pub fn time(&self) -> Option<f64> {
        match self.result {
            RunResult::Ok => Some(self.elapsed_time),
            RunResult::Timeout => None,
        }
    }

    /// True if the run exited with the SAT or UNSAT code.
    pub fn solved(&self) -> bool {
        self.code().map_or(false, is_verdict_code)
    }
}

/// True for the return codes that carry a verdict.
pub fn is_verdict_code(code: i32) -> bool {
    code == SAT_CODE || code == UNSAT_CODE
}

impl BatchSummary {
    pub fn new(timeout: f64) -> BatchSummary {
        BatchSummary {
            timeout,
            runs: Vec::new(),
        }
    }

    pub fn from_file(path: &Path) -> Result<BatchSummary> {
        let text = fs::read_to_string(path).map_err(|err| Error::file(path, err))?;
        serde_json::from_str(&text).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write (or overwrite) the summary as JSON.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string(self).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })?;
        write_file_atomically(path, text.as_bytes())
    }

    /// Index the runs by instance name.
    ///
    /// If an instance occurs more than once, the first run is kept.
    pub fn by_instance(&self) -> BTreeMap<String, &RunRecord> {
        let mut index = BTreeMap::new();
        for run in &self.runs {
            let name = match run.instance_name() {
                Some(name) => name,
                None => {
                    warn!("run without instance: {}", run.command_line.join(" "));
                    continue;
                }
            };
            if index.contains_key(&name) {
                warn!("instance {} occurs more than once, keeping the first run", name);
                continue;
            }
            index.insert(name, run);
        }
        index
    }
}

/// The verdict written by a solver to its result file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverOutcome {
    /// The file was empty.
    NoResult,
    Indeterminate,
    Unsat,
    /// The model; each nonzero literal makes its variable true or false.
    Sat(Assignment),
}

impl SolverOutcome {
    /// Neither a model nor a proof of unsatisfiability.
    pub fn is_indeterminate(&self) -> bool {
        match self {
            SolverOutcome::NoResult | SolverOutcome::Indeterminate => true,
            _ => false,
        }
    }
}

/// Read the verdict a solver wrote to `path`.
pub fn read_solver_result(path: &Path) -> Result<SolverOutcome> {
    let text = fs::read_to_string(path).map_err(|err| Error::file(path, err))?;
    parse_solver_result(&text, path)
}

/// Parse the contents of a result file; `path` is only used in errors.
pub fn parse_solver_result(text: &str, path: &Path) -> Result<SolverOutcome> {
    let mut tokens = text.split_whitespace();
    let head = match tokens.next() {
        None => return Ok(SolverOutcome::NoResult),
        Some(head) => head,
    };
    match head {
        "UNSAT" => Ok(SolverOutcome::Unsat),
        "INDET" => Ok(SolverOutcome::Indeterminate),
        "SAT" => {
            let mut model = Assignment::new();
            for token in tokens {
                let value: i32 = token
                    .parse()
                    .ok()
                    .filter(|&value| value != i32::min_value())
                    .ok_or_else(|| Error::MalformedModel {
                        path: PathBuf::from(path),
                        token: token.to_string(),
                    })?;
                if value != 0 {
                    model.assign(Literal::new(value));
                }
            }
            Ok(SolverOutcome::Sat(model))
        }
        token => Err(Error::UnknownResult {
            path: PathBuf::from(path),
            token: token.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::Variable;

    fn parse(text: &str) -> Result<SolverOutcome> {
        parse_solver_result(text, Path::new("x.result"))
    }

    fn record(command: &[&str], code: Option<i32>, result: RunResult) -> RunRecord {
        RunRecord {
            command_line: command.iter().map(|word| word.to_string()).collect(),
            elapsed_time: 1.5,
            return_code: code,
            result,
        }
    }

    #[test]
    fn solver_results() {
        assert_eq!(parse("").unwrap(), SolverOutcome::NoResult);
        assert_eq!(parse("\n\n").unwrap(), SolverOutcome::NoResult);
        assert_eq!(parse("UNSAT\n").unwrap(), SolverOutcome::Unsat);
        assert_eq!(parse("INDET\n").unwrap(), SolverOutcome::Indeterminate);
        assert!(parse("").unwrap().is_indeterminate());
        assert!(parse("INDET\n").unwrap().is_indeterminate());
        assert!(!parse("UNSAT\n").unwrap().is_indeterminate());
        match parse("SAT\n1 -2 3 0\n").unwrap() {
            SolverOutcome::Sat(model) => {
                assert_eq!(model.len(), 3);
                assert_eq!(model.get(Variable(2)), Some(false));
                assert_eq!(model.get(Variable(3)), Some(true));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn models_with_large_variables() {
        match parse("SAT\n2147483647 -1 0\n").unwrap() {
            SolverOutcome::Sat(model) => {
                assert_eq!(model.len(), 2);
                assert_eq!(model.get(Variable(2147483647)), Some(true));
                assert_eq!(model.get(Variable(1)), Some(false));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_results() {
        match parse("SATISFIABLE\n1 0\n") {
            Err(Error::UnknownResult { token, .. }) => assert_eq!(token, "SATISFIABLE"),
            other => panic!("unexpected {:?}", other),
        }
        match parse("SAT\n1 two 0\n") {
            Err(Error::MalformedModel { token, .. }) => assert_eq!(token, "two"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn command_line_positions() {
        let run = record(
            &["./minisat", "-verb=0", "bench/a.cnf.gz", "out/a.cnf.gz.result", "-rnd-seed=4"],
            Some(10),
            RunResult::Ok,
        );
        assert_eq!(run.instance_name().as_deref(), Some("a.cnf.gz"));
        assert_eq!(run.instance_path(), Some(Path::new("bench/a.cnf.gz")));
        assert_eq!(run.result_path(), Some(Path::new("out/a.cnf.gz.result")));
        assert!(record(&["./minisat"], None, RunResult::Ok).instance_name().is_none());
    }

    #[test]
    fn timeouts_hide_codes() {
        let run = record(&["s", "a.cnf"], Some(10), RunResult::Timeout);
        assert_eq!(run.code(), None);
        assert_eq!(run.time(), None);
        assert!(!run.solved());
        let run = record(&["s", "a.cnf"], Some(7), RunResult::Ok);
        assert_eq!(run.code(), Some(7));
        assert!(!run.solved());
    }

    #[test]
    fn reads_summaries_written_elsewhere() {
        let text = r#"{"timeout": 1000, "runs": [
            {"command_line": ["s", "d/b.cnf", "o/b.cnf.result"], "elapsed_time": 3, "return_code": 20, "result": "OK"},
            {"command_line": ["s", "d/a.cnf", "o/a.cnf.result"], "elapsed_time": 1000.2, "return_code": null, "result": "TIMEOUT"}
        ]}"#;
        let summary: BatchSummary = serde_json::from_str(text).unwrap();
        assert_eq!(summary.timeout, 1000.0);
        assert_eq!(summary.runs[0].code(), Some(20));
        assert_eq!(summary.runs[1].result, RunResult::Timeout);
        let index = summary.by_instance();
        assert_eq!(index.keys().collect::<Vec<_>>(), vec!["a.cnf", "b.cnf"]);
    }

    #[test]
    fn summary_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.json");
        let mut summary = BatchSummary::new(60.0);
        summary.runs.push(record(&["s", "a.cnf"], Some(10), RunResult::Ok));
        summary.to_file(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"result\":\"OK\""));
        assert_eq!(BatchSummary::from_file(&path).unwrap(), summary);
        assert!(!dir.path().join("batch.json.tmp").exists());
    }
}
