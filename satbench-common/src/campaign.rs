//! A measurement campaign comparing two solvers over repeated batches
//!
//! Every repetition randomizes (or copies) the corpus into a scratch
//! directory, runs the modified and then the original solver over it, checks
//! the verdicts of both, and verifies all repetitions so far against each
//! other. The results of repetition `<tag>` live in
//! `<results_dir>/{modified,original}_<tag>` and the corresponding `.json`
//! summaries; the repetitions are listed in `<results_dir>/campaign.json`.

use crate::{
    benchmark::{benchmark_batch, instances_in, summary_path, BatchOptions},
    cnf::CnfFormula,
    config::{CAMPAIGN_MANIFEST, DEFAULT_POLL_PERIOD, DEFAULT_THREADS, DEFAULT_TIMEOUT},
    error::{Error, Result},
    files::write_file_atomically,
    output::Timer,
    results::BatchSummary,
    verify::{check_results, verify, write_report, ModelChecker, ResultCheck, VerificationRow},
};
use serde_derive::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

/// The contents of a campaign file.
///
/// ```toml
/// benchmarks_dir = "bench"
/// scratch_dir = "/tmp/bench"
/// original_solver = "minisat/core/minisat"
/// modified_solver = "cubing/minisat"
/// results_dir = "results"
/// threads = 4
/// modified_args = ["-k_c=2", "-no-always-search"]
/// ```
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CampaignConfig {
    /// The unmodified instances
    pub benchmarks_dir: PathBuf,
    /// Receives the randomized copies; wiped before every repetition
    pub scratch_dir: PathBuf,
    pub original_solver: PathBuf,
    pub modified_solver: PathBuf,
    pub results_dir: PathBuf,
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Seconds
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    /// Seconds
    #[serde(default = "default_poll_period")]
    pub poll_period: f64,
    #[serde(default)]
    pub original_args: Vec<String>,
    #[serde(default)]
    pub modified_args: Vec<String>,
}

fn default_threads() -> usize {
    DEFAULT_THREADS
}
fn default_timeout() -> f64 {
    DEFAULT_TIMEOUT
}
fn default_poll_period() -> f64 {
    DEFAULT_POLL_PERIOD
}

impl CampaignConfig {
    pub fn from_file(path: &Path) -> Result<CampaignConfig> {
        let text = fs::read_to_string(path).map_err(|err| Error::file(path, err))?;
        CampaignConfig::parse(&text, path)
    }

    /// Parse a campaign file; `path` is only used in errors.
    pub fn parse(text: &str, path: &Path) -> Result<CampaignConfig> {
        toml::from_str(text).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// One pass over the corpus.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Repetition {
    pub tag: String,
    /// Passed to both solvers
    pub solver_seed: Option<u64>,
    /// Shuffles the instances; absent if they were copied unmodified
    pub randomize_seed: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
struct Manifest {
    repetitions: Vec<Repetition>,
}

/// Which of the two solvers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Original,
    Modified,
}

impl Variant {
    fn prefix(self) -> &'static str {
        match self {
            Variant::Original => "original",
            Variant::Modified => "modified",
        }
    }
    fn description(self) -> &'static str {
        match self {
            Variant::Original => "Original",
            Variant::Modified => "Modified",
        }
    }
}

pub struct Campaign {
    config: CampaignConfig,
    /// File names of the instances in the benchmark directory
    instances: Vec<String>,
    repetitions: Vec<Repetition>,
    pub verbosity: u64,
}

impl Campaign {
    /// Check the directories and executables of `config` and pick up the
    /// repetitions recorded by earlier runs.
    pub fn new(config: CampaignConfig) -> Result<Campaign> {
        if !config.benchmarks_dir.is_dir() {
            return Err(Error::Setup(format!(
                "benchmark directory {} does not exist",
                config.benchmarks_dir.display()
            )));
        }
        for solver in &[&config.original_solver, &config.modified_solver] {
            if !solver.is_file() {
                return Err(Error::Setup(format!("solver {} does not exist", solver.display())));
            }
        }
        if config.threads == 0 {
            return Err(Error::Setup("the thread count must be positive".to_string()));
        }
        for &(key, seconds) in &[("timeout", config.timeout), ("poll_period", config.poll_period)] {
            if !(seconds.is_finite() && seconds > 0.0) {
                return Err(Error::Setup(format!("{} must be a positive number of seconds", key)));
            }
        }
        if !config.results_dir.exists() {
            fs::create_dir_all(&config.results_dir).map_err(|err| Error::file(&config.results_dir, err))?;
        }
        let instances = instances_in(&config.benchmarks_dir)?
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();
        let manifest_path = config.results_dir.join(CAMPAIGN_MANIFEST);
        let repetitions = if manifest_path.exists() {
            let text = fs::read_to_string(&manifest_path).map_err(|err| Error::file(&manifest_path, err))?;
            let manifest: Manifest = serde_json::from_str(&text).map_err(|source| Error::Json {
                path: manifest_path.clone(),
                source,
            })?;
            manifest.repetitions
        } else {
            Vec::new()
        };
        Ok(Campaign {
            config,
            instances,
            repetitions,
            verbosity: 1,
        })
    }

    pub fn config(&self) -> &CampaignConfig {
        &self.config
    }
    pub fn instances(&self) -> &[String] {
        &self.instances
    }
    pub fn repetitions(&self) -> &[Repetition] {
        &self.repetitions
    }

    pub fn print_hello(&self) {
        let solver = |path: &Path, args: &[String]| {
            let mut line = path.display().to_string();
            for arg in args {
                line.push(' ');
                line.push_str(arg);
            }
            line
        };
        write_to_stdout!("=== Measurement corpus ===\n");
        write_to_stdout!("benchmark count: {}\n", self.instances.len());
        write_to_stdout!("benchmark dir:   {}\n", self.config.benchmarks_dir.display());
        write_to_stdout!("scratch dir:     {}\n", self.config.scratch_dir.display());
        write_to_stdout!(
            "original solver: {}\n",
            solver(&self.config.original_solver, &self.config.original_args)
        );
        write_to_stdout!(
            "modified solver: {}\n",
            solver(&self.config.modified_solver, &self.config.modified_args)
        );
        write_to_stdout!("results dir:     {}\n", self.config.results_dir.display());
        write_to_stdout!("thread count:    {}\n", self.config.threads);
        write_to_stdout!("timeout:         {} s\n", self.config.timeout);
        if !self.repetitions.is_empty() {
            write_to_stdout!("earlier runs:    {}\n", self.repetitions.len());
        }
    }

    /// Run one repetition and verify every repetition so far.
    ///
    /// The tag names the results of this repetition and defaults to the
    /// solver seed, or the repetition number if there is none.
    pub fn run_one(
        &mut self,
        solver_seed: Option<u64>,
        randomize_seed: Option<u64>,
        tag: Option<String>,
    ) -> Result<Vec<VerificationRow>> {
        let number = self.repetitions.len() + 1;
        let tag = tag.unwrap_or_else(|| solver_seed.map_or(number, |seed| seed as usize).to_string());
        if self.repetitions.iter().any(|repetition| repetition.tag == tag) {
            return Err(Error::Setup(format!("repetition {} was already run", tag)));
        }
        let repetition = Repetition {
            tag,
            solver_seed,
            randomize_seed,
        };
        self.randomize(randomize_seed)?;
        self.solve_both(&repetition)?;
        self.repetitions.push(repetition);
        self.save_manifest()?;
        let repetition = &self.repetitions[self.repetitions.len() - 1];
        self.check_both(repetition)?;
        self.verify()
    }

    /// Fill the scratch directory with the instances, shuffled with `seed` or
    /// copied as they are.
    pub fn randomize(&self, seed: Option<u64>) -> Result<()> {
        let mut timer = Timer::name(if seed.is_some() { "randomize" } else { "copy" });
        timer.disabled = self.verbosity == 0;
        let scratch = &self.config.scratch_dir;
        match fs::remove_dir_all(scratch) {
            Ok(()) => (),
            Err(ref err) if err.kind() == io::ErrorKind::NotFound => (),
            Err(err) => return Err(Error::file(scratch, err)),
        }
        fs::create_dir_all(scratch).map_err(|err| Error::file(scratch, err))?;
        for name in &self.instances {
            let source = self.config.benchmarks_dir.join(name);
            let target = scratch.join(name);
            match seed {
                None => {
                    fs::copy(&source, &target).map_err(|err| Error::file(&target, err))?;
                }
                Some(seed) => CnfFormula::from_file(&source)?.shuffle(seed).to_file(&target)?,
            }
        }
        Ok(())
    }

    fn results_dir(&self, variant: Variant, repetition: &Repetition) -> PathBuf {
        self.config
            .results_dir
            .join(format!("{}_{}", variant.prefix(), repetition.tag))
    }

    fn solve_both(&self, repetition: &Repetition) -> Result<()> {
        self.solve_one(Variant::Modified, repetition)?;
        self.solve_one(Variant::Original, repetition)?;
        Ok(())
    }

    fn solve_one(&self, variant: Variant, repetition: &Repetition) -> Result<BatchSummary> {
        let mut timer = Timer::name(match variant {
            Variant::Original => "solve original",
            Variant::Modified => "solve modified",
        });
        timer.disabled = self.verbosity == 0;
        let (solver, args) = match variant {
            Variant::Original => (&self.config.original_solver, &self.config.original_args),
            Variant::Modified => (&self.config.modified_solver, &self.config.modified_args),
        };
        let instances: Vec<PathBuf> = self
            .instances
            .iter()
            .map(|name| self.config.scratch_dir.join(name))
            .collect();
        let options = BatchOptions {
            timeout: Duration::from_secs_f64(self.config.timeout),
            threads: self.config.threads,
            poll_period: Duration::from_secs_f64(self.config.poll_period),
            solver_seed: repetition.solver_seed,
            shuffle_seed: None,
            solver_args: args.clone(),
            keep_stderr: false,
            verbosity: self.verbosity,
        };
        benchmark_batch(solver, &instances, &self.results_dir(variant, repetition), &options)
    }

    fn check_both(&self, repetition: &Repetition) -> Result<()> {
        let mut timer = Timer::name("check");
        timer.disabled = self.verbosity == 0;
        for &variant in &[Variant::Original, Variant::Modified] {
            let summary = self.summary(variant, repetition)?;
            let check = check_results(&summary)?;
            self.print_check(variant, &check);
        }
        Ok(())
    }

    fn print_check(&self, variant: Variant, check: &ResultCheck) {
        if self.verbosity == 0 {
            return;
        }
        if check.is_ok() {
            write_to_stdout!("{} OK.\n{}\n", variant.description(), check);
        } else {
            write_to_stdout!("{} had ERRORS.\n", variant.description());
            for name in &check.bad {
                write_to_stdout!("Bad result: {}\n", name);
            }
            write_to_stdout!("also: {}\n", check);
        }
    }

    fn summary(&self, variant: Variant, repetition: &Repetition) -> Result<BatchSummary> {
        BatchSummary::from_file(&summary_path(&self.results_dir(variant, repetition)))
    }

    fn save_manifest(&self) -> Result<()> {
        let path = self.config.results_dir.join(CAMPAIGN_MANIFEST);
        let manifest = Manifest {
            repetitions: self.repetitions.clone(),
        };
        let text = serde_json::to_string_pretty(&manifest).map_err(|source| Error::Json {
            path: path.clone(),
            source,
        })?;
        write_file_atomically(&path, text.as_bytes())
    }

    /// Cross-check the two solvers over every repetition so far and print
    /// the report.
    pub fn verify(&self) -> Result<Vec<VerificationRow>> {
        if self.repetitions.is_empty() {
            return Err(Error::Setup(format!(
                "no repetitions recorded in {}",
                self.config.results_dir.display()
            )));
        }
        let mut timer = Timer::name("verify");
        timer.disabled = self.verbosity == 0;
        let mut references = Vec::with_capacity(self.repetitions.len());
        let mut modified = Vec::with_capacity(self.repetitions.len());
        for repetition in &self.repetitions {
            references.push(self.summary(Variant::Original, repetition)?);
            modified.push(self.summary(Variant::Modified, repetition)?);
        }
        let seeds = self
            .repetitions
            .iter()
            .map(|repetition| repetition.randomize_seed)
            .collect();
        let mut checker = ModelChecker::new(&self.config.benchmarks_dir, seeds);
        let rows = verify(&references, &modified, Some(&mut checker))?;
        for row in &rows {
            if !self.instances.contains(&row.name) {
                warn!("{} is not in {}", row.name, self.config.benchmarks_dir.display());
            }
        }
        if self.verbosity > 0 {
            let stdout = io::stdout();
            write_report(&mut stdout.lock(), &rows, self.repetitions.len())?;
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::findings;
    use std::os::unix::fs::PermissionsExt;

    fn script(path: &Path, body: &str) -> PathBuf {
        fs::write(path, format!("#!/bin/sh\n{}", body)).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_path_buf()
    }

    /// A corpus of one satisfiable and one unsatisfiable instance, a solver
    /// that handles such instances, and one that claims UNSAT for everything.
    fn setup(root: &Path) -> CampaignConfig {
        let bench = root.join("bench");
        fs::create_dir(&bench).unwrap();
        fs::write(bench.join("sat.cnf"), "c one unit\np cnf 3 1\n-3 0\n").unwrap();
        fs::write(bench.join("unsat.cnf"), "p cnf 1 2\n1 0\n-1 0\n").unwrap();
        let honest = script(
            &root.join("honest.sh"),
            "if [ \"$(grep -c ' 0$' \"$1\")\" -gt 1 ]; then echo UNSAT > \"$2\"; exit 20; fi\n\
             printf 'SAT\\n%s\\n' \"$(tail -n 1 \"$1\")\" > \"$2\"\n\
             exit 10\n",
        );
        let pessimist = script(&root.join("pessimist.sh"), "echo UNSAT > \"$2\"\nexit 20\n");
        CampaignConfig::parse(
            &format!(
                "benchmarks_dir = {:?}\nscratch_dir = {:?}\noriginal_solver = {:?}\n\
                 modified_solver = {:?}\nresults_dir = {:?}\ntimeout = 10\npoll_period = 0.01\n",
                bench,
                root.join("scratch"),
                honest,
                pessimist,
                root.join("results")
            ),
            Path::new("campaign.toml"),
        )
        .unwrap()
    }

    #[test]
    fn configuration() {
        let config = CampaignConfig::parse(
            "benchmarks_dir = \"b\"\nscratch_dir = \"s\"\noriginal_solver = \"o\"\n\
             modified_solver = \"m\"\nresults_dir = \"r\"\nmodified_args = [\"-k_c=2\"]\n",
            Path::new("c.toml"),
        )
        .unwrap();
        assert_eq!(config.threads, DEFAULT_THREADS);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(config.original_args.is_empty());
        assert_eq!(config.modified_args, vec!["-k_c=2"]);
        let err = CampaignConfig::parse("benchmarks_dir = 3\n", Path::new("c.toml")).unwrap_err();
        assert!(format!("{}", err).starts_with("c.toml"));
        assert!(CampaignConfig::parse(
            "benchmarks_dir = \"b\"\nscratch_dir = \"s\"\noriginal_solver = \"o\"\n\
             modified_solver = \"m\"\nresults_dir = \"r\"\nthreds = 3\n",
            Path::new("c.toml"),
        )
        .is_err());
    }

    #[test]
    fn rejects_missing_solvers() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = setup(dir.path());
        config.modified_solver = dir.path().join("nonexistent");
        match Campaign::new(config) {
            Err(Error::Setup(message)) => assert!(message.contains("nonexistent")),
            _ => panic!("expected a setup error"),
        }
    }

    #[test]
    fn randomized_repetitions() {
        let dir = tempfile::tempdir().unwrap();
        let config = setup(dir.path());
        let mut campaign = Campaign::new(config.clone()).unwrap();
        campaign.verbosity = 0;
        assert_eq!(campaign.instances(), &["sat.cnf".to_string(), "unsat.cnf".to_string()]);

        campaign.run_one(Some(1), Some(1), None).unwrap();
        let rows = campaign.run_one(Some(2), Some(2), None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "sat.cnf");
        assert_eq!(rows[0].reference.symbols(), "SS");
        assert_eq!(rows[0].modified.symbols(), "UU");
        assert_eq!(rows[0].annotation(), "disagree");
        assert_eq!(rows[1].reference.symbols(), "UU");
        assert_eq!(rows[1].annotation(), "ok");
        assert_eq!(findings(&rows), 1);

        let results = dir.path().join("results");
        for name in &["original_1.json", "modified_2.json", "campaign.json", "original_2"] {
            assert!(results.join(name).exists(), "{}", name);
        }
        assert!(campaign.run_one(Some(2), None, None).is_err());

        // A later session picks up the recorded repetitions.
        let mut resumed = Campaign::new(config).unwrap();
        resumed.verbosity = 0;
        assert_eq!(resumed.repetitions(), campaign.repetitions());
        assert_eq!(resumed.verify().unwrap(), rows);
    }

    #[test]
    fn copied_repetition() {
        let dir = tempfile::tempdir().unwrap();
        let mut campaign = Campaign::new(setup(dir.path())).unwrap();
        campaign.verbosity = 0;
        assert!(campaign.verify().is_err());
        let rows = campaign.run_one(None, None, Some("plain".to_string())).unwrap();
        assert_eq!(rows[0].reference.symbols(), "S");
        assert!(rows[0].reference.is_ok());
        let copy = fs::read_to_string(dir.path().join("scratch").join("unsat.cnf")).unwrap();
        assert_eq!(copy, "p cnf 1 2\n1 0\n-1 0\n");
        assert!(dir.path().join("results").join("modified_plain.json").exists());
    }
}
