//! Run a solver over every instance in a directory

use clap::{value_t, Arg};
use satbench_common::{
    benchmark::{benchmark_batch, instances_in, summary_path, BatchOptions},
    config::{DEFAULT_POLL_PERIOD, DEFAULT_THREADS, DEFAULT_TIMEOUT},
    die,
    output::{install_signal_handler, print_key_value},
};
use std::{path::Path, time::Duration};

fn main() {
    install_signal_handler();
    let default_timeout = DEFAULT_TIMEOUT.to_string();
    let default_threads = DEFAULT_THREADS.to_string();
    let default_poll_period = DEFAULT_POLL_PERIOD.to_string();
    let matches = clap::App::new("run-batch")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Solve each instance of a directory once, in random order")
        .after_help(
            "The solver is invoked as SOLVER INSTANCE RESULTS_DIR/NAME.result [ARGS...] [-rnd-seed=SEED].
Finished runs are kept in RESULTS_DIR/partial.json; the final summary is written to RESULTS_DIR.json.",
        )
        .arg(Arg::with_name("SOLVER").required(true).help("solver executable"))
        .arg(
            Arg::with_name("INSTANCES")
                .required(true)
                .help("directory of .cnf and .cnf.gz files"),
        )
        .arg(
            Arg::with_name("RESULTS")
                .required(true)
                .help("directory for result files, must not exist"),
        )
        .arg(
            Arg::with_name("ARGS")
                .multiple(true)
                .last(true)
                .help("extra solver arguments"),
        )
        .arg(
            Arg::with_name("TIMEOUT")
                .takes_value(true)
                .short("t")
                .long("timeout")
                .default_value(&default_timeout)
                .help("Wall-clock seconds per run."),
        )
        .arg(
            Arg::with_name("THREADS")
                .takes_value(true)
                .short("j")
                .long("threads")
                .default_value(&default_threads)
                .help("Number of solvers running at the same time."),
        )
        .arg(
            Arg::with_name("POLL_PERIOD")
                .takes_value(true)
                .long("poll-period")
                .default_value(&default_poll_period)
                .help("Seconds between two checks of the running solvers."),
        )
        .arg(
            Arg::with_name("SEED")
                .takes_value(true)
                .short("s")
                .long("seed")
                .help("Pass -rnd-seed=SEED to the solver."),
        )
        .arg(
            Arg::with_name("ORDER_SEED")
                .takes_value(true)
                .long("order-seed")
                .help("Seed of the order in which the instances are started."),
        )
        .arg(
            Arg::with_name("KEEP_STDERR")
                .long("keep-stderr")
                .help("Write the solver's standard error to RESULTS_DIR/NAME.stderr."),
        )
        .arg(
            Arg::with_name("QUIET")
                .short("q")
                .long("quiet")
                .help("Do not print a line per finished run."),
        )
        .get_matches();

    let solver = matches.value_of("SOLVER").unwrap_or_else(|| die!("no solver given"));
    let instances_dir = matches
        .value_of("INSTANCES")
        .unwrap_or_else(|| die!("no instance directory given"));
    let results_dir = matches
        .value_of("RESULTS")
        .unwrap_or_else(|| die!("no results directory given"));
    let timeout = value_t!(matches, "TIMEOUT", f64).unwrap_or_else(|err| err.exit());
    let poll_period = value_t!(matches, "POLL_PERIOD", f64).unwrap_or_else(|err| err.exit());
    if !(timeout > 0.0 && timeout.is_finite() && poll_period > 0.0 && poll_period.is_finite()) {
        die!("timeout and poll period must be positive");
    }
    let threads = value_t!(matches, "THREADS", usize).unwrap_or_else(|err| err.exit());
    if threads == 0 {
        die!("the thread count must be positive");
    }
    let options = BatchOptions {
        timeout: Duration::from_secs_f64(timeout),
        threads,
        poll_period: Duration::from_secs_f64(poll_period),
        solver_seed: matches
            .value_of("SEED")
            .map(|_| value_t!(matches, "SEED", u64).unwrap_or_else(|err| err.exit())),
        shuffle_seed: matches
            .value_of("ORDER_SEED")
            .map(|_| value_t!(matches, "ORDER_SEED", u64).unwrap_or_else(|err| err.exit())),
        solver_args: matches
            .values_of("ARGS")
            .map_or_else(Vec::new, |args| args.map(String::from).collect()),
        keep_stderr: matches.is_present("KEEP_STDERR"),
        verbosity: if matches.is_present("QUIET") { 0 } else { 1 },
    };

    let instances = instances_in(Path::new(instances_dir)).unwrap_or_else(|err| die!("{}", err));
    if instances.is_empty() {
        die!("no instances in {}", instances_dir);
    }
    let summary = benchmark_batch(Path::new(solver), &instances, Path::new(results_dir), &options)
        .unwrap_or_else(|err| die!("{}", err));
    let solved = summary.runs.iter().filter(|run| run.solved()).count();
    print_key_value("runs", summary.runs.len());
    print_key_value("solved", solved);
    print_key_value("summary", summary_path(Path::new(results_dir)).display());
}
