//! Compare an original and a modified SAT solver over repeated randomized runs

use clap::{value_t, Arg};
use satbench_common::{
    campaign::{Campaign, CampaignConfig},
    die,
    output::{install_signal_handler, print_solution},
    verify::findings,
};
use std::path::Path;

/// Run `satbench`.
fn main() {
    std::process::exit(run_frontend());
}

/// Run `satbench`, returning its exit code.
///
/// This is a separate function because `std::process::exit` does not
/// call destructors.
fn run_frontend() -> i32 {
    install_signal_handler();
    let matches = clap::App::new("satbench")
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .after_help(
            "Each repetition solves the corpus with both solvers, checks every claimed model \
against the original instance and prints a table comparing all repetitions so far.
The exit code is 1 if the table contains any finding.",
        )
        .arg(
            Arg::with_name("CONFIG")
                .required(true)
                .help("campaign file in TOML format"),
        )
        .arg(
            Arg::with_name("REPETITIONS")
                .takes_value(true)
                .short("n")
                .long("repetitions")
                .default_value("1")
                .help("Number of passes over the corpus."),
        )
        .arg(
            Arg::with_name("SEED")
                .takes_value(true)
                .short("s")
                .long("seed")
                .default_value("1")
                .help("Seed of the first repetition; later ones count up from it."),
        )
        .arg(
            Arg::with_name("NO_RANDOMIZE")
                .long("no-randomize")
                .help("Solve unmodified copies of the instances."),
        )
        .arg(
            Arg::with_name("VERIFY_ONLY")
                .long("verify-only")
                .help("Only verify the repetitions recorded in the results directory."),
        )
        .arg(
            Arg::with_name("QUIET")
                .short("q")
                .long("quiet")
                .help("Only print the final verdict."),
        )
        .get_matches();

    let config_file = matches
        .value_of("CONFIG")
        .unwrap_or_else(|| die!("no campaign file given"));
    let repetitions = value_t!(matches, "REPETITIONS", usize).unwrap_or_else(|err| err.exit());
    let seed = value_t!(matches, "SEED", u64).unwrap_or_else(|err| err.exit());
    let config = CampaignConfig::from_file(Path::new(config_file)).unwrap_or_else(|err| die!("{}", err));
    let mut campaign = Campaign::new(config).unwrap_or_else(|err| die!("{}", err));
    campaign.verbosity = if matches.is_present("QUIET") { 0 } else { 1 };

    let rows = if matches.is_present("VERIFY_ONLY") {
        campaign.verify().unwrap_or_else(|err| die!("{}", err))
    } else {
        if campaign.verbosity > 0 {
            campaign.print_hello();
        }
        let mut rows = Vec::new();
        for _ in 0..repetitions {
            let solver_seed = seed + campaign.repetitions().len() as u64;
            let randomize_seed = if matches.is_present("NO_RANDOMIZE") {
                None
            } else {
                Some(solver_seed)
            };
            rows = campaign
                .run_one(Some(solver_seed), randomize_seed, None)
                .unwrap_or_else(|err| die!("{}", err));
        }
        rows
    };
    let count = findings(&rows);
    if count == 0 {
        print_solution("VERIFIED");
        0
    } else {
        print_solution(&format!("FAILED ({} instances with findings)", count));
        1
    }
}
