//! Write a randomized but isomorphic copy of a DIMACS formula

use clap::{value_t, Arg};
use satbench_common::{
    cnf::CnfFormula,
    die,
    output::{install_signal_handler, print_key_value},
};
use std::path::Path;

fn main() {
    install_signal_handler();
    let matches = clap::App::new("shuffle-cnf")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Permute the clauses, rename the variables and flip their signs")
        .after_help("Files may be compressed - supported file extensions are: zst, gz, bz2, xz and lz4.")
        .arg(
            Arg::with_name("INPUT")
                .required(true)
                .help("input file in DIMACS format"),
        )
        .arg(
            Arg::with_name("OUTPUT")
                .required(true)
                .help("output file in DIMACS format"),
        )
        .arg(
            Arg::with_name("SEED")
                .required(true)
                .help("the same seed always produces the same output"),
        )
        .arg(
            Arg::with_name("VERBOSE")
                .short("v")
                .long("verbose")
                .help("Print statistics of the formula."),
        )
        .get_matches();
    let input = matches.value_of("INPUT").unwrap_or_else(|| die!("no input file given"));
    let output = matches.value_of("OUTPUT").unwrap_or_else(|| die!("no output file given"));
    let seed = value_t!(matches, "SEED", u64).unwrap_or_else(|err| err.exit());

    let formula = CnfFormula::from_file(Path::new(input)).unwrap_or_else(|err| die!("{}: {}", input, err));
    let shuffled = formula.shuffle(seed);
    shuffled
        .to_file(Path::new(output))
        .unwrap_or_else(|err| die!("{}", err));
    if matches.is_present("VERBOSE") {
        print_key_value("clauses", formula.num_clauses());
        print_key_value("variables", formula.num_variables());
        print_key_value("maximum variable", formula.max_variable());
        print_key_value("literals", formula.num_literals());
        for (width, count) in formula.widths() {
            print_key_value(&format!("clauses of width {}", width), count);
        }
    }
}
