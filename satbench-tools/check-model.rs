//! Check a model reported by a solver against a DIMACS formula

use clap::Arg;
use satbench_common::{
    cnf::CnfFormula,
    comment, die,
    output::{install_signal_handler, print_key_value, print_solution},
    results::{read_solver_result, SolverOutcome},
};
use std::path::Path;

/// Run `check-model`.
fn main() {
    std::process::exit(run_frontend());
}

/// Run `check-model`, returning its exit code.
fn run_frontend() -> i32 {
    install_signal_handler();
    let matches = clap::App::new("check-model")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Evaluate the model in a solver result file on a formula")
        .after_help(
            "The result file starts with SAT, UNSAT or INDET; SAT is followed by the literals of the model.
Exits with 0 if the model satisfies the formula, 1 if it does not and 2 on errors.",
        )
        .arg(
            Arg::with_name("INPUT")
                .required(true)
                .help("input file in DIMACS format"),
        )
        .arg(
            Arg::with_name("RESULT")
                .required(true)
                .help("result file written by the solver"),
        )
        .arg(
            Arg::with_name("SEED")
                .takes_value(true)
                .short("s")
                .long("shuffled-with")
                .help("The model was found on a copy of INPUT shuffled with this seed."),
        )
        .get_matches();
    let input = matches.value_of("INPUT").unwrap_or_else(|| die!("no input file given"));
    let result = matches.value_of("RESULT").unwrap_or_else(|| die!("no result file given"));
    let seed = matches.value_of("SEED").map(|seed| {
        seed.parse::<u64>()
            .unwrap_or_else(|err| die!("invalid seed {}: {}", seed, err))
    });

    let formula = CnfFormula::from_file(Path::new(input)).unwrap_or_else(|err| die!("{}: {}", input, err));
    let model = match read_solver_result(Path::new(result)).unwrap_or_else(|err| die!("{}", err)) {
        SolverOutcome::Sat(model) => model,
        outcome => {
            comment!("the result file holds no model: {:?}", outcome);
            print_solution("NO MODEL");
            return 1;
        }
    };
    let model = match seed {
        Some(seed) => formula.renaming(seed).backward(&model),
        None => model,
    };
    let unsatisfied = formula.unsatisfied_clauses(&model);
    print_key_value("assigned variables", model.len());
    print_key_value("undetermined clauses", unsatisfied.undetermined.len());
    print_key_value("conflicting clauses", unsatisfied.conflicting.len());
    if unsatisfied.is_empty() {
        print_solution("VERIFIED");
        0
    } else {
        if let Some(&index) = unsatisfied.conflicting.first().or_else(|| unsatisfied.undetermined.first()) {
            let clause: Vec<String> = formula.clauses()[index]
                .iter()
                .map(|literal| literal.to_string())
                .collect();
            comment!("clause {} is not satisfied: {} 0", index + 1, clause.join(" "));
        }
        print_solution("FAILED");
        1
    }
}
