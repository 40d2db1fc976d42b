//! Compare the batch summaries of two solvers

use clap::Arg;
use satbench_common::{
    aggregate::{cactus, relative_comparison},
    die,
    output::{install_signal_handler, print_key_value, print_solution},
    results::BatchSummary,
    write_to_stdout,
};
use std::path::Path;

/// Run `compare-runs`.
fn main() {
    std::process::exit(run_frontend());
}

fn mean(times: &[f64]) -> f64 {
    if times.is_empty() {
        0.0
    } else {
        times.iter().sum::<f64>() / times.len() as f64
    }
}

/// Run `compare-runs`, returning its exit code.
fn run_frontend() -> i32 {
    install_signal_handler();
    let matches = clap::App::new("compare-runs")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Sort the instances of two batches by how the two solvers fared")
        .after_help("Exits with 1 if the solvers contradict each other or returned unexpected codes.")
        .arg(
            Arg::with_name("X")
                .required(true)
                .help("batch summary (JSON) of solver X"),
        )
        .arg(
            Arg::with_name("Y")
                .required(true)
                .help("batch summary (JSON) of solver Y"),
        )
        .arg(
            Arg::with_name("CACTUS")
                .short("c")
                .long("cactus")
                .help("Print the sorted solve times of both solvers."),
        )
        .get_matches();
    let read = |name: &str| {
        let path = matches
            .value_of(name)
            .unwrap_or_else(|| die!("no summary given for {}", name));
        BatchSummary::from_file(Path::new(path)).unwrap_or_else(|err| die!("{}", err))
    };
    let x = read("X");
    let y = read("Y");
    let comparison = relative_comparison(&x, &y);

    print_key_value("solved only by X", comparison.x_only.len());
    print_key_value("solved only by Y", comparison.y_only.len());
    print_key_value("unsolved", comparison.unsolved.len());
    print_key_value("SAT by both", comparison.x_sat.len());
    print_key_value("UNSAT by both", comparison.x_unsat.len());
    print_key_value("mean SAT time X (s)", format!("{:.3}", mean(&comparison.x_sat)));
    print_key_value("mean SAT time Y (s)", format!("{:.3}", mean(&comparison.y_sat)));
    print_key_value("mean UNSAT time X (s)", format!("{:.3}", mean(&comparison.x_unsat)));
    print_key_value("mean UNSAT time Y (s)", format!("{:.3}", mean(&comparison.y_unsat)));
    for (name, x_code, y_code) in &comparison.mismatches {
        write_to_stdout!("mismatch {} X={} Y={}\n", name, x_code, y_code);
    }
    for (name, code) in &comparison.x_bad_codes {
        write_to_stdout!("bad code {} X={}\n", name, code);
    }
    for (name, code) in &comparison.y_bad_codes {
        write_to_stdout!("bad code {} Y={}\n", name, code);
    }
    if matches.is_present("CACTUS") {
        for (label, summary) in &[("X", &x), ("Y", &y)] {
            let times: Vec<String> = cactus(summary).iter().map(|time| format!("{:.3}", time)).collect();
            write_to_stdout!("cactus {} {}\n", label, times.join(" "));
        }
    }
    if comparison.is_clean() {
        print_solution("CONSISTENT");
        0
    } else {
        print_solution("INCONSISTENT");
        1
    }
}
