//! Command-line front end for the arithmetic sample grammar.

use clap::{Arg, Command};

use fex::scanner::{Calculator, TextScanner};

fn main() {
    let matches = Command::new("fexcalc")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Evaluate an arithmetic expression with the flow-expression calculator grammar")
        .arg(
            Arg::new("expression")
                .help("Expression to evaluate, e.g. \"9 - (5.5 + 3) * 6\"")
                .required(true)
                .index(1),
        )
        .get_matches();

    let expression = matches.get_one::<String>("expression").unwrap();

    match evaluate(expression) {
        Ok(value) => println!("{}", value),
        Err(report) => {
            eprintln!("{}", report);
            std::process::exit(1);
        }
    }
}

fn evaluate(input: &str) -> Result<f64, String> {
    let calc = Calculator::new();
    let mut scanner = TextScanner::new(input);
    if calc.parse(&mut scanner) {
        Ok(calc.value().unwrap_or(0.0))
    } else if scanner.error_log().is_empty() {
        Err("evaluation failed".to_string())
    } else {
        Err(scanner.render_errors())
    }
}
