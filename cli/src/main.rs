use clap::{Arg, ArgAction, ArgMatches, Command};
use log::debug;
use resumable_core::{
    ast, generate_error_report, lower_async_body, DriverOptions, LoweredBody, LoweringOptions, StateMachine, StdHost,
};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

mod output;

use output::Printer;

/// Machine-readable summary printed by `run --format json`.
#[derive(Serialize)]
struct RunReport<'a> {
    result: String,
    trace: &'a [String],
    resumptions: usize,
    callbacks: usize,
}

fn main() {
    let cli = Command::new("resumable")
        .version("0.1.0")
        .about("Lower bodies with suspend points into resumable state machines");

    let cli = setup_cli(cli);
    let matches = cli.get_matches();
    init_logging(matches.get_flag("verbose"));

    let code = dispatch_commands(&matches);
    std::process::exit(code);
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

/// Lowering switches shared by `lower` and `run`.
fn lowering_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("file")
            .help("JSON file holding the body to lower")
            .required(true)
            .index(1),
    )
    .arg(
        Arg::new("no-spill")
            .help("Do not spill operands evaluated before a suspend point")
            .long("no-spill")
            .action(ArgAction::SetTrue),
    )
    .arg(
        Arg::new("strict-handlers")
            .help("Reject suspend points in catch, finally and fault bodies")
            .long("strict-handlers")
            .action(ArgAction::SetTrue),
    )
}

/// Sets up the CLI with subcommands and arguments.
fn setup_cli(cli: Command) -> Command {
    cli.arg(
        Arg::new("verbose")
            .help("Log lowering decisions (same as RUST_LOG=debug)")
            .short('v')
            .long("verbose")
            .global(true)
            .action(ArgAction::SetTrue),
    )
    .subcommand(
        lowering_args(Command::new("lower").about("Lower a body and print the result"))
            .arg(
                Arg::new("format")
                    .help("Output format of the lowered tree")
                    .short('f')
                    .long("format")
                    .value_parser(["tree", "json"])
                    .default_value("tree")
                    .value_name("FORMAT"),
            )
            .arg(
                Arg::new("table")
                    .help("Also print the resumption table and persisted storage")
                    .long("table")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("output")
                    .help("Write the lowered tree to a file instead of stdout")
                    .short('o')
                    .long("output")
                    .value_parser(clap::value_parser!(PathBuf))
                    .value_name("FILE"),
            ),
    )
    .subcommand(
        lowering_args(Command::new("run").about("Lower a body and drive it to completion"))
            .arg(
                Arg::new("max-resumptions")
                    .help("Give up after this many resumptions")
                    .long("max-resumptions")
                    .value_parser(clap::value_parser!(usize))
                    .value_name("N"),
            )
            .arg(
                Arg::new("format")
                    .help("Output format of the run summary")
                    .short('f')
                    .long("format")
                    .value_parser(["text", "json"])
                    .default_value("text")
                    .value_name("FORMAT"),
            ),
    )
}

fn lowering_options(sub_m: &ArgMatches) -> LoweringOptions {
    LoweringOptions {
        spill_operands: !sub_m.get_flag("no-spill"),
        reduce_handlers: !sub_m.get_flag("strict-handlers"),
    }
}

/// Load and lower the body named by the `file` argument, reporting failures.
fn load_and_lower(sub_m: &ArgMatches, printer: &mut Printer<std::io::Stderr>) -> Option<LoweredBody> {
    let file = sub_m.get_one::<String>("file")?;
    debug!("Loading body from {}", file);
    let lowered = ast::load_json_file(&PathBuf::from(file))
        .and_then(|body| lower_async_body(&body, &lowering_options(sub_m)));
    match lowered {
        Ok(l) => Some(l),
        Err(e) => {
            printer.error(&generate_error_report(&e)).ok();
            None
        }
    }
}

/// Dispatches the command based on the parsed arguments and returns the
/// process exit code.
fn dispatch_commands(matches: &ArgMatches) -> i32 {
    let mut out = Printer::new(std::io::stdout());
    let mut err = Printer::new(std::io::stderr());

    match matches.subcommand() {
        Some(("lower", sub_m)) => {
            let Some(lowered) = load_and_lower(sub_m, &mut err) else {
                return 1;
            };

            let rendered = match sub_m.get_one::<String>("format").map(String::as_str) {
                Some("json") => ast::to_json(&lowered.body),
                _ => lowered.body.to_string(),
            };
            match sub_m.get_one::<PathBuf>("output") {
                Some(path) => {
                    if let Err(e) = fs::write(path, &rendered) {
                        err.error(&format!("Failed to write {}: {}", path.display(), e)).ok();
                        return 1;
                    }
                }
                None => {
                    out.raw(&rendered).ok();
                }
            }

            if sub_m.get_flag("table") {
                out.title("Resumption table").ok();
                out.raw(output::resume_table(&lowered)).ok();
                out.title("Persisted storage").ok();
                out.raw(output::storage_table(&lowered)).ok();
            }
            0
        }
        Some(("run", sub_m)) => {
            let Some(lowered) = load_and_lower(sub_m, &mut err) else {
                return 1;
            };
            let mut options = DriverOptions::default();
            if let Some(n) = sub_m.get_one::<usize>("max-resumptions") {
                options.max_resumptions = *n;
            }

            let mut machine = StateMachine::new(&lowered);
            let mut host = StdHost::new();
            let result = machine.run_to_completion(&mut host, &options);

            if sub_m.get_one::<String>("format").map(String::as_str) == Some("json") {
                return match result {
                    Ok(value) => {
                        let report = RunReport {
                            result: value.to_string(),
                            trace: host.trace(),
                            resumptions: machine.resumptions(),
                            callbacks: machine.callbacks(),
                        };
                        match serde_json::to_string_pretty(&report) {
                            Ok(json) => {
                                out.raw(&json).ok();
                                0
                            }
                            Err(e) => {
                                err.error(&format!("Failed to encode run report: {}", e)).ok();
                                1
                            }
                        }
                    }
                    Err(e) => {
                        err.error(&generate_error_report(&e)).ok();
                        1
                    }
                };
            }

            for line in host.trace() {
                out.trace(line).ok();
            }
            match result {
                Ok(value) => {
                    out.success("completed").ok();
                    out.field("result", value).ok();
                    out.field("resumptions", machine.resumptions()).ok();
                    out.field("callbacks", machine.callbacks()).ok();
                    0
                }
                Err(e) => {
                    err.error(&generate_error_report(&e)).ok();
                    1
                }
            }
        }
        _ => {
            err.warning("No valid subcommand was used. Use --help for more information.").ok();
            2
        }
    }
}
