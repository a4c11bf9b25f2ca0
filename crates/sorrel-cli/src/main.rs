use std::{env, fs, io::Read as _, process::ExitCode};

use sorrel::{
    Env, Host, Interp, NoopTracer, ScopeMode, StdPrint, StderrTracer, StdinSource, Tracer, execute,
    optimize_bytecodes,
};

const USAGE: &str = "usage: sorrel [--tree|--vm] [--opt] [--dynamic-scoping] [--stats] [--stats-json] [--trace] [FILE]
Runs FILE (or a program read from stdin) on the bytecode VM, or on the
tree-walking evaluator with --tree. --opt enables the AST and bytecode
optimizers. --stats / --stats-json report VM execution statistics.";

#[derive(Debug, Default)]
struct Options {
    path: Option<String>,
    tree: bool,
    opt: bool,
    dynamic: bool,
    stats: bool,
    stats_json: bool,
    trace: bool,
}

fn main() -> ExitCode {
    let mut options = Options::default();
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--tree" => options.tree = true,
            "--vm" => options.tree = false,
            "--opt" => options.opt = true,
            "--dynamic-scoping" => options.dynamic = true,
            "--stats" => options.stats = true,
            "--stats-json" => options.stats_json = true,
            "--trace" => options.trace = true,
            "--help" | "-h" => {
                println!("{USAGE}");
                return ExitCode::SUCCESS;
            }
            flag if flag.starts_with('-') => {
                eprintln!("unknown option: {flag}\n{USAGE}");
                return ExitCode::FAILURE;
            }
            path => {
                if options.path.replace(path.to_owned()).is_some() {
                    eprintln!("only one program file may be given\n{USAGE}");
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    let source = match read_source(options.path.as_deref()) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    if options.trace {
        run(&options, &source, StderrTracer::new())
    } else {
        run(&options, &source, NoopTracer)
    }
}

fn read_source(path: Option<&str>) -> Result<String, String> {
    match path {
        Some(path) => fs::read_to_string(path).map_err(|err| format!("cannot read {path}: {err}")),
        None => {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .map_err(|err| format!("cannot read stdin: {err}"))?;
            Ok(source)
        }
    }
}

fn run<T: Tracer>(options: &Options, source: &str, tracer: T) -> ExitCode {
    let interp = match Interp::new(source) {
        Ok(interp) => interp,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    let interp = if options.opt { interp.optimize() } else { interp };

    let scoping = if options.dynamic { ScopeMode::Dynamic } else { ScopeMode::Lexical };
    let mut host = Host::new(StdPrint, StdinSource, tracer, scoping);

    if options.tree {
        match interp.run_tree(&mut host) {
            Ok(value) => {
                eprintln!("{value}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("{err}");
                ExitCode::FAILURE
            }
        }
    } else {
        let mut insts = interp.bytecode();
        if options.opt {
            insts = optimize_bytecodes(&insts);
        }
        match execute(insts.into(), Env::new(), &mut host) {
            Ok((value, stats)) => {
                if options.stats_json {
                    match serde_json::to_string_pretty(&stats) {
                        Ok(json) => println!("{json}"),
                        Err(err) => eprintln!("cannot serialize stats: {err}"),
                    }
                } else if options.stats {
                    eprintln!("{stats}");
                }
                eprintln!("{value}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("{err}");
                ExitCode::FAILURE
            }
        }
    }
}
