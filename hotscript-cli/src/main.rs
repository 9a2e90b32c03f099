//! Hotscript CLI - Command line interface
//!
//! Runs scripts from the configured search roots through a reloading
//! script cache. Configuration comes from `hotscript.json` (or `--config`),
//! command line flags and `HOTSCRIPT_PATH`.

use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

mod config;
mod logging;
mod platform;

use crate::config::{parse_log_level, LogConfig};
use crate::logging::LogFormat;
use crate::platform::print_error;
use hotscript_api::{Binding, Engine, EngineConfig, EngineError, LogLevel, Value, ARG_BINDING};
use tracing::{debug, info};

const TARGET: &str = "hotscript::cli";

/// 当前目录下自动读取的配置文件
const DEFAULT_CONFIG: &str = "hotscript.json";

#[derive(Parser)]
#[command(
    name = "hotscript",
    about = "Hotscript - scripts compiled on demand and reloaded on change",
    version
)]
struct Cli {
    /// Configuration file (default: ./hotscript.json if present)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Search root, directory or file:// URL; repeatable, first wins
    #[arg(long = "root", short = 'r', value_name = "DIR", global = true)]
    roots: Vec<String>,

    /// Log level: silent, error, warn, info, debug, trace
    #[arg(long, value_name = "LEVEL", value_parser = parse_log_level, global = true)]
    log_level: Option<LogLevel>,

    /// Log output format
    #[arg(long, value_enum, default_value = "compact", global = true)]
    log_format: LogFormat,

    /// Also append logs to this file
    #[arg(long, value_name = "FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a script and print its output and result
    Run {
        /// Script name relative to the search roots
        script: String,
        /// Treat the name as a dotted module name (pkg.util → pkg/util.hs)
        #[arg(long)]
        module: bool,
        /// Value bound to the `arg` variable
        #[arg(long)]
        arg: Option<String>,
    },
    /// Compile scripts without running them
    Check {
        /// Script names relative to the search roots
        #[arg(required = true)]
        scripts: Vec<String>,
        /// Print errors as JSON reports
        #[arg(long)]
        json: bool,
        /// Print the compiled bytecode
        #[arg(long)]
        dump: bool,
    },
    /// Read script names from stdin and run each one, until `quit` or EOF
    Repl,
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let log_config = LogConfig::from_logging(&config.logging).with_global(cli.log_level);
    if let Err(e) = logging::init(&log_config, cli.log_format, cli.log_file.as_deref()) {
        eprintln!("Error: cannot initialize logging: {}", e);
        process::exit(1);
    }

    let engine = match Engine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    info!(target: TARGET, roots = ?engine.describe_roots(), "starting");

    let ok = match &cli.command {
        Command::Run { script, module, arg } => {
            let name = if *module {
                engine.module_resource(script)
            } else {
                script.clone()
            };
            handle_run(&engine, &name, arg.as_deref())
        }
        Command::Check {
            scripts,
            json,
            dump,
        } => handle_check(&engine, scripts, *json, *dump),
        Command::Repl => handle_repl(&engine),
    };

    if !ok {
        process::exit(1);
    }
}

/// 配置文件 → 命令行根（优先级最高） → HOTSCRIPT_PATH
fn load_config(cli: &Cli) -> Result<EngineConfig, EngineError> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG).is_file() => EngineConfig::load(Path::new(DEFAULT_CONFIG))?,
        None => EngineConfig::default(),
    };

    if !cli.roots.is_empty() {
        let mut roots = cli.roots.clone();
        roots.append(&mut config.roots);
        config.roots = roots;
    }
    config = config.with_env_paths();
    if config.roots.is_empty() {
        config.roots.push(".".to_string());
    }
    Ok(config)
}

fn handle_run(engine: &Engine, name: &str, arg: Option<&str>) -> bool {
    let mut binding = Binding::new();
    if let Some(arg) = arg {
        binding.set(ARG_BINDING, arg);
    }

    match engine.run(name, &mut binding) {
        Ok(output) => {
            for line in &output.stdout {
                println!("{}", line);
            }
            if output.value != Value::Null {
                println!("{}", output.value);
            }
            debug!(target: TARGET, name, instructions = output.instructions, "run finished");
            true
        }
        Err(e) => {
            print_error(engine, &e);
            false
        }
    }
}

fn handle_check(engine: &Engine, scripts: &[String], json: bool, dump: bool) -> bool {
    let mut ok = true;
    for name in scripts {
        match engine.compile(name) {
            Ok(script) => {
                if dump {
                    let program = script.program();
                    for module in &program.modules {
                        print!("{}", module.chunk.disassemble(&module.name));
                    }
                    print!("{}", program.entry.disassemble(name));
                }
                if !json {
                    println!("✅ {}", name);
                }
            }
            Err(e) => {
                ok = false;
                if json {
                    match serde_json::to_string(&e.to_report()) {
                        Ok(report) => println!("{}", report),
                        Err(err) => eprintln!("Error: cannot serialize report: {}", err),
                    }
                } else {
                    print_error(engine, &e);
                }
            }
        }
    }
    ok
}

fn handle_repl(engine: &Engine) -> bool {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();

    loop {
        print!("> ");
        let _ = stdout.flush();

        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("Error: cannot read input: {}", e);
                return false;
            }
        }

        let name = line.trim();
        match name {
            "" => continue,
            "quit" | "exit" => break,
            _ => {
                handle_run(engine, name, None);
            }
        }
    }
    true
}
