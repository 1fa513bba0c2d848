//! Punto de entrada ("driver").
//!
//! Este módulo orquesta las diferentes fases del proceso de
//! compilación y expone una CLI. Los códigos de salida siguen la
//! convención de `sysexits.h`.

use anyhow::{self, Context};
use clap::{crate_version, Arg, ArgMatches, Command, ErrorKind};
use marbl::{
    codegen,
    error::Diagnostics,
    exec,
    ir::Module,
    link::{AssembleOptions, Assembler},
};

use std::{
    fs::{self, File},
    io::{self, BufRead, Write},
    path::Path,
    process,
};

use tracing_subscriber::EnvFilter;

const EX_OK: i32 = 0;
const EX_USAGE: i32 = 64;
const EX_DATAERR: i32 = 65;
const EX_NOINPUT: i32 = 66;
const EX_SOFTWARE: i32 = 70;

const DEFAULT_OUTPUT: &str = "build/marbl.o";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("MARBL_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let status = match run() {
        Ok(status) => status,
        Err(error) => {
            eprintln!("error: {:#}", error);
            EX_SOFTWARE
        }
    };

    process::exit(status);
}

fn cli() -> Command<'static> {
    Command::new("marbl")
        .version(crate_version!())
        .about("Marbl compiler")
        .arg(
            Arg::new("script")
                .value_name("SCRIPT")
                .multiple_values(true)
                .help("Source file, starts a REPL if omitted"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .value_name("FILE")
                .default_value(DEFAULT_OUTPUT)
                .help("Output object file"),
        )
        .arg(
            Arg::new("emit-llvm")
                .long("emit-llvm")
                .takes_value(true)
                .value_name("FILE")
                .help("Write LLVM IR instead of an object ('-' for stdout)"),
        )
        .arg(
            Arg::new("run")
                .short('r')
                .long("run")
                .help("Execute the program instead of emitting code"),
        )
        .arg(Arg::new("optimize").short('O').help("Optimize generated code"))
        .arg(
            Arg::new("asm")
                .short('S')
                .help("Generate native assembly instead of an object"),
        )
}

fn run() -> anyhow::Result<i32> {
    let args = match cli().try_get_matches() {
        Ok(args) => args,
        Err(error) => {
            let status = match error.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EX_OK,
                _ => EX_USAGE,
            };

            error.print().context("Failed to write to the terminal")?;
            return Ok(status);
        }
    };

    let scripts: Vec<&str> = args
        .values_of("script")
        .map(Iterator::collect)
        .unwrap_or_default();

    match scripts.as_slice() {
        [] => repl(),
        [script] => compile_file(script, &args),
        _ => {
            eprintln!("{}", cli().render_usage());
            Ok(EX_USAGE)
        }
    }
}

/// Lee, compila e imprime línea por línea hasta el fin de stdin.
fn repl() -> anyhow::Result<i32> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush().context("Failed to write to stdout")?;

        let line = match lines.next() {
            Some(line) => line.context("Failed to read from stdin")?,
            None => break,
        };

        let ast = match marbl::parse_source(line.as_bytes(), "<stdin>") {
            Ok(ast) => ast,
            Err(diagnostics) => {
                eprint!("{}", diagnostics);
                continue;
            }
        };

        print!("{}", ast);
        match codegen::generate(&ast, "<stdin>") {
            Ok(module) => print!("{}", module),
            Err(error) => eprint!("{}", Diagnostics::from(error)),
        }
    }

    println!();
    Ok(EX_OK)
}

fn compile_file(path: &str, args: &ArgMatches) -> anyhow::Result<i32> {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("error: {}: {}", path, error);
            return Ok(EX_NOINPUT);
        }
    };

    let module = match marbl::compile(source.as_bytes(), path) {
        Ok(module) => module,
        Err(diagnostics) => {
            eprint!("{}", diagnostics);
            return Ok(EX_DATAERR);
        }
    };

    if args.is_present("run") {
        let stdout = io::stdout();
        let status = exec::execute(&module, &mut stdout.lock()).context("Execution failed")?;

        return Ok(status);
    }

    if let Some(target) = args.value_of("emit-llvm") {
        emit_llvm(&module, target)?;
        return Ok(EX_OK);
    }

    let output = args.value_of("output").unwrap_or(DEFAULT_OUTPUT);
    if output == "-" {
        eprintln!("error: Refusing to write an object to stdout, use --emit-llvm -");
        return Ok(EX_USAGE);
    }

    assemble(&module, output, args)?;
    Ok(EX_OK)
}

fn emit_llvm(module: &Module, target: &str) -> anyhow::Result<()> {
    match target {
        "-" => {
            let stdout = io::stdout();
            write!(stdout.lock(), "{}", module).context("Failed to emit to stdout")
        }

        path => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to open for writing: {}", path))?;

            write!(file, "{}", module).with_context(|| format!("Failed to emit to file: {}", path))
        }
    }
}

fn assemble(module: &Module, output: &str, args: &ArgMatches) -> anyhow::Result<()> {
    if let Some(directory) = Path::new(output).parent() {
        fs::create_dir_all(directory)
            .with_context(|| format!("Failed to create directory: {}", directory.display()))?;
    }

    let mut options = AssembleOptions::empty();
    if args.is_present("optimize") {
        options |= AssembleOptions::OPTIMIZE;
    }

    if args.is_present("asm") {
        options |= AssembleOptions::ASSEMBLY;
    }

    let mut assembler = Assembler::spawn(&output, options).context("Failed to start backend")?;
    write!(assembler.stdin(), "{}", module).context("Failed to pipe IR to backend")?;

    assembler
        .finish()
        .with_context(|| format!("Failed to generate output: {}", output))?;

    tracing::info!(output, "code emitted");
    Ok(())
}
