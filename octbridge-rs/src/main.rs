use std::io::{self, BufRead, IsTerminal, Write};
use std::process::ExitCode;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use octbridge::cli::{self, CliArgs};
use octbridge::{BridgeError, Octave};

/// Environment variable read for the log filter.
const LOG_ENV: &str = "OCTB_LOG";

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("octb: {e}");
            eprintln!("{}", cli::USAGE);
            return ExitCode::from(2);
        }
    };
    if args.help {
        println!("{}", cli::USAGE);
        return ExitCode::SUCCESS;
    }
    if args.version {
        println!("octb {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    init_tracing(args.verbose);

    // ── Interpreter and init file ─────────────────────────────────────────────
    let config = args.config();
    let (mut oct, warnings) = config.start();
    for w in &warnings {
        eprintln!("octb: warning: {w}");
    }
    flush_output(&mut oct, config.echo);

    // ── Batch mode ────────────────────────────────────────────────────────────
    if !args.interactive() {
        return match run_batch(&mut oct, &args, config.echo) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                report(&e);
                ExitCode::FAILURE
            }
        };
    }

    // ── Interactive session ───────────────────────────────────────────────────
    let tty = io::stdin().is_terminal();
    if tty && !config.silent {
        println!("octb {}: embedded Octave-language interpreter", env!("CARGO_PKG_VERSION"));
        println!("Type `exit' or end input to quit.");
        println!();
    }
    match repl(&mut oct, tty, config.echo) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("octb: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .init();
}

/// Run the scripts, then the `-e` code, stopping at the first fault.
fn run_batch(oct: &mut Octave, args: &CliArgs, echo: bool) -> Result<(), BridgeError> {
    for script in &args.scripts {
        let result = oct.source(script);
        flush_output(oct, echo);
        result?;
    }
    if let Some(code) = &args.code {
        let result = oct.eval(0, code);
        flush_output(oct, echo);
        result?;
    }
    Ok(())
}

/// Read statements from stdin until end of input or `exit`.
///
/// Lines are collected until they form a complete program, so blocks and
/// function definitions can span several lines.
fn repl(oct: &mut Octave, tty: bool, echo: bool) -> io::Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut pending = String::new();

    loop {
        if tty {
            print!("{}", if pending.is_empty() { ">> " } else { "   " });
            io::stdout().flush()?;
        }
        let Some(line) = lines.next().transpose()? else { break };
        if pending.is_empty() && matches!(line.trim(), "exit" | "quit") {
            break;
        }
        pending.push_str(&line);
        pending.push('\n');

        match oct.eval(0, &pending) {
            Err(BridgeError::Parse(e)) if e.is_incomplete() => continue,
            Err(e) => report(&e),
            Ok(_) => {}
        }
        flush_output(oct, echo);
        pending.clear();
    }

    if !pending.trim().is_empty() {
        if let Err(e) = oct.eval(0, &pending) {
            report(&e);
        }
        flush_output(oct, echo);
    }
    Ok(())
}

fn flush_output(oct: &mut Octave, echo: bool) {
    let text = oct.take_output();
    if echo && !text.is_empty() {
        print!("{text}");
        let _ = io::stdout().flush();
    }
}

fn report(e: &BridgeError) {
    match e {
        BridgeError::Parse(p) => eprintln!("{p}"),
        other => eprintln!("error: {other}"),
    }
}
