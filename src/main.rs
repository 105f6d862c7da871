//! procbind - Lazy Native Library Bindings
//!
//! Command-line entry point for probing libraries, calling exports and
//! translating native error codes.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use procbind::{
    invoke_words, parse_word, translate, BindConfig, Bindings, LibraryHandle, Word, MAX_ARGS,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "procbind")]
#[command(version)]
#[command(about = "Lazy bindings to native system libraries", long_about = None)]
struct Cli {
    /// Configuration file (default: procbind.toml in this or a parent directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call an export with integer arguments
    Call {
        /// Library name or path
        library: String,

        /// Export name
        symbol: String,

        /// Word arguments (decimal, negative, or 0x hex)
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Translate a native error code
    Errno {
        /// Error code (decimal or 0x hex)
        code: String,
    },

    /// Load a library and resolve exports
    Probe {
        /// Library name or path
        library: String,

        /// Export names to resolve
        symbols: Vec<String>,

        /// Print registry counters afterwards
        #[arg(long)]
        stats: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Call {
            library,
            symbol,
            args,
        } => {
            let bindings = install_bindings(cli.config.as_ref())?;
            cmd_call(bindings, &library, &symbol, &args)
        }
        Commands::Errno { code } => cmd_errno(&code),
        Commands::Probe {
            library,
            symbols,
            stats,
        } => {
            let bindings = install_bindings(cli.config.as_ref())?;
            cmd_probe(bindings, &library, &symbols, stats)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn install_bindings(config: Option<&PathBuf>) -> Result<&'static Bindings> {
    let config = match config {
        Some(path) => BindConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => BindConfig::load_from_cwd().context("Failed to load config")?,
    };
    if Bindings::install(Bindings::with_config(&config)).is_err() {
        log::warn!("global bindings already initialized; ignoring config");
    }
    Ok(Bindings::global())
}

fn acquire(bindings: &Bindings, library: &str) -> Result<LibraryHandle> {
    let handle = bindings.acquire_library(library);
    handle
        .check()
        .with_context(|| format!("Failed to load {}", library))?;
    Ok(handle)
}

fn cmd_probe(bindings: &Bindings, library: &str, symbols: &[String], stats: bool) -> Result<()> {
    let handle = acquire(bindings, library)?;
    println!("{}: loaded", handle.name());

    let mut missing = 0;
    for symbol in symbols {
        match bindings.resolve_symbol(&handle, symbol) {
            Ok(addr) => println!("  {:<32} {}", symbol, addr),
            Err(e) => {
                missing += 1;
                println!("  {:<32} {}", symbol, e);
            }
        }
    }

    if stats {
        let s = bindings.stats();
        println!();
        println!("Libraries loaded:  {}", s.libraries_loaded);
        println!("Load failures:     {}", s.load_failures);
        println!("Symbols resolved:  {}", s.symbols_resolved);
        println!("Lookup failures:   {}", s.lookup_failures);
    }

    if missing > 0 {
        bail!("{} of {} symbols not found", missing, symbols.len());
    }
    Ok(())
}

fn cmd_call(bindings: &Bindings, library: &str, symbol: &str, args: &[String]) -> Result<()> {
    if args.len() > MAX_ARGS {
        bail!("At most {} arguments are supported, got {}", MAX_ARGS, args.len());
    }
    let words = args
        .iter()
        .map(|arg| parse_word(arg).with_context(|| format!("Invalid argument: {}", arg)))
        .collect::<Result<Vec<Word>>>()?;

    let handle = acquire(bindings, library)?;
    let addr = bindings
        .resolve_symbol(&handle, symbol)
        .with_context(|| format!("Failed to resolve {}", symbol))?;

    // Safety: the caller asserts the export takes `words.len()` word arguments.
    let result = unsafe { invoke_words(addr, &words) }
        .with_context(|| format!("Failed to call {}", symbol))?;

    println!("value:      {} ({:#x})", result.value as isize, result.value);
    println!("last error: {}", result.last_error);
    if result.last_error != 0 {
        println!("            {}", translate(result.last_error));
    }
    Ok(())
}

fn cmd_errno(code: &str) -> Result<()> {
    let word = parse_word(code).with_context(|| format!("Invalid error code: {}", code))?;
    let code = u32::try_from(word).with_context(|| format!("Error code out of range: {}", code))?;
    let err = translate(code);
    match err.code() {
        Some(n) => println!("{} ({:?}, code {})", err, err, n),
        None => println!("{} ({:?})", err, err),
    }
    Ok(())
}
