use std::path::PathBuf;
use std::process;
use std::result::Result;

use clap::{Args, Parser, Subcommand};
use diaport_core::locator::{self, Locator};
use diaport_core::prelude::*;
use diaport_core::session::LineNumber;
use diaport_utils::{info, init_logging, LogFormat, LogLevel, Settings};

/// Inspect debug-symbol stores through whichever symbol engine is installed.
#[derive(Parser, Debug)]
#[command(name = "diaport")]
#[command(version)]
#[command(about = "Inspect debug-symbol stores through whichever symbol engine is installed", long_about = None)]
struct Cli
{
    /// Log level (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format: pretty or json (overrides DIAPORT_LOG_FORMAT)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct StoreArgs
{
    /// Path to a debug store
    #[arg(long, conflicts_with = "exe", required_unless_present = "exe")]
    store: Option<PathBuf>,

    /// Load the store recorded in this executable's debug directory
    #[arg(long)]
    exe: Option<PathBuf>,

    /// `;`-separated directories searched for the executable's store (overrides DIAPORT_SYMBOL_PATH)
    #[arg(long, requires = "exe")]
    search_path: Option<String>,

    /// Expected store GUID
    #[arg(long, requires_all = ["store", "signature"])]
    guid: Option<Guid>,

    /// Expected 32-bit signature
    #[arg(long, requires = "guid", value_parser = parse_u32)]
    signature: Option<u32>,

    /// Expected store age
    #[arg(long, default_value_t = 1)]
    age: u32,

    /// Image load address used for virtual addresses
    #[arg(long, value_parser = parse_u64, default_value = "0")]
    load_address: u64,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct AddressArgs
{
    /// Relative virtual address
    #[arg(long, value_parser = parse_u32)]
    rva: Option<u32>,

    /// Virtual address
    #[arg(long, value_parser = parse_u64)]
    va: Option<u64>,

    /// Section and offset as `section:offset`
    #[arg(long, value_parser = parse_section_offset)]
    addr: Option<SectionOffset>,
}

impl AddressArgs
{
    fn address(&self) -> Option<Address>
    {
        self.rva
            .map(|rva| Address::Rva(Rva::new(rva)))
            .or_else(|| self.va.map(|va| Address::Va(Va::new(va))))
            .or_else(|| self.addr.map(Address::Section))
    }
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Show the engine probe order and which engine answers
    Locate,
    /// Show a store's signature, machine and table sizes
    Info
    {
        #[command(flatten)]
        store: StoreArgs,
    },
    /// List children of the global scope
    Symbols
    {
        #[command(flatten)]
        store: StoreArgs,
        /// Symbol tag to list (e.g. Function, Data, PublicSymbol)
        #[arg(long, default_value = "Null")]
        tag: SymTag,
        /// Name to match
        #[arg(long)]
        name: Option<String>,
        /// Compare names ignoring case
        #[arg(long)]
        ignore_case: bool,
        /// Treat the name as a `*`/`?` wildcard pattern
        #[arg(long)]
        wildcard: bool,
        /// Compare against undecorated names
        #[arg(long)]
        undecorated: bool,
    },
    /// Resolve an address to a symbol and source lines
    Lookup
    {
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        address: AddressArgs,
        /// Symbol tag to look for
        #[arg(long, default_value = "Null")]
        tag: SymTag,
    },
    /// List line records for an address range
    Lines
    {
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        address: AddressArgs,
        /// Length of the range in bytes
        #[arg(long, default_value_t = 1)]
        length: u32,
    },
    /// List debug streams and their record counts
    Streams
    {
        #[command(flatten)]
        store: StoreArgs,
    },
}

fn main()
{
    let cli = Cli::parse();

    let mut settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            process::exit(2);
        }
    };
    if let Some(level) = cli.log_level {
        settings.log_filter = tracing_level_name(level).to_string();
    }
    if let Some(format) = cli.log_format {
        settings.log_format = format;
    }

    let _guard = match init_logging(&settings) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli.command, &settings) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn tracing_level_name(level: LogLevel) -> &'static str
{
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

fn run_command(command: Commands, settings: &Settings) -> Result<(), Box<dyn std::error::Error>>
{
    match command {
        Commands::Locate => {
            let registry = locator::global_registry()
                .read()
                .map_err(|_| "engine registry lock poisoned")?;
            let probe = Locator::new(&registry);
            println!("Probe order:");
            for report in probe.probe_all() {
                match report.outcome {
                    Ok(()) => println!("  {}  available", report.identity),
                    Err(err) => println!("  {}  {}", report.identity, err),
                }
            }
            let handle = probe.locate()?;
            let how = if handle.is_fallback() { "default registration" } else { "version probe" };
            println!("Using engine {} ({how})", handle.identity());
            Ok(())
        }
        Commands::Info { store } => {
            let (_source, session) = open(&store, settings)?;
            let signature = session.signature()?;
            println!("GUID:      {}", signature.guid);
            println!("Signature: 0x{:08X}", signature.signature);
            println!("Age:       {}", signature.age);
            println!("Machine:   {}", session.machine()?);
            println!("Tables:");
            for table in session.enum_tables()? {
                println!("  {:<20} {}", table.name(), table.count());
            }
            Ok(())
        }
        Commands::Symbols {
            store,
            tag,
            name,
            ignore_case,
            wildcard,
            undecorated,
        } => {
            let (_source, session) = open(&store, settings)?;
            let mut options = if ignore_case {
                NameSearchOptions::CASE_INSENSITIVE
            } else {
                NameSearchOptions::CASE_SENSITIVE
            };
            options.set(NameSearchOptions::REGULAR_EXPRESSION, wildcard);
            options.set(NameSearchOptions::UNDECORATED_NAME, undecorated);

            let global = session.global_scope()?;
            for symbol in global.find_children(tag, name.as_deref(), options)? {
                match symbol.rva() {
                    Some(rva) => println!("{rva}  {:>6}  {symbol}", symbol.length()),
                    None => println!("{:<10}  {:>6}  {symbol}", "-", "-"),
                }
            }
            Ok(())
        }
        Commands::Lookup { store, address, tag } => {
            let (_source, session) = open(&store, settings)?;
            let address = address.address().ok_or("one of --rva, --va or --addr is required")?;
            let found = match address {
                Address::Rva(rva) => session.find_symbol_by_rva_ex(rva, tag)?,
                Address::Va(va) => session.find_symbol_by_va_ex(va, tag)?,
                Address::Section(so) => session.find_symbol_by_addr_ex(so, tag)?,
            };
            let Some(found) = found else {
                println!("No symbol at {address}");
                return Ok(());
            };
            let approximate = if found.approximate { " (nearest public)" } else { "" };
            println!("{}+0x{:x}{approximate}", found.symbol, found.displacement);
            if let Some(undecorated) = found.symbol.undecorated_name() {
                println!("  undecorated: {undecorated}");
            }
            print_lines(session_lines(&session, address, 1)?)?;
            Ok(())
        }
        Commands::Lines { store, address, length } => {
            let (_source, session) = open(&store, settings)?;
            let address = address.address().ok_or("one of --rva, --va or --addr is required")?;
            print_lines(session_lines(&session, address, length)?)?;
            Ok(())
        }
        Commands::Streams { store } => {
            let (_source, session) = open(&store, settings)?;
            for stream in session.enum_debug_streams()? {
                println!("{:<16} {}", stream.name(), stream.count());
            }
            Ok(())
        }
    }
}

/// Load a store as the flags describe. The data source must outlive the session.
fn open(args: &StoreArgs, settings: &Settings) -> Result<(DataSource, Session), Box<dyn std::error::Error>>
{
    let handle = locate()?;
    let mut source = handle.data_source();

    match (&args.store, &args.exe) {
        (Some(path), _) => match args.guid {
            Some(guid) => {
                let signature = args.signature.ok_or("--signature is required with --guid")?;
                source.load_and_validate(path, guid, signature, args.age)?;
            }
            None => source.load_from_store(path)?,
        },
        (None, Some(exe)) => {
            let search_path = args.search_path.as_deref().or(settings.symbol_path.as_deref());
            source.load_for_executable(exe, search_path, None)?;
        }
        (None, None) => return Err("either --store or --exe is required".into()),
    }
    info!(engine = %handle.identity(), "Loaded debug store");

    let session = source.open_session()?;
    session.set_load_address(args.load_address);
    Ok((source, session))
}

fn session_lines(session: &Session, address: Address, length: u32) -> Result<Enumerator<LineNumber>, DiaError>
{
    match address {
        Address::Rva(rva) => session.find_lines_by_rva(rva, length),
        Address::Va(va) => session.find_lines_by_va(va, length),
        Address::Section(so) => session.find_lines_by_addr(so, length),
    }
}

fn print_lines(lines: Enumerator<LineNumber>) -> Result<(), DiaError>
{
    for line in lines {
        let file = line.source_file()?;
        println!(
            "  {}  {}:{}:{}  [{} bytes]",
            line.rva(),
            file.file_name(),
            line.line_number(),
            line.column_number(),
            line.length()
        );
    }
    Ok(())
}

fn parse_u64(raw: &str) -> Result<u64, String>
{
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    parsed.map_err(|e| format!("invalid number {raw:?}: {e}"))
}

fn parse_u32(raw: &str) -> Result<u32, String>
{
    let value = parse_u64(raw)?;
    u32::try_from(value).map_err(|_| format!("{raw} does not fit in 32 bits"))
}

fn parse_section_offset(raw: &str) -> Result<SectionOffset, String>
{
    let (section, offset) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected section:offset, got {raw:?}"))?;
    Ok(SectionOffset::new(parse_u32(section)?, parse_u32(offset)?))
}
