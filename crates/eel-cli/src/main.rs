use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use eel_core::lexical::{char_constant, escape_bytes, unescape_literal};
use eel_core::matcher::{FieldKind, Target};
use eel_core::natives;
use eel_core::{
    NoVariables, RamRegistry, RuntimeConfig, StringContext, TransformCache,
    match_pattern,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "eel", about = "Diagnostic host for the EEL2 runtime services")]
struct Cli {
    /// Runtime config file (TOML); falls back to $EEL_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    /// Emit JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run sprintf on a format string. Numeric arguments and quoted
    /// character constants ('ab') are passed as numbers, anything else as a
    /// string.
    Format {
        /// Format string; backslash escapes are decoded
        format: String,
        args: Vec<String>,
    },

    /// Match a haystack against a pattern and list the captures
    Match {
        pattern: String,
        haystack: String,

        /// Case-insensitive
        #[arg(short = 'i', long)]
        ignore_case: bool,
    },

    /// Round-trip a random signal through mdct/imdct in script memory
    Mdct {
        /// Block length (power of two, 64..=4096)
        #[arg(long, default_value_t = 1024)]
        len: usize,

        /// Number of overlapping blocks
        #[arg(long, default_value_t = 8)]
        blocks: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Touch script memory addresses and report the table's state
    Mem {
        /// Addresses to write; each cell gets its own address as value
        addrs: Vec<f64>,

        /// Release everything from this address on before reporting
        #[arg(long)]
        free: Option<f64>,
    },

    /// Print the effective runtime config
    Config,
}

fn load_config(cli: &Cli) -> Result<RuntimeConfig> {
    let path = cli
        .config
        .clone()
        .or_else(|| std::env::var("EEL_CONFIG").ok().map(PathBuf::from));
    match path {
        Some(path) => RuntimeConfig::load(&path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(RuntimeConfig::default()),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Format { format, args } => cmd_format(&cli, &config, format, args),
        Commands::Match {
            pattern,
            haystack,
            ignore_case,
        } => cmd_match(&cli, &config, pattern, haystack, *ignore_case),
        Commands::Mdct { len, blocks, seed } => cmd_mdct(&cli, &config, *len, *blocks, *seed),
        Commands::Mem { addrs, free } => cmd_mem(&cli, &config, addrs, *free),
        Commands::Config => cmd_config(&config),
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{text}");
    Ok(())
}

// ---------------------------------------------------------------------------
// format
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct FormatReport {
    length: f64,
    output: String,
}

fn cmd_format(cli: &Cli, config: &RuntimeConfig, format: &str, args: &[String]) -> Result<()> {
    let mut strings = StringContext::new(config.strings.clone());
    let fmt = strings.add_literal(&unescape_literal(format.as_bytes()));
    let values: Vec<f64> = args
        .iter()
        .map(|a| {
            if let Ok(v) = a.parse::<f64>() {
                return v;
            }
            let quoted = a
                .strip_prefix('\'')
                .and_then(|rest| rest.strip_suffix('\''))
                .and_then(|body| char_constant(body.as_bytes()));
            match quoted {
                Some(v) => v,
                None => strings.add_literal(&unescape_literal(a.as_bytes())),
            }
        })
        .collect();

    let dest = 0.0;
    let length = natives::sprintf(&mut strings, &NoVariables, dest, fmt, &values);
    if length < 0.0 {
        bail!("malformed format string: {format}");
    }
    let output = strings.get_for_read(dest).unwrap_or_default();

    if cli.json {
        return print_json(&FormatReport {
            length,
            output: escape_bytes(output),
        });
    }
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output)?;
    stdout.write_all(b"\n")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// match
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct CaptureReport {
    target: String,
    kind: &'static str,
    text: String,
    value: Option<f64>,
}

#[derive(Serialize)]
struct MatchReport {
    matched: bool,
    captures: Vec<CaptureReport>,
}

fn kind_name(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Str => "s",
        FieldKind::Char => "c",
        FieldKind::Int => "d",
        FieldKind::Unsigned => "u",
        FieldKind::Hex => "x",
        FieldKind::Float => "f",
    }
}

fn cmd_match(
    cli: &Cli,
    config: &RuntimeConfig,
    pattern: &str,
    haystack: &str,
    ignore_case: bool,
) -> Result<()> {
    let limits = config.matcher.limits();
    let hay = unescape_literal(haystack.as_bytes());
    let captures = match_pattern(pattern.as_bytes(), &hay, ignore_case, limits)
        .with_context(|| format!("malformed pattern: {pattern}"))?;

    let report = MatchReport {
        matched: captures.is_some(),
        captures: captures
            .unwrap_or_default()
            .iter()
            .map(|c| CaptureReport {
                target: match c.target {
                    Target::Positional(i) => i.to_string(),
                    Target::Named(name) => String::from_utf8_lossy(name).into_owned(),
                },
                kind: kind_name(c.kind),
                text: escape_bytes(&hay[c.span.clone()]),
                value: (!c.kind.is_text()).then(|| c.value(&hay)),
            })
            .collect(),
    };

    if cli.json {
        return print_json(&report);
    }
    if !report.matched {
        println!("no match");
        return Ok(());
    }
    println!("match");
    for c in &report.captures {
        match c.value {
            Some(v) => println!("  {} (%{}) = \"{}\" -> {v}", c.target, c.kind, c.text),
            None => println!("  {} (%{}) = \"{}\"", c.target, c.kind, c.text),
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// mdct
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct MdctReport {
    len: usize,
    blocks: usize,
    scale: f64,
    max_error: f64,
    plans_built: usize,
}

fn cmd_mdct(cli: &Cli, config: &RuntimeConfig, len: usize, blocks: usize, seed: u64) -> Result<()> {
    let cache = TransformCache::global();
    if cache.plan(len).is_none() {
        bail!("unsupported block length {len}: expected a power of two in 64..=4096");
    }
    if blocks < 2 {
        bail!("need at least 2 blocks to overlap");
    }
    let registry = RamRegistry::new(config.ram.clone());
    let ram = registry.new_table();

    let hop = len / 2;
    let mut rng = SmallRng::seed_from_u64(seed);
    let signal: Vec<f64> = (0..(blocks + 1) * hop)
        .map(|_| rng.random_range(-1.0..1.0))
        .collect();
    let mut output = vec![0.0; signal.len()];
    let mut block = vec![0.0; len];

    for b in 0..blocks {
        let start = b * hop;
        natives::mem_set_values(&ram, 0.0, &signal[start..start + len]);
        natives::mdct(&ram, cache, 0.0, len as f64);
        natives::imdct(&ram, cache, 0.0, len as f64);
        natives::mem_get_values(&ram, 0.0, &mut block);
        for (o, v) in output[start..start + len].iter_mut().zip(&block) {
            *o += v;
        }
    }

    let scale = len as f64 / 4.0;
    let max_error = (hop..blocks * hop)
        .map(|i| (output[i] / scale - signal[i]).abs())
        .fold(0.0, f64::max);
    let report = MdctReport {
        len,
        blocks,
        scale,
        max_error,
        plans_built: cache.built(),
    };

    if cli.json {
        return print_json(&report);
    }
    println!("len:        {}", report.len);
    println!("blocks:     {}", report.blocks);
    println!("scale:      {}", report.scale);
    println!("max_error:  {:.3e}", report.max_error);
    Ok(())
}

// ---------------------------------------------------------------------------
// mem
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct MemReport {
    #[serde(flatten)]
    stats: eel_core::RamStats,
    memtop: f64,
    failed_writes: usize,
    budget_used: usize,
}

fn cmd_mem(cli: &Cli, config: &RuntimeConfig, addrs: &[f64], free: Option<f64>) -> Result<()> {
    let registry = RamRegistry::new(config.ram.clone());
    let mut ram = registry.new_table();

    let mut failed_writes = 0;
    for &addr in addrs {
        let cell = ram.resolve(addr);
        if ram.is_failure(cell) {
            failed_writes += 1;
        } else {
            cell.set(addr);
        }
    }
    if let Some(from) = free {
        natives::free(&ram, from);
        ram.free_if_requested();
    }

    let report = MemReport {
        stats: ram.stats(),
        memtop: natives::memtop(&ram),
        failed_writes,
        budget_used: registry.budget().used(),
    };

    if cli.json {
        return print_json(&report);
    }
    println!("pages:      {}/{}", report.stats.pages_allocated, report.stats.page_cap);
    println!("page_size:  {}", report.stats.page_size);
    println!("in_use:     {} bytes", report.stats.bytes_in_use);
    println!("memtop:     {}", report.memtop);
    println!("failed:     {}", report.failed_writes);
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config(config: &RuntimeConfig) -> Result<()> {
    print_json(config)
}
