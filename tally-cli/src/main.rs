use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tally_ingest::{
    FallbackYear, ParseOptions, RulesetRegistry, Statement, StatementParser, Transaction, WordDump,
};

mod config;

use config::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "tally", version, about = "Bank statement word dumps to reconciled transactions")]
struct Cli {
    /// More logging (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a positioned-words JSON dump into transactions
    Parse {
        /// Word dump (`{"pages": [[{x0,y0,x1,y1,text}, ...], ...]}`), or `-` for stdin
        input: PathBuf,

        /// Extra rules file merged over the built-in layouts
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Year for dates printed without one (default: statement header, then current year)
        #[arg(long)]
        year: Option<i32>,

        /// Seed the running balance instead of reading a brought-forward line
        #[arg(long)]
        opening_balance: Option<f64>,

        #[arg(long, value_enum)]
        format: Option<OutputFormat>,

        /// Print the first transactions as JSON and stop
        #[arg(long)]
        preview: bool,

        /// Write output here instead of stdout
        #[arg(long, short)]
        out: Option<PathBuf>,
    },

    /// Report which layout a dump would be parsed with
    Detect {
        input: PathBuf,

        #[arg(long)]
        rules: Option<PathBuf>,
    },

    /// Inspect rulesets
    Rules {
        #[command(subcommand)]
        command: RulesCommand,
    },

    /// Manage ~/.tally/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum RulesCommand {
    /// List detectors and their rulesets
    List {
        #[arg(long)]
        rules: Option<PathBuf>,
    },
    /// Validate a rules file
    Check { file: PathBuf },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config if none exists
    Init,
    /// Print the effective config
    Show,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cfg = config::load_config()?;

    match cli.command {
        Command::Parse {
            input,
            rules,
            year,
            opening_balance,
            format,
            preview,
            out,
        } => {
            let registry = load_registry(rules.as_deref().or(cfg.parse.rules_file.as_deref()))?;
            let options = ParseOptions {
                fallback_year: match year.or(cfg.parse.fallback_year) {
                    Some(y) => FallbackYear::Fixed(y),
                    None => FallbackYear::from_header_or_current(),
                },
                opening_balance,
            };

            let dump = read_dump(&input)?;
            let stmt = StatementParser::new(&registry)
                .with_options(options)
                .parse(&dump.pages)
                .with_context(|| format!("parsing {}", input.display()))?;

            let rendered = if preview {
                render_preview(&stmt, cfg.output.preview_limit)?
            } else {
                render(&stmt, format.unwrap_or(cfg.output.format))?
            };
            write_output(out.as_deref(), &rendered)?;

            eprintln!("{}", summary(&stmt));
        }

        Command::Detect { input, rules } => {
            let registry = load_registry(rules.as_deref().or(cfg.parse.rules_file.as_deref()))?;
            let dump = read_dump(&input)?;
            let ruleset = StatementParser::new(&registry).detect(&dump.pages)?;
            println!("{}", ruleset.key);
            println!("zones: {}", ruleset.zones);
        }

        Command::Rules { command } => match command {
            RulesCommand::List { rules } => {
                let registry = load_registry(rules.as_deref().or(cfg.parse.rules_file.as_deref()))?;
                for d in registry.detectors() {
                    let key = d.key();
                    let status = if registry.get(&key).is_some() { "ok" } else { "MISSING RULESET" };
                    println!("{:<40} {:?} + {:?} [{}]", key, d.bank, d.account_type, status);
                }
            }
            RulesCommand::Check { file } => {
                let registry = RulesetRegistry::load(&file)
                    .with_context(|| format!("loading {}", file.display()))?;
                let count = registry.rulesets().count();
                let merged = RulesetRegistry::builtin().merged(registry);
                let unresolved = merged.unresolved_detectors();
                if !unresolved.is_empty() {
                    bail!(
                        "{}: detectors without a ruleset: {}",
                        file.display(),
                        unresolved.join(", ")
                    );
                }
                println!("{}: {} rulesets ok", file.display(), count);
            }
        },

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => {
                println!("# {}", config::config_path()?.display());
                print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
            }
        },
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn load_registry(rules: Option<&Path>) -> Result<RulesetRegistry> {
    let builtin = RulesetRegistry::builtin();
    match rules {
        Some(p) => {
            let user = RulesetRegistry::load(p).with_context(|| format!("loading {}", p.display()))?;
            log::info!("merged rules from {}", p.display());
            Ok(builtin.merged(user))
        }
        None => Ok(builtin),
    }
}

fn read_dump(input: &Path) -> Result<WordDump> {
    let raw = if input == Path::new("-") {
        let mut s = String::new();
        io::stdin().read_to_string(&mut s).context("read stdin")?;
        s
    } else {
        fs::read_to_string(input).with_context(|| format!("read {}", input.display()))?
    };
    parse_dump(&raw).with_context(|| format!("decode {}", input.display()))
}

fn parse_dump(raw: &str) -> Result<WordDump> {
    let dump: WordDump = serde_json::from_str(raw)?;
    if dump.pages.is_empty() {
        bail!("word dump has no pages");
    }
    Ok(dump)
}

fn render(stmt: &Statement, format: OutputFormat) -> Result<String> {
    let csv = stmt.table().to_csv_string().context("encode csv")?;
    match format {
        OutputFormat::Csv => Ok(csv),
        OutputFormat::Json => {
            let body = serde_json::json!({
                "success": true,
                "ruleset": stmt.ruleset_key,
                "transactions": stmt.transactions,
                "csv": csv,
            });
            Ok(serde_json::to_string_pretty(&body)? + "\n")
        }
    }
}

fn render_preview(stmt: &Statement, limit: usize) -> Result<String> {
    let n = limit.min(stmt.transactions.len());
    let body = serde_json::json!({ "preview": &stmt.transactions[..n] });
    Ok(serde_json::to_string_pretty(&body)? + "\n")
}

fn summary(stmt: &Statement) -> String {
    let count = |f: fn(&Transaction) -> bool| stmt.transactions.iter().filter(|t| f(t)).count();
    format!(
        "Parsed {} transactions with {}: {} debits, {} credits ({} balance corrections)",
        stmt.transactions.len(),
        stmt.ruleset_key,
        count(Transaction::is_debit),
        count(Transaction::is_credit),
        count(|t| t.balance_diff_error.is_some()),
    )
}

fn write_output(out: Option<&Path>, rendered: &str) -> Result<()> {
    match out {
        Some(p) => fs::write(p, rendered).with_context(|| format!("write {}", p.display())),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(rendered.as_bytes()).context("write stdout")?;
            stdout.flush().context("flush stdout")
        }
    }
}
