use std::io::{self, Read, Write};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dict_fixer::{Config, CorrectionEngine, JsonRuleFile, RulePersistence, RuleStore};

const USAGE: &str = "\
Usage: dict-fixer <command> [args] [--regex] [--old-regex]

Commands:
  list                                       Show every rule
  add <pattern> [replacement]                Add a rule
  update <old> <new-pattern> [replacement]   Change a rule (--old-regex selects a regex <old>)
  remove <pattern>                           Remove a rule
  enable | disable | toggle                  Switch live correction on or off
  reset                                      Restore the default dictionary
  apply [text]                               Correct text (stdin if omitted), ignoring the switch
  live [text]                                Correct text only when switched on";

#[derive(Debug, Default, PartialEq)]
struct Args {
    command: String,
    positional: Vec<String>,
    regex: bool,
    old_regex: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();

    parsed.command = match args.next() {
        Some(command) => command,
        None => bail!("missing command\n\n{}", USAGE),
    };

    for arg in args {
        match arg.as_str() {
            "--regex" => parsed.regex = true,
            "--old-regex" => parsed.old_regex = true,
            _ => parsed.positional.push(arg),
        }
    }

    Ok(parsed)
}

fn required<'a>(args: &'a Args, index: usize, name: &str) -> Result<&'a str> {
    match args.positional.get(index) {
        Some(value) if !value.is_empty() => Ok(value.as_str()),
        _ => bail!("`{}` needs a non-empty <{}>", args.command, name),
    }
}

fn optional(args: &Args, index: usize) -> &str {
    args.positional.get(index).map(String::as_str).unwrap_or("")
}

/// Text from the arguments, or all of stdin when there are none.
fn input_text(args: &Args) -> Result<(String, bool)> {
    if !args.positional.is_empty() {
        return Ok((args.positional.join(" "), true));
    }
    let mut text = String::new();
    io::stdin()
        .read_to_string(&mut text)
        .context("failed to read text from stdin")?;
    Ok((text, false))
}

fn run<P: RulePersistence>(
    store: &mut RuleStore<P>,
    args: &Args,
    input: impl FnOnce(&Args) -> Result<(String, bool)>,
    out: &mut impl Write,
) -> Result<()> {
    match args.command.as_str() {
        "list" => {
            let status = if store.is_enabled() { "enabled" } else { "disabled" };
            writeln!(out, "# corrections {}, {} rules", status, store.rules().len())?;
            for line in store.display_lines() {
                writeln!(out, "{}", line)?;
            }
        }
        "add" => {
            let pattern = required(args, 0, "pattern")?;
            store
                .add(pattern, args.regex, optional(args, 1))
                .with_context(|| format!("could not add '{}'", pattern))?;
            info!("Rule added");
        }
        "update" => {
            let old_pattern = required(args, 0, "old")?;
            let new_pattern = required(args, 1, "new-pattern")?;
            let old = store
                .find(old_pattern, args.old_regex)
                .cloned()
                .with_context(|| format!("no rule '{}'", old_pattern))?;
            store
                .update(&old, new_pattern, args.regex, optional(args, 2))
                .with_context(|| format!("could not update '{}'", old_pattern))?;
            info!("Rule updated");
        }
        "remove" => {
            let pattern = required(args, 0, "pattern")?;
            let rule = store
                .find(pattern, args.regex)
                .cloned()
                .with_context(|| format!("no rule '{}'", pattern))?;
            store.remove(&rule)?;
            info!("Rule removed");
        }
        "enable" => store.set_enabled(true)?,
        "disable" => store.set_enabled(false)?,
        "toggle" => {
            let enabled = store.toggle_enabled()?;
            writeln!(out, "{}", if enabled { "enabled" } else { "disabled" })?;
        }
        "reset" => store.reset_to_defaults()?,
        "apply" | "live" => {
            let (text, from_args) = input(args)?;
            let correction = if args.command == "apply" {
                CorrectionEngine::manual(&text, store.rule_set())
            } else {
                CorrectionEngine::live(&text, store.rule_set())
            };

            if !correction.changed() {
                warn!("No words to correct in the given text");
            }
            let text = correction.into_text();
            if from_args {
                writeln!(out, "{}", text)?;
            } else {
                write!(out, "{}", text)?;
            }
        }
        other => bail!("unknown command `{}`\n\n{}", other, USAGE),
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let config = Config::load();
    let mut store = RuleStore::open(JsonRuleFile::from_config(&config));

    let stdout = io::stdout();
    run(&mut store, &args, input_text, &mut stdout.lock())
}
