use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use colored::Colorize;
use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::{Path, PathBuf};
use xpath_splice::config::{apply_to_bytes, load_from_path, DirectiveReport, EditPlan, MatchScope};
use xpath_splice::directive::{AttributeEditDirective, InsertDirective, NamespaceDirective};
use xpath_splice::output::write_output;

#[derive(Parser)]
#[command(name = "xpath-splice")]
#[command(
    about = "Edit XML by XPath without reformatting it: attribute rewrites and fragment insertion",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// XML file to edit
    #[arg(short, long)]
    file: PathBuf,

    /// Replace an attribute value: <xpath>@<attribute>=<value>
    #[arg(long, value_name = "DIRECTIVE", num_args = 1..)]
    edit_attribute: Vec<String>,

    /// Append to a start tag's attributes: <xpath><sep><fragment>
    #[arg(long, value_name = "DIRECTIVE", num_args = 1..)]
    add_attribute: Vec<String>,

    /// Insert as the first child of the matched element: <xpath><sep><fragment>
    #[arg(long, value_name = "DIRECTIVE", num_args = 1..)]
    insert_after_head: Vec<String>,

    /// Insert right after the matched element: <xpath><sep><fragment>
    #[arg(long, value_name = "DIRECTIVE", num_args = 1..)]
    insert_after_element: Vec<String>,

    /// Insert right before the matched element: <xpath><sep><fragment>
    #[arg(long, value_name = "DIRECTIVE", num_args = 1..)]
    insert_before_element: Vec<String>,

    /// Insert after the matched comment, PI or tag: <xpath><sep><fragment>
    #[arg(long, value_name = "DIRECTIVE", num_args = 1..)]
    insert_after_location: Vec<String>,

    /// Bind an XPath prefix: <prefix>:<uri> (enables namespace-aware parsing)
    #[arg(long, value_name = "PREFIX:URI", num_args = 1..)]
    namespace: Vec<String>,

    /// Separator between XPath and fragment in insertion directives
    #[arg(long, default_value = ":")]
    separator: String,

    /// TOML edit script, applied before command-line edits
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Write the result here instead of overwriting --file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Insert at every match instead of only the first
    #[arg(long)]
    all_matches: bool,

    /// Dry run - show what would change without writing
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Show unified diff of changes
    #[arg(short, long)]
    diff: bool,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Serialize)]
struct RunReport<'a> {
    file: &'a Path,
    output: &'a Path,
    dry_run: bool,
    changed: bool,
    edits: usize,
    directives: &'a [DirectiveReport],
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let plan = build_plan(&cli)?;
    let input =
        fs::read(&cli.file).with_context(|| format!("failed to read {}", cli.file.display()))?;

    if plan.is_empty() {
        log::info!("no edits requested; output is a copy of the input");
    }

    let outcome = apply_to_bytes(&plan, &input)
        .with_context(|| format!("cannot edit {}", cli.file.display()))?;
    let target = cli.output.as_deref().unwrap_or(&cli.file);
    let changed = outcome.is_changed(&input);

    if cli.diff && changed {
        display_diff(
            target,
            &String::from_utf8_lossy(&input),
            &String::from_utf8_lossy(&outcome.output),
        );
    }

    if !cli.dry_run {
        write_output(target, &outcome.output)?;
    }

    let reports = &outcome.applied.reports;
    if cli.json {
        let report = RunReport {
            file: &cli.file,
            output: target,
            dry_run: cli.dry_run,
            changed,
            edits: outcome.applied.recorded(),
            directives: reports,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(reports, target, cli.dry_run);
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
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

/// Script directives first, then command-line directives, each category in
/// the order given. Every directive is checked before the document is read.
fn build_plan(cli: &Cli) -> Result<EditPlan> {
    let mut plan = match &cli.script {
        Some(path) => EditPlan::from_script(&load_from_path(path)?),
        None => EditPlan::new(),
    };

    let inserts = |specs: &[String]| -> Result<Vec<InsertDirective>> {
        specs
            .iter()
            .map(|arg| InsertDirective::parse(arg, &cli.separator).map_err(Into::into))
            .collect()
    };

    let mut from_args = EditPlan {
        namespaces: cli
            .namespace
            .iter()
            .map(|arg| NamespaceDirective::parse(arg))
            .collect::<Result<_, _>>()?,
        attribute_edits: cli
            .edit_attribute
            .iter()
            .map(|arg| AttributeEditDirective::parse(arg))
            .collect::<Result<_, _>>()?,
        after_head: inserts(&cli.insert_after_head)?,
        after_element: inserts(&cli.insert_after_element)?,
        before_element: inserts(&cli.insert_before_element)?,
        after_location: inserts(&cli.insert_after_location)?,
        append_attribute: inserts(&cli.add_attribute)?,
        scope: MatchScope::First,
    };
    if cli.all_matches {
        from_args.scope = MatchScope::All;
    }

    plan.merge(from_args);
    Ok(plan)
}

fn print_summary(reports: &[DirectiveReport], target: &Path, dry_run: bool) {
    let mut total_edits = 0;
    let mut total_skipped = 0;

    for report in reports {
        if report.is_skipped() {
            let reason = if report.matches == 0 {
                "no match".to_string()
            } else {
                format!("no anchor in {} match(es)", report.matches)
            };
            println!(
                "{} {} {}: skipped ({})",
                "⊘".yellow(),
                report.category,
                report.xpath,
                reason
            );
            total_skipped += 1;
        } else {
            println!(
                "{} {} {}: {} edit(s)",
                "✓".green(),
                report.category,
                report.xpath,
                report.recorded
            );
            total_edits += report.recorded;
        }
    }

    println!();
    println!(
        "Summary: {} edit(s), {} directive(s) skipped",
        total_edits, total_skipped
    );
    if dry_run {
        println!("{}", format!("[DRY RUN] {} not written", target.display()).cyan());
    } else {
        println!("Wrote {}", target.display());
    }
}

fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (edited)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}
