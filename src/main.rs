use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use edit_committer::config::{self, CommitConfig};
use edit_committer::{
    check_source, commit_edit, commit_edit_set, plan_all, plan_one, store, DiskFs, Edit,
    EditSet, FileOp, Plan, SourceState, WorkspaceGuard,
};
use similar::{ChangeTag, TextDiff};
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "edit-committer")]
#[command(about = "Commit analyzer-produced range edits to source files", long_about = None)]
#[command(version)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file (defaults to edit-committer.toml in the root)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Target {
    /// JSON file holding the analyzer's edit sets; updated in place
    #[arg(short, long)]
    results: PathBuf,

    /// Root that relative file paths resolve against (default: config root, then cwd)
    #[arg(long)]
    root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Commit every pending edit of one edit set
    CommitAll {
        #[command(flatten)]
        target: Target,

        /// Index of the edit set
        #[arg(short, long)]
        set: usize,

        /// Show what would change without touching any file
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Commit one top-level edit of one edit set
    Commit {
        #[command(flatten)]
        target: Target,

        /// Index of the edit set
        #[arg(short, long)]
        set: usize,

        /// Index of the top-level edit within the set
        #[arg(short, long)]
        edit: usize,

        /// Show what would change without touching any file
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Show pending edit sets and whether their files still match
    Status {
        #[command(flatten)]
        target: Target,
    },

    /// List every pending edit
    List {
        #[command(flatten)]
        target: Target,
    },
}

/// Which edits a commit covers.
#[derive(Clone, Copy)]
enum Selection {
    All,
    One(usize),
}

struct Session {
    results: PathBuf,
    root: PathBuf,
    config: CommitConfig,
    sets: Vec<EditSet>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::CommitAll {
            target,
            set,
            dry_run,
            diff,
        } => cmd_commit(
            open_session(&target, config_path)?,
            set,
            Selection::All,
            dry_run,
            diff,
        ),

        Commands::Commit {
            target,
            set,
            edit,
            dry_run,
            diff,
        } => cmd_commit(
            open_session(&target, config_path)?,
            set,
            Selection::One(edit),
            dry_run,
            diff,
        ),

        Commands::Status { target } => cmd_status(open_session(&target, config_path)?),

        Commands::List { target } => cmd_list(open_session(&target, config_path)?),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolve root and config, then load the edit sets.
///
/// Priority for the root:
/// 1. Explicit --root flag
/// 2. `root` from the config file (relative to the directory it was found in)
/// 3. Current directory
fn open_session(target: &Target, config_path: Option<&Path>) -> Result<Session> {
    let base = match &target.root {
        Some(root) => root.clone(),
        None => env::current_dir().context("could not determine current directory")?,
    };

    let config = match config_path {
        Some(path) => config::load_from_path(path)?,
        None => config::discover(&base)?,
    };

    let root = match (&target.root, &config.root) {
        (Some(root), _) => root.clone(),
        (None, Some(configured)) => base.join(configured),
        (None, None) => base,
    };
    let root = root
        .canonicalize()
        .with_context(|| format!("root {} does not exist", root.display()))?;

    let sets = store::load(&target.results)?;
    tracing::debug!(
        root = %root.display(),
        sets = sets.len(),
        "loaded edit sets"
    );

    Ok(Session {
        results: target.results.clone(),
        root,
        config,
        sets,
    })
}

fn disk_fs(session: &Session) -> Result<DiskFs> {
    let disk = DiskFs::new().touch_mtime(session.config.touch_mtime);
    if !session.config.guard {
        return Ok(disk);
    }
    let guard = WorkspaceGuard::new(&session.root)?.with_forbidden(&session.config.forbidden);
    Ok(disk.with_guard(guard))
}

fn cmd_commit(
    session: Session,
    set_index: usize,
    selection: Selection,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let set = session.sets.get(set_index).with_context(|| {
        format!(
            "no edit set at index {} ({} pending)",
            set_index,
            session.sets.len()
        )
    })?;
    let disk = disk_fs(&session)?;

    if session.config.check_source && !set.has_structural() {
        let state = check_source(set, &session.root, &disk)?;
        if !state.is_committable() {
            anyhow::bail!(
                "{} is {}; re-run the analyzer before committing",
                set.file_path.display(),
                state
            );
        }
    }

    let plan = match selection {
        Selection::All => plan_all(set)?,
        Selection::One(edit_index) => plan_one(set, edit_index)?,
    };

    println!("Root: {}", session.root.display());
    if show_diff {
        display_plan(set, &plan);
    }

    if dry_run {
        println!("{}", "[DRY RUN - nothing was written]".cyan());
        report(&plan, true);
        return Ok(());
    }

    let updated = match selection {
        Selection::All => commit_edit_set(&session.sets, set_index, &session.root, &disk)?,
        Selection::One(edit_index) => {
            commit_edit(&session.sets, set_index, edit_index, &session.root, &disk)?
        }
    };
    store::save(&session.results, &updated)?;

    report(&plan, false);
    println!(
        "  {} edit set(s) still pending in {}",
        format!("{}", updated.len()).yellow(),
        session.results.display()
    );
    Ok(())
}

fn report(plan: &Plan, dry_run: bool) {
    let verb = |done: &str, would: &str| {
        if dry_run {
            format!("Would {would}")
        } else {
            done.to_string()
        }
    };
    match &plan.op {
        Some(FileOp::Write { path, .. }) => {
            println!("{} {} {}", "✓".green(), verb("Wrote", "write"), path.display())
        }
        Some(FileOp::Create { path, .. }) => {
            println!("{} {} {}", "✓".green(), verb("Created", "create"), path.display())
        }
        Some(FileOp::Remove { path }) => {
            println!("{} {} {}", "✓".green(), verb("Removed", "remove"), path.display())
        }
        Some(FileOp::Rename { from, to }) => println!(
            "{} {} {} -> {}",
            "✓".green(),
            verb("Renamed", "rename"),
            from.display(),
            to.display()
        ),
        None => println!("{} Nothing to write", "⊙".yellow()),
    }
    match &plan.remaining {
        Some(rest) => println!(
            "  {} edit(s) left for {}",
            format!("{}", rest.edits.len()).yellow(),
            rest.file_path.display()
        ),
        None => println!("  edit set fully committed"),
    }
}

/// Show what a plan changes, as a unified diff where text is involved.
fn display_plan(set: &EditSet, plan: &Plan) {
    match &plan.op {
        Some(FileOp::Write { path, text }) => {
            display_diff(path, set.current_text.as_deref().unwrap_or(""), text)
        }
        Some(FileOp::Create { path, text }) => display_diff(path, "", text),
        Some(FileOp::Remove { path }) => {
            println!("\n{}", format!("--- {} (removed)", path.display()).red())
        }
        Some(FileOp::Rename { from, to }) => println!(
            "\n{}",
            format!("rename {} -> {}", from.display(), to.display()).dimmed()
        ),
        None => {}
    }
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (committed)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
    println!();
}

fn cmd_status(session: Session) -> Result<()> {
    let disk = disk_fs(&session)?;

    println!("{}", "Edit Set Status".bold());
    println!("Root: {}", session.root.display());
    println!("Results: {}", session.results.display());
    println!();

    if session.sets.is_empty() {
        println!("{}", "No pending edit sets".green());
        return Ok(());
    }

    let mut stale = 0;
    for (idx, set) in session.sets.iter().enumerate() {
        let state = check_source(set, &session.root, &disk)?;
        // File-level edits create, move or delete the file; disk state says little
        let marker = match state {
            _ if set.has_structural() => "⊙".cyan(),
            SourceState::Fresh => "✓".green(),
            SourceState::Unknown => "⊙".cyan(),
            SourceState::Missing | SourceState::Stale { .. } => {
                stale += 1;
                "✗".red()
            }
        };
        let leaves: usize = set.edits.iter().map(Edit::leaf_count).sum();
        let mut flags = Vec::new();
        if set.affected {
            flags.push("affected");
        }
        if set.conflicted {
            flags.push("conflicted");
        }

        println!(
            "{} [{}] {}: {} edit(s), {} leaf edit(s) {} ({})",
            marker,
            idx,
            set.file_path.display(),
            set.edits.len(),
            leaves,
            format!("[{}]", flags.join(", ")).dimmed(),
            state
        );
    }

    println!();
    println!("{}", "Summary:".bold());
    println!(
        "  {} pending edit set(s)",
        format!("{}", session.sets.len()).yellow()
    );
    println!("  {} out of date", format!("{}", stale).red());

    Ok(())
}

fn cmd_list(session: Session) -> Result<()> {
    for (idx, set) in session.sets.iter().enumerate() {
        match &set.new_file_path {
            Some(new_path) => println!(
                "{} {} -> {}",
                format!("[{}]", idx).bold(),
                set.file_path.display(),
                new_path.display()
            ),
            None => println!("{} {}", format!("[{}]", idx).bold(), set.file_path.display()),
        }
        for (edit_idx, edit) in set.edits.iter().enumerate() {
            print_edit(edit, &format!("{}", edit_idx), 1);
        }
    }
    Ok(())
}

fn print_edit(edit: &Edit, label: &str, depth: usize) {
    let indent = "  ".repeat(depth);
    match edit {
        Edit::Replace {
            start,
            end,
            new_text,
        } => println!(
            "{}{} replace [{}, {}) -> {:?}",
            indent, label, start, end, new_text
        ),
        Edit::Group {
            start,
            end,
            children,
        } => {
            println!("{}{} group [{}, {})", indent, label, start, end);
            for (idx, child) in children.iter().enumerate() {
                print_edit(child, &format!("{}.{}", label, idx), depth + 1);
            }
        }
        Edit::AddFile { new_text, .. } => println!(
            "{}{} add_file ({} chars)",
            indent,
            label,
            new_text.chars().count()
        ),
        other => println!("{}{} {}", indent, label, other.kind()),
    }
}
