use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use systematize_core::{CollectionOptions, ContactSheet, MediaCollection, RenameSession, SortOrder};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "systematize", version, about = "Browse and batch-rename folders of photos and movies")]
struct Cli {
    /// JSON file with collection options
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Time,
    Name,
}

impl From<SortArg> for SortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Time => SortOrder::Time,
            SortArg::Name => SortOrder::Name,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// List the media files in a directory
    List {
        dir: PathBuf,

        #[arg(long, value_enum)]
        sort: Option<SortArg>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Rename selected files to <name><position>
    Rename {
        dir: PathBuf,

        /// Base name for the new file names
        #[arg(short, long, conflicts_with_all = ["last", "name_from"])]
        name: Option<String>,

        /// Reuse the base name from the previous rename in this directory
        #[arg(long, conflicts_with = "name_from")]
        last: bool,

        /// Take the base name from the item at this position (1-based)
        #[arg(long, value_name = "POS")]
        name_from: Option<usize>,

        /// Positions to rename, e.g. "1,3-5" (1-based, default: all)
        #[arg(short, long)]
        select: Option<String>,

        #[arg(long, value_enum)]
        sort: Option<SortArg>,

        /// Show what would be renamed without touching any file
        #[arg(long)]
        dry_run: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Render a thumbnail contact sheet
    Sheet {
        dir: PathBuf,

        /// Output image (format from the extension, e.g. .png or .jpg)
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, default_value_t = 6)]
        columns: u32,

        /// Cell size in pixels
        #[arg(long, default_value_t = 160)]
        cell: u32,

        #[arg(long, value_enum)]
        sort: Option<SortArg>,
    },
}

/// Parse a 1-based selection such as "1,3-5" into 0-based indices below `len`.
fn parse_selection(spec: &str, len: usize) -> anyhow::Result<BTreeSet<usize>> {
    let mut selection = BTreeSet::new();
    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (start, end) = match part.split_once('-') {
            Some((a, b)) => (a.trim().parse::<usize>()?, b.trim().parse::<usize>()?),
            None => {
                let n = part.parse::<usize>()?;
                (n, n)
            }
        };
        if start == 0 || end < start {
            bail!("invalid selection range: {}", part);
        }
        if end > len {
            bail!("selection {} is past the last item ({})", part, len);
        }
        selection.extend(start - 1..end);
    }
    Ok(selection)
}

fn open_collection(config: Option<&Path>, dir: &Path, sort: Option<SortArg>) -> anyhow::Result<MediaCollection> {
    let options = match config {
        Some(path) => {
            CollectionOptions::from_json_file(path).with_context(|| format!("reading config {}", path.display()))?
        }
        None => CollectionOptions::default(),
    };
    let mut collection = MediaCollection::new(options)?;
    let report = collection.set_current_directory(dir)?;
    for warning in &report.warnings {
        eprintln!("warning: {}", warning);
    }
    if let Some(order) = sort {
        collection.sort(order.into());
    }
    Ok(collection)
}

fn load_with_progress(collection: &MediaCollection) {
    let pb = ProgressBar::new(collection.size() as u64);
    if let Ok(style) = ProgressStyle::default_bar().template("[{bar:40}] {pos}/{len} loading {msg}") {
        pb.set_style(style);
    }
    let warnings = collection.load_all(&|_stage, current, _total, message| {
        pb.set_position(current + 1);
        pb.set_message(message.to_string());
    });
    pb.finish_and_clear();
    for warning in warnings {
        eprintln!("warning: {}", warning);
    }
}

fn run_list(collection: &MediaCollection, json: bool) -> anyhow::Result<()> {
    let summaries = collection.summaries();
    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }
    for s in &summaries {
        let date = s
            .date
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:>4}  {:<5}  {:<19}  {:>9}  {}", s.position, s.kind.to_string(), date, s.size_label, s.name);
    }
    Ok(())
}

struct RenameArgs {
    name: Option<String>,
    last: bool,
    name_from: Option<usize>,
    select: Option<String>,
    dry_run: bool,
    json: bool,
}

fn run_rename(collection: &mut MediaCollection, args: RenameArgs) -> anyhow::Result<()> {
    let dir = collection
        .current_directory()
        .map(Path::to_path_buf)
        .context("collection has no directory")?;
    let mut session = RenameSession::load(&dir)?.unwrap_or_default();

    let base_name = match (args.name, args.last, args.name_from) {
        (Some(name), _, _) => name,
        (None, true, _) => session
            .last_used_name()
            .map(str::to_string)
            .context("no previous rename recorded for this directory")?,
        (None, false, Some(position)) => {
            let index = position.checked_sub(1).context("positions start at 1")?;
            let item = collection.object_at_index(index)?;
            session.remember_from(item, collection.naming_convention())
        }
        (None, false, None) => bail!("one of --name, --last or --name-from is required"),
    };

    let selection = match &args.select {
        Some(spec) => parse_selection(spec, collection.size())?,
        None => (0..collection.size()).collect(),
    };

    if args.dry_run {
        let plan = collection.plan_rename(&base_name, &selection)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else {
            for entry in &plan {
                println!("{:>4}  {} -> {}", entry.position, entry.from.display(), entry.to.display());
            }
        }
        return Ok(());
    }

    let report = collection.rename_selection(&base_name, &selection)?;
    session.remember(&base_name);
    session.save(&dir)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for entry in &report.renamed {
            println!("{:>4}  {} -> {}", entry.position, entry.from.display(), entry.to.display());
        }
        for failure in &report.failed {
            eprintln!("{:>4}  FAILED {}: {}", failure.position, failure.path.display(), failure.error);
        }
    }

    if !report.is_complete() {
        bail!("{} of {} renames failed", report.failed.len(), selection.len());
    }
    Ok(())
}

fn run_sheet(collection: &MediaCollection, output: &Path, columns: u32, cell: u32) -> anyhow::Result<()> {
    load_with_progress(collection);
    collection.filter_for_movies_with_thumbnail_images();

    let sheet = ContactSheet {
        columns,
        cell_size: cell,
        ..Default::default()
    };
    let image = sheet.render(collection);
    let is_jpeg = output
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"));
    // JPEG has no alpha channel
    let image = if is_jpeg {
        image::DynamicImage::ImageRgb8(image.to_rgb8())
    } else {
        image
    };
    image
        .save(output)
        .with_context(|| format!("writing {}", output.display()))?;
    info!("Wrote contact sheet of {} items to {}", collection.size(), output.display());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = cli.config.as_deref();
    match cli.command {
        Command::List { dir, sort, json } => {
            let collection = open_collection(config, &dir, sort)?;
            run_list(&collection, json)
        }
        Command::Rename {
            dir,
            name,
            last,
            name_from,
            select,
            sort,
            dry_run,
            json,
        } => {
            let mut collection = open_collection(config, &dir, sort)?;
            run_rename(
                &mut collection,
                RenameArgs {
                    name,
                    last,
                    name_from,
                    select,
                    dry_run,
                    json,
                },
            )
        }
        Command::Sheet {
            dir,
            output,
            columns,
            cell,
            sort,
        } => {
            let collection = open_collection(config, &dir, sort)?;
            run_sheet(&collection, &output, columns, cell)
        }
    }
}
