use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use rusty_clippings::archive::cache::ArchiveCache;
use rusty_clippings::archive::options::ArchiveOptions;
use rusty_clippings::archive::options::DEFAULT_PREVIEW_SIZE;
use rusty_clippings::archive::query::run_query;
use rusty_clippings::archive::query::SearchOutcome;
use rusty_clippings::archive::view::TableView;
use rusty_clippings::Archive;
use std::io::BufRead;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const RELOAD_COMMAND: &str = ":reload";
const QUIT_COMMAND: &str = ":quit";

#[derive(Parser, Debug)]
#[command(name = "rusty-clippings", version, about = "Search a newspaper clipping archive kept in Excel workbooks")]
struct Cli {
    /// Directory holding the .xlsx and .xls workbooks
    #[arg(default_value = ".")]
    directory: PathBuf,

    /// Add the source file of every clipping as an `Origen` column
    #[arg(long)]
    provenance: bool,

    /// Run a single query and exit instead of reading queries from stdin
    #[arg(long)]
    query: Option<String>,

    /// Clippings shown for an empty query
    #[arg(long, default_value_t = DEFAULT_PREVIEW_SIZE)]
    preview: usize,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let options = ArchiveOptions::default()
        .with_provenance(cli.provenance)
        .with_preview_size(cli.preview);
    let mut cache = ArchiveCache::new(&cli.directory, options);

    let archive = load(&mut cache, false)?;
    if let Some(query) = cli.query.as_deref() {
        print_outcome(&archive, query);
        return Ok(());
    }
    if !archive.is_empty() {
        print_outcome(&archive, "");
    }

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("Search ({QUIT_COMMAND} to exit): ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line.context("Failed to read query")?;
        match line.trim() {
            QUIT_COMMAND => break,
            RELOAD_COMMAND => {
                load(&mut cache, true)?;
            }
            _ => {
                let archive = cache.get().context("Failed to load archive")?;
                print_outcome(&archive, &line);
            }
        }
    }
    Ok(())
}

/// Loads or reloads the archive and prints the status line.
fn load(cache: &mut ArchiveCache, reload: bool) -> Result<std::sync::Arc<Archive>> {
    let loaded = if reload { cache.reload() } else { cache.get() };
    let archive = loaded.with_context(|| format!("Failed to load archive from '{}'", cache.directory().display()))?;
    if archive.is_empty() {
        println!("No spreadsheet files found in '{}'.", cache.directory().display());
        println!("Make sure the .xlsx files are in that directory.");
    } else {
        println!("{} files loaded ({} clippings).", archive.file_count(), archive.len());
    }
    Ok(archive)
}

fn print_outcome(archive: &Archive, query: &str) {
    match run_query(archive, query) {
        SearchOutcome::NoArchive => println!("The archive is empty."),
        SearchOutcome::NoResults => println!("No results."),
        SearchOutcome::Browse(records) => print!("{}", TableView::project(archive, &records)),
        SearchOutcome::Found(records) => {
            println!("Found: {}", records.len());
            print!("{}", TableView::project(archive, &records));
        }
    }
}
