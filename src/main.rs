mod app;
mod export;
mod host;
mod layout;
mod navigation;
mod relations;
mod scene;
mod session;
mod settings;
mod types;
mod ui;

use anyhow::{bail, Context, Result};
use app::App;
use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use export::ExportFormat;
use host::SqliteHost;
use layout::{build_dot, LayoutEngine};
use navigation::{RelationTree, TreeOptions};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use relations::capture;
use session::ExplorerSession;
use settings::Settings;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relx")]
#[command(about = "Explore, edit and export the foreign-key relationships of a SQLite database")]
struct Cli {
    /// Database file path
    #[arg(value_name = "DATABASE")]
    database: Option<PathBuf>,

    /// Open database in read-write mode
    #[arg(long)]
    read_write: bool,

    /// Graphviz `dot` binary; overrides the settings file
    #[arg(long, env = "RELX_DOT_PATH", global = true)]
    dot_path: Option<PathBuf>,

    /// Rows per board column, 0 for all
    #[arg(long, default_value = "100", global = true)]
    max_rows: usize,

    /// Settings file [default: <config dir>/relx/settings.json]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the layout of the relationship graph
    Layout {
        /// Database file path
        #[arg(long, short)]
        db: PathBuf,

        /// Print the DOT source instead of running Graphviz
        #[arg(long)]
        dot: bool,

        /// Only keep relations touching these tables
        #[arg(long, short)]
        focus: Vec<String>,
    },
    /// Export the relationship graph or a report of related rows
    Export {
        /// Database file path
        #[arg(long, short)]
        db: PathBuf,

        /// Output format [default: from the file extension]
        #[arg(long, short, value_enum)]
        format: Option<ExportFormatArg>,

        /// Root table of the JSON report
        #[arg(long, short)]
        layer: Option<String>,

        /// Output file path
        #[arg(long, short)]
        out: PathBuf,
    },
    /// Print the relation tree of a table
    Tree {
        /// Database file path
        #[arg(long, short)]
        db: PathBuf,

        /// Table name or id
        #[arg(value_name = "TABLE")]
        layer: String,
    },
    /// Remember the Graphviz `dot` binary; no path clears it
    SetDotPath {
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum ExportFormatArg {
    Svg,
    Drawio,
    Json,
    Csv,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(fmt: ExportFormatArg) -> Self {
        match fmt {
            ExportFormatArg::Svg => ExportFormat::Svg,
            ExportFormatArg::Drawio => ExportFormat::Drawio,
            ExportFormatArg::Json => ExportFormat::Json,
            ExportFormatArg::Csv => ExportFormat::Csv,
        }
    }
}

fn init_tracing(default_level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init(),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.command.is_some() { "info" } else { "warn" };
    init_tracing(default_level, cli.log_file.as_deref())?;

    let settings_path = cli.config.clone().or_else(Settings::default_path);
    let settings = match &settings_path {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let dot_path = settings.resolve_dot_path(cli.dot_path.clone());

    match cli.command {
        Some(Commands::Layout { db, dot, focus }) => run_layout(&db, dot, &focus, dot_path),
        Some(Commands::Export {
            db,
            format,
            layer,
            out,
        }) => run_export(&db, format.map(Into::into), layer.as_deref(), &out, dot_path, cli.max_rows),
        Some(Commands::Tree { db, layer }) => run_tree(&db, &layer, cli.max_rows),
        Some(Commands::SetDotPath { path }) => run_set_dot_path(settings, settings_path.as_deref(), path),
        None => {
            let db_path = cli.database.context("Database path is required")?;
            run_tui(&db_path, cli.read_write, cli.max_rows, settings, settings_path, dot_path)
        }
    }
}

fn open_host(db_path: &Path, read_only: bool) -> Result<SqliteHost> {
    SqliteHost::open(db_path, read_only)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))
}

fn resolve_layers(snapshot: &types::RelationsSnapshot, names: &[String]) -> Result<HashSet<String>> {
    names
        .iter()
        .map(|name| {
            if snapshot.layer(name).is_some() {
                return Ok(name.clone());
            }
            snapshot
                .layers
                .values()
                .find(|l| l.name.eq_ignore_ascii_case(name))
                .map(|l| l.id.clone())
                .with_context(|| format!("Unknown table: {}", name))
        })
        .collect()
}

fn run_layout(db_path: &Path, dot: bool, focus: &[String], dot_path: Option<PathBuf>) -> Result<()> {
    let host = open_host(db_path, true)?;
    let snapshot = capture(&host).context("Failed to read the relationships")?;
    let focus = resolve_layers(&snapshot, focus)?;
    let highlight = HashSet::new();

    if dot {
        print!("{}", build_dot(&snapshot, &highlight, &focus));
        return Ok(());
    }

    let mut engine = LayoutEngine::new(dot_path);
    let plain = engine.render_plain(&snapshot, &highlight, &focus);
    if plain.is_empty() {
        bail!("Could not lay out the graph: {}", engine.last_error());
    }
    print!("{}", plain);
    Ok(())
}

fn run_export(
    db_path: &Path,
    format: Option<ExportFormat>,
    layer: Option<&str>,
    output_path: &Path,
    dot_path: Option<PathBuf>,
    max_rows: usize,
) -> Result<()> {
    let host = open_host(db_path, true)?;
    let mut session = ExplorerSession::new(Box::new(host), LayoutEngine::new(dot_path), max_rows)?;
    let format = app::export_to(&mut session, output_path, format, layer)?;

    info!(path = %output_path.display(), ?format, "export finished");
    println!("Exported to: {}", output_path.display());
    Ok(())
}

fn run_tree(db_path: &Path, layer: &str, max_rows: usize) -> Result<()> {
    let host = open_host(db_path, true)?;
    let snapshot = capture(&host).context("Failed to read the relationships")?;
    let layer_id = resolve_layers(&snapshot, &[layer.to_string()])?
        .into_iter()
        .next()
        .context("No table given")?;

    let mut tree = RelationTree::new(layer_id.as_str());
    let options = TreeOptions {
        max_count: max_rows,
        ..TreeOptions::default()
    };
    tree.rebuild(&host, &snapshot, &options)
        .with_context(|| format!("Failed to read rows of {}", layer))?;

    println!("{}", snapshot.layer_name(&layer_id));
    for line in tree.outline(&host, &snapshot) {
        println!("  {}", line);
    }
    Ok(())
}

fn run_set_dot_path(mut settings: Settings, settings_path: Option<&Path>, path: Option<PathBuf>) -> Result<()> {
    let settings_path = settings_path.context("No configuration directory; pass --config")?;
    settings.set_dot_path(path);
    settings.save(settings_path)?;
    match &settings.dot_path {
        Some(path) => println!("Graphviz path set to {}", path.display()),
        None => println!("Graphviz path cleared; `dot` is looked up on PATH"),
    }
    Ok(())
}

fn run_tui(
    db_path: &Path,
    read_write: bool,
    max_rows: usize,
    settings: Settings,
    settings_path: Option<PathBuf>,
    dot_path: Option<PathBuf>,
) -> Result<()> {
    let host = open_host(db_path, !read_write)?;
    let session = ExplorerSession::new(Box::new(host), LayoutEngine::new(dot_path), max_rows)?;

    // Create app
    let mut app = App::new(session, settings, settings_path);

    // Load initial tables
    app.load_tables();

    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("Failed to enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    let result = run_loop(&mut terminal, &mut app);

    // Cleanup
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_loop<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        let size = terminal.size()?;
        app.sync_view(size);
        let frame = terminal.draw(|f| ui::render(f, app))?;
        app.remember_frame(frame.buffer);

        if app.should_quit() {
            return Ok(());
        }

        // Handle input and resize events
        if event::poll(Duration::from_millis(250))? {
            let event = event::read()?;
            app.handle_event(event, terminal)?;
        }
    }
}
