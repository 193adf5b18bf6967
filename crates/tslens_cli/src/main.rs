//! tslens: TypeScript project intellisense inspector.
//!
//! Usage:
//!   tslens [options] [path]
//!
//! Points the intellisense service at a project directory, reports what
//! it loaded, and can trace import resolution or keep watching for edits.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::Parser as ClapParser;
use miette::IntoDiagnostic;
use notify::{EventKind, RecursiveMode, Watcher};

use tslens_config::CANDIDATE_FILES;
use tslens_host::{LocalHost, ProjectHost};
use tslens_paths::{
    file_name, join_paths, normalize_path, normalize_slashes, project_relative, Extension,
};
use tslens_resolver::{ResolutionTrace, Strategy};
use tslens_service::{InitReport, ProjectService};
use tslens_surface::RecordingSurface;

#[derive(ClapParser, Debug)]
#[command(
    name = "tslens",
    about = "tslens - TypeScript project intellisense service",
    disable_version_flag = true
)]
struct Cli {
    /// Project directory to initialize.
    #[arg(value_name = "PATH", default_value = ".")]
    path: String,

    /// Resolve an import specifier after initialization.
    #[arg(long, value_name = "SPECIFIER")]
    resolve: Option<String>,

    /// File the specifier is imported from (defaults to <PATH>/index.ts).
    #[arg(long, value_name = "FILE")]
    from: Option<String>,

    /// Print the strategy-by-strategy resolution trace.
    #[arg(long)]
    explain: bool,

    /// Emit reports as JSON.
    #[arg(long)]
    json: bool,

    /// Keep running and feed file changes into the registry.
    #[arg(short = 'w', long)]
    watch: bool,

    /// Print the version.
    #[arg(short = 'v', long)]
    version: bool,
}

// ANSI color codes
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const GRAY: &str = "\x1b[90m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.version {
        println!("tslens Version 0.1.0");
        return Ok(());
    }

    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    let root = absolute_root(&cli.path)?;

    let host: Arc<dyn ProjectHost> = Arc::new(LocalHost::new());
    let surface = Arc::new(RecordingSurface::new());
    let service = ProjectService::new(host, surface.clone());

    let report = runtime.block_on(service.initialize(&root));
    print_report(&cli, &report, surface.as_ref());

    if let Some(specifier) = cli.resolve.as_deref() {
        let code = runtime.block_on(run_resolve(&cli, &service, specifier, &root));
        if code != 0 {
            process::exit(code);
        }
    }

    if cli.watch {
        run_watch(&runtime, &service, &root)?;
    }

    Ok(())
}

fn absolute_root(path: &str) -> miette::Result<String> {
    let joined = if Path::new(path).is_absolute() {
        PathBuf::from(path)
    } else {
        std::env::current_dir().into_diagnostic()?.join(path)
    };
    Ok(normalize_path(&normalize_slashes(&joined.to_string_lossy())))
}

fn print_report(cli: &Cli, report: &InitReport, surface: &RecordingSurface) {
    if cli.json {
        match serde_json::to_string_pretty(report) {
            Ok(json) => println!("{}", json),
            Err(err) => print_error(&format!("failed to serialize report: {}", err)),
        }
        return;
    }

    let use_color = atty_is_terminal();
    if use_color {
        println!("{}{}{}", BOLD, report.root, RESET);
    } else {
        println!("{}", report.root);
    }
    println!(
        "  configuration:           {}",
        if report.config_found { "found" } else { "defaults" }
    );
    println!(
        "  sources loaded:          {}/{}",
        report.files_loaded, report.files_discovered
    );
    println!("  standard library files:  {}", report.stdlib_files);
    println!(
        "  dependency declarations: {}",
        report.dependency_declarations
    );
    println!("  own declarations:        {}", report.own_declarations);
    println!("  ambient total:           {}", surface.ambient_count());
    if use_color {
        println!(
            "{}initialized in {:.2}s{}",
            GRAY,
            report.elapsed_ms as f64 / 1000.0,
            RESET
        );
    } else {
        println!("initialized in {:.2}s", report.elapsed_ms as f64 / 1000.0);
    }
}

async fn run_resolve(cli: &Cli, service: &ProjectService, specifier: &str, root: &str) -> i32 {
    let from = match cli.from.as_deref() {
        Some(from) if Path::new(from).is_absolute() => normalize_path(from),
        Some(from) => join_paths(root, from),
        None => join_paths(root, "index.ts"),
    };

    if cli.explain {
        let Some(trace) = service.explain_resolution(specifier, &from).await else {
            print_error("project is not initialized");
            return 1;
        };
        if cli.json {
            match serde_json::to_string_pretty(&trace) {
                Ok(json) => println!("{}", json),
                Err(err) => print_error(&format!("failed to serialize trace: {}", err)),
            }
        } else {
            print_trace(&trace, atty_is_terminal());
        }
        return i32::from(trace.resolved.is_none());
    }

    match service.load_on_demand(specifier, &from).await {
        Some(path) => {
            println!("{}", path);
            0
        }
        None => {
            print_error(&format!("cannot resolve '{}' from {}", specifier, from));
            1
        }
    }
}

fn print_trace(trace: &ResolutionTrace, use_color: bool) {
    println!("{} from {}", trace.specifier, trace.from_file);
    for attempt in &trace.attempts {
        let label = strategy_label(attempt.strategy);
        if use_color {
            println!("  {}{}{}", BOLD, label, RESET);
        } else {
            println!("  {}", label);
        }
        if let Some(note) = &attempt.note {
            if use_color {
                println!("    {}{}{}", GRAY, note, RESET);
            } else {
                println!("    {}", note);
            }
        }
        for probe in &attempt.probes {
            let mark = if probe.exists { "hit " } else { "miss" };
            if use_color {
                let color = if probe.exists { GREEN } else { GRAY };
                println!("    {}{}{} {}", color, mark, RESET, probe.candidate);
            } else {
                println!("    {} {}", mark, probe.candidate);
            }
        }
    }
    match &trace.resolved {
        Some(path) if use_color => println!("{}resolved{}: {}{}{}", GREEN, RESET, CYAN, path, RESET),
        Some(path) => println!("resolved: {}", path),
        None => println!("no resolution"),
    }
}

fn strategy_label(strategy: Strategy) -> &'static str {
    match strategy {
        Strategy::Relative => "relative",
        Strategy::Alias => "alias",
        Strategy::Package => "package",
    }
}

fn run_watch(
    runtime: &tokio::runtime::Runtime,
    service: &ProjectService,
    root: &str,
) -> miette::Result<()> {
    println!("Watching {} for changes...", root);

    let (tx, rx) = std::sync::mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).into_diagnostic()?;
    watcher
        .watch(Path::new(root), RecursiveMode::Recursive)
        .into_diagnostic()?;

    for result in rx {
        let event = match result {
            Ok(event) => event,
            Err(err) => {
                print_error(&format!("watch error: {}", err));
                continue;
            }
        };
        for path in &event.paths {
            let text = normalize_slashes(&path.to_string_lossy());
            if in_ignored_dir(&text) {
                continue;
            }
            if is_refresh_trigger(&text) {
                println!("{} changed, refreshing project...", file_name(&text));
                if let Some(report) = runtime.block_on(service.refresh()) {
                    println!(
                        "refreshed: {} sources, {} dependency declarations",
                        report.files_loaded, report.dependency_declarations
                    );
                }
                continue;
            }
            let tracked = Extension::from_path(&text)
                .map(|ext| ext.is_typescript_family() || ext.is_javascript_family())
                .unwrap_or(false);
            if !tracked {
                continue;
            }
            let relative = project_relative(root, &text);
            match &event.kind {
                EventKind::Create(_) | EventKind::Modify(_) => {
                    // Transient read failures happen mid-save; the next
                    // event carries the settled content.
                    if let Ok(content) = std::fs::read_to_string(path) {
                        service.update_file(&text, &content);
                        println!("updated {}", relative);
                    }
                }
                EventKind::Remove(_) => {
                    service.remove_file(&text);
                    println!("removed {}", relative);
                }
                _ => {}
            }
        }
    }

    Ok(())
}

fn in_ignored_dir(path: &str) -> bool {
    ["/node_modules/", "/.git/", "/dist/", "/build/"]
        .iter()
        .any(|dir| path.contains(dir))
}

fn is_refresh_trigger(path: &str) -> bool {
    let name = file_name(path);
    name == "package.json" || CANDIDATE_FILES.contains(&name)
}

fn print_error(msg: &str) {
    if atty_is_terminal() {
        eprintln!("{}{}error{}: {}", BOLD, RED, RESET, msg);
    } else {
        eprintln!("error: {}", msg);
    }
}

fn atty_is_terminal() -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::isatty(2) != 0 }
    }
    #[cfg(not(unix))]
    {
        true
    }
}
