//! Thin CLI layer: parse args, styled output, and call into ipm-core.
//! Crash-proof: panic caught and reported; all errors return Result.

mod logging;

use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use ipm_core::{Ipm, IpmOptions, PackageInfo, PackageMetadata, PackageSort};
use std::env;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

const HOST_VERSION_ENV: &str = "INKDROP_VERSION";

// ---- UI helpers (no-op when stdout isn't a TTY) ----

fn use_color() -> bool {
    std::io::stdout().is_terminal()
        && env::var("NO_COLOR").unwrap_or_default().is_empty()
}

fn success(msg: &str) {
    if use_color() {
        println!("{}", msg.green());
    } else {
        println!("{}", msg);
    }
}

fn error(msg: &str) {
    if use_color() {
        eprintln!("{}", msg.red());
    } else {
        eprintln!("{}", msg);
    }
}

fn dim(msg: &str) {
    if use_color() {
        println!("{}", msg.dimmed());
    } else {
        println!("{}", msg);
    }
}

/// Run a long-running task; in quiet mode show a spinner until done.
fn run_with_spinner<F>(message: &str, quiet: bool, f: F) -> Result<(), String>
where
    F: FnOnce() -> Result<(), String> + Send + 'static,
{
    if !quiet {
        return f();
    }
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = f();
        let _ = tx.send(result);
    });
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⠈⠐⠠⠰⠸⠹")
        .template("{spinner:.dim} {msg}")
    {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    let tick = Duration::from_millis(80);
    loop {
        match rx.try_recv() {
            Ok(res) => {
                spinner.finish_and_clear();
                return res;
            }
            Err(mpsc::TryRecvError::Disconnected) => {
                spinner.finish_and_clear();
                return Err("Operation failed.".to_string());
            }
            Err(mpsc::TryRecvError::Empty) => {}
        }
        spinner.tick();
        thread::sleep(tick);
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), String> {
    let out = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{}", out);
    Ok(())
}

fn global_args() -> Vec<Arg> {
    vec![
        Arg::new("app-version")
            .long("app-version")
            .global(true)
            .help("Running host version (or set INKDROP_VERSION)"),
        Arg::new("home")
            .long("home")
            .global(true)
            .help("Install directory holding packages and cache (or set INKDROP_HOME)"),
        Arg::new("app-data")
            .long("app-data")
            .global(true)
            .help("Per-user application data root"),
        Arg::new("api-url")
            .long("api-url")
            .global(true)
            .help("Plugin registry API (or set INKDROP_API_URL)"),
        Arg::new("registry")
            .long("registry")
            .global(true)
            .help("npm registry for dependencies (or set NPM_CONFIG_REGISTRY)"),
        Arg::new("quiet")
            .short('q')
            .long("quiet")
            .global(true)
            .action(ArgAction::SetTrue)
            .help("Minimal output; show spinner when busy"),
    ]
}

fn version_arg() -> Arg {
    Arg::new("release")
        .long("version")
        .short('v')
        .value_name("VERSION")
        .help("Exact release to install instead of the latest compatible one")
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output machine-readable JSON")
}

fn cli() -> Command {
    Command::new("ipm")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Plugin package manager: compatible releases from the plugin registry, dependencies from npm")
        .after_help(
            "Examples:\n  ipm install math\n  ipm install math --version 1.6.0\n  ipm update math\n  ipm outdated --json\n  ipm search vim\n  ipm browse --sort majority --theme",
        )
        .args(global_args())
        .subcommand_required(true)
        .subcommand(
            Command::new("install")
                .about("Install a plugin (latest compatible release by default)")
                .arg(Arg::new("package").required(true).help("Plugin name"))
                .arg(version_arg()),
        )
        .subcommand(
            Command::new("update")
                .about("Update an installed plugin, or install it if missing")
                .arg(Arg::new("package").required(true).help("Plugin name"))
                .arg(version_arg()),
        )
        .subcommand(
            Command::new("uninstall")
                .visible_alias("remove")
                .about("Remove an installed plugin")
                .arg(Arg::new("package").required(true).help("Plugin name")),
        )
        .subcommand(
            Command::new("list")
                .visible_alias("ls")
                .about("List installed plugins")
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("outdated")
                .about("List installed plugins with a newer compatible release")
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("search")
                .about("Search the plugin registry")
                .arg(Arg::new("query").required(true).help("Search keywords"))
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("browse")
                .about("List registry plugins by popularity or recency")
                .arg(
                    Arg::new("sort")
                        .long("sort")
                        .value_parser(PackageSort::ALL.map(PackageSort::as_str))
                        .default_value(PackageSort::default().as_str())
                        .help("Listing order"),
                )
                .arg(
                    Arg::new("page")
                        .long("page")
                        .value_parser(clap::value_parser!(u32))
                        .default_value("0")
                        .help("Page number, starting at 0"),
                )
                .arg(
                    Arg::new("theme")
                        .long("theme")
                        .action(ArgAction::SetTrue)
                        .help("Only list themes"),
                )
                .arg(json_arg()),
        )
}

fn options_from(matches: &ArgMatches) -> IpmOptions {
    let string = |id: &str| matches.get_one::<String>(id).cloned();
    IpmOptions {
        app_version: string("app-version")
            .or_else(|| env::var(HOST_VERSION_ENV).ok())
            .unwrap_or_default(),
        app_home_path: string("home").map(PathBuf::from),
        app_data_path: string("app-data").map(PathBuf::from),
        api_url: string("api-url"),
        npm_registry_url: string("registry"),
    }
}

fn print_installed(packages: &[PackageMetadata]) {
    if packages.is_empty() {
        dim("No plugins installed.");
        return;
    }
    for pkg in packages {
        println!("{}@{}", pkg.name, pkg.version);
    }
}

fn print_registry_packages(packages: &[PackageInfo]) {
    if packages.is_empty() {
        dim("No plugins found.");
        return;
    }
    for pkg in packages {
        let description = pkg
            .metadata
            .as_ref()
            .and_then(|m| m.description.as_deref())
            .unwrap_or("");
        println!("{}@{}  {}", pkg.name, pkg.latest().unwrap_or("-"), description);
    }
}

fn run() -> Result<(), String> {
    let matches = cli().get_matches();
    let quiet = matches.get_flag("quiet");
    let ipm = Ipm::new(options_from(&matches));

    let cache_dir = ipm.environment().cache_directory().ok();
    let _log_guard = logging::init(cache_dir.as_deref(), quiet);
    tracing::debug!(host_version = ipm.host_version(), "ipm starting");

    match matches.subcommand() {
        Some(("install", sub_m)) => {
            let name = sub_m.get_one::<String>("package").cloned().unwrap_or_default();
            let version = sub_m.get_one::<String>("release").cloned();
            let msg = format!("Installing {}…", name);
            run_with_spinner(&msg, quiet, move || {
                ipm.install(&name, version.as_deref()).map_err(|e| e.to_string())
            })?;
            if quiet {
                success("Installed.");
            }
        }
        Some(("update", sub_m)) => {
            let name = sub_m.get_one::<String>("package").cloned().unwrap_or_default();
            let version = sub_m.get_one::<String>("release").cloned();
            let msg = format!("Updating {}…", name);
            run_with_spinner(&msg, quiet, move || {
                ipm.update(&name, version.as_deref()).map_err(|e| e.to_string())
            })?;
            if quiet {
                success("Update complete.");
            }
        }
        Some(("uninstall", sub_m)) => {
            let name = sub_m.get_one::<String>("package").cloned().unwrap_or_default();
            ipm.uninstall(&name).map_err(|e| e.to_string())?;
            if quiet {
                success(&format!("Removed {}", name));
            }
        }
        Some(("list", sub_m)) => {
            let installed = ipm.get_installed().map_err(|e| e.to_string())?;
            if sub_m.get_flag("json") {
                print_json(&installed)?;
            } else {
                print_installed(&installed);
            }
        }
        Some(("outdated", sub_m)) => {
            let outdated = ipm.get_outdated().map_err(|e| e.to_string())?;
            if sub_m.get_flag("json") {
                print_json(&outdated)?;
            } else if outdated.is_empty() {
                success("All plugins are up to date.");
            } else {
                for pkg in &outdated {
                    println!("{} {} -> {}", pkg.name, pkg.version, pkg.latest_version);
                }
            }
        }
        Some(("search", sub_m)) => {
            let query = sub_m.get_one::<String>("query").cloned().unwrap_or_default();
            let results = ipm.search(&query).map_err(|e| e.to_string())?;
            if sub_m.get_flag("json") {
                print_json(&results)?;
            } else {
                print_registry_packages(&results);
            }
        }
        Some(("browse", sub_m)) => {
            let sort = sub_m
                .get_one::<String>("sort")
                .and_then(|s| PackageSort::parse(s))
                .unwrap_or_default();
            let page = sub_m.get_one::<u32>("page").copied().unwrap_or(0);
            let results = ipm
                .packages(sort, page, sub_m.get_flag("theme"))
                .map_err(|e| e.to_string())?;
            if sub_m.get_flag("json") {
                print_json(&results)?;
            } else {
                print_registry_packages(&results);
            }
        }
        _ => dim("Use `ipm --help` to see available commands."),
    }
    Ok(())
}

fn main() {
    if !use_color() {
        colored::control::set_override(false);
    }

    let code = match std::panic::catch_unwind(run) {
        Ok(Ok(())) => 0,
        Ok(Err(e)) => {
            error(&e);
            1
        }
        Err(_) => {
            error("An unexpected error occurred. Please report this issue.");
            1
        }
    };
    std::process::exit(code);
}
