use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{info, warn};

use crate::cli::{Cli, Command};
use crate::core::error::{ModManagerError, ModManagerResult};
use crate::core::loader::LoaderStatus;
use crate::core::manifest::MANIFEST_URL;
use crate::core::mods::{
    LifecycleController, LifecycleEvent, ModDescriptor, ModStatus, Transition, UninstallOutcome,
};
use crate::core::state::{AppState, ConfigStore, ManifestLocation, SessionOptions};

const URL_DISPLAY_LIMIT: usize = 50;

pub async fn dispatch(cli: Cli) -> ModManagerResult<ExitCode> {
    let store = ConfigStore::default();
    let force_prompt = matches!(cli.command, Command::Setup);

    let Some(game_root) = resolve_game_root(cli.game_path.as_deref(), &store, force_prompt).await? else {
        // Declining to pick a game folder ends the session.
        eprintln!("No game folder selected, exiting.");
        return Ok(ExitCode::FAILURE);
    };

    let manifest = match (cli.manifest_file, cli.manifest_url) {
        (Some(path), _) => ManifestLocation::File(path),
        (None, Some(url)) => ManifestLocation::Url(url),
        (None, None) => ManifestLocation::Url(MANIFEST_URL.to_string()),
    };

    let state = AppState::new(SessionOptions {
        game_root,
        manifest,
        staging_dir: cli.staging_dir,
    })?;

    match cli.command {
        Command::Setup => {
            println!("Game path saved: {}", state.game_root.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Loader => ensure_loader(&state).await,
        Command::List => list_mods(&state).await,
        Command::Status { name } => mod_status(&state, &name).await,
        Command::Install { names } => install_mods(&state, names).await,
        Command::Uninstall { names } => uninstall_mods(&state, names).await,
    }
}

// ── Game folder ─────────────────────────────────────────

async fn resolve_game_root(
    from_cli: Option<&Path>,
    store: &ConfigStore,
    force_prompt: bool,
) -> ModManagerResult<Option<PathBuf>> {
    if let Some(path) = from_cli {
        store.save_game_path(path)?;
        return Ok(Some(path.to_path_buf()));
    }

    if !force_prompt {
        if let Some(root) = store.load().game_root() {
            return Ok(Some(root));
        }
        if store.path().exists() {
            eprintln!("select a game path");
        }
    }

    let Some(picked) = prompt_game_path().await? else {
        return Ok(None);
    };
    store.save_game_path(&picked)?;
    println!("Game path saved successfully!");
    Ok(Some(picked))
}

async fn prompt_game_path() -> ModManagerResult<Option<PathBuf>> {
    tokio::task::spawn_blocking(|| {
        match inquire::Text::new("Select your game path:")
            .with_help_message("Folder containing Gorilla Tag.exe")
            .prompt()
        {
            Ok(raw) if !raw.trim().is_empty() => Ok(Some(PathBuf::from(raw.trim()))),
            Ok(_) => Ok(None),
            Err(inquire::InquireError::OperationCanceled)
            | Err(inquire::InquireError::OperationInterrupted) => Ok(None),
            Err(e) => Err(ModManagerError::Config(format!("cannot read game path: {e}"))),
        }
    })
    .await?
}

// ── Loader ──────────────────────────────────────────────

async fn ensure_loader(state: &AppState) -> ModManagerResult<ExitCode> {
    match state.loader_installer().ensure(&state.game_root).await {
        Ok(LoaderStatus::AlreadyInstalled) => println!("BepInEx already installed."),
        Ok(LoaderStatus::Installed) => println!("BepInEx installed successfully!"),
        Ok(LoaderStatus::InstalledWithoutConfig { reason }) => {
            println!("BepInEx installed, but its config could not be applied: {reason}")
        }
        Err(e) => {
            report_error(&format!("couldnt install bepinex: {e}"));
            return Ok(ExitCode::FAILURE);
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ── Listing ─────────────────────────────────────────────

/// Sync the registry; a failure is shown once and the previous set is kept.
async fn sync_registry(state: &AppState) -> bool {
    match state.registry.sync(state.manifest_source()).await {
        Ok(_) => true,
        Err(e) => {
            report_error(&format!("Couldn't load the mod list: {e}"));
            false
        }
    }
}

async fn list_mods(state: &AppState) -> ModManagerResult<ExitCode> {
    if !sync_registry(state).await {
        return Ok(ExitCode::FAILURE);
    }

    let snapshot = state.registry.snapshot();
    let statuses = state.controller.status_all(snapshot.mods()).await;

    for (descriptor, status) in snapshot.mods().iter().zip(statuses) {
        println!("{}", render_mod(descriptor, status));
    }
    println!("{} mods available", snapshot.len());
    Ok(ExitCode::SUCCESS)
}

async fn mod_status(state: &AppState, name: &str) -> ModManagerResult<ExitCode> {
    if !sync_registry(state).await {
        return Ok(ExitCode::FAILURE);
    }
    let descriptor = state
        .registry
        .get(name)
        .ok_or_else(|| ModManagerError::ModNotFound(name.to_string()))?;

    println!("{}", render_mod(&descriptor, state.controller.status(&descriptor).await));
    if let Ok(target) = descriptor.target(&state.game_root) {
        println!("  target: {}", target.directory.join(&target.file_name).display());
    }
    Ok(ExitCode::SUCCESS)
}

fn render_mod(descriptor: &ModDescriptor, status: ModStatus) -> String {
    let mut line = descriptor.display_name();
    let author = descriptor.author_info();
    if !author.is_empty() {
        line.push_str(&format!("  {author}"));
    }
    if let Some(group) = descriptor.group.as_deref() {
        line.push_str(&format!("  [{group}]"));
    }
    line.push_str(&format!("\n  {status}"));
    if !descriptor.dependencies.is_empty() {
        line.push_str(&format!(
            "\n  Dependencies: {}",
            descriptor.dependencies.join(", ")
        ));
    }
    line.push_str(&format!("\n  {}", shorten_url(&descriptor.download_url)));
    line
}

fn shorten_url(url: &str) -> String {
    if url.chars().count() <= URL_DISPLAY_LIMIT {
        return url.to_string();
    }
    let head: String = url.chars().take(URL_DISPLAY_LIMIT - 3).collect();
    format!("{head}...")
}

// ── Transitions ─────────────────────────────────────────

/// Look up every name, reporting the unknown ones.
fn resolve_names(state: &AppState, names: Vec<String>) -> (Vec<ModDescriptor>, usize) {
    let snapshot = state.registry.snapshot();
    let mut found = Vec::with_capacity(names.len());
    let mut missing = 0;
    for name in names {
        match snapshot.get(&name) {
            Some(descriptor) => found.push(descriptor.clone()),
            None => {
                report_error(&ModManagerError::ModNotFound(name).to_string());
                missing += 1;
            }
        }
    }
    (found, missing)
}

/// Print start notifications while transitions run.
fn spawn_progress_printer(controller: &LifecycleController) -> tokio::task::JoinHandle<()> {
    let mut events = controller.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let LifecycleEvent::Started {
                mod_name,
                transition,
            } = event
            {
                match transition {
                    Transition::Install => println!("Installing {mod_name}..."),
                    Transition::Uninstall => println!("Uninstalling {mod_name}..."),
                }
            }
        }
    })
}

async fn install_mods(state: &AppState, names: Vec<String>) -> ModManagerResult<ExitCode> {
    if !sync_registry(state).await {
        return Ok(ExitCode::FAILURE);
    }
    let (descriptors, mut failures) = resolve_names(state, names);

    if let Err(e) = state.loader_installer().ensure(&state.game_root).await {
        warn!("BepInEx bootstrap failed, installing mods anyway: {}", e);
        report_error(&format!("couldnt install bepinex: {e}"));
    }

    let printer = spawn_progress_printer(&state.controller);
    let tasks: Vec<_> = descriptors
        .into_iter()
        .map(|descriptor| {
            let controller = Arc::clone(&state.controller);
            let name = descriptor.name.clone();
            (name, tokio::spawn(async move { controller.install(descriptor).await }))
        })
        .collect();

    for (name, task) in tasks {
        match task.await.map_err(ModManagerError::from).and_then(|r| r) {
            Ok(report) if report.state.is_installed() => {
                println!("Successfully installed {} v{}!", report.mod_name, report.version);
            }
            Ok(report) => {
                println!(
                    "Installed {} v{} into {}, but it is not detected as installed.",
                    report.mod_name,
                    report.version,
                    report.target_dir.display()
                );
            }
            Err(e) => {
                report_error(&format!("Failed to install {name}: {e}"));
                failures += 1;
            }
        }
    }
    printer.abort();

    Ok(exit_code(failures))
}

async fn uninstall_mods(state: &AppState, names: Vec<String>) -> ModManagerResult<ExitCode> {
    if !sync_registry(state).await {
        return Ok(ExitCode::FAILURE);
    }
    let (descriptors, mut failures) = resolve_names(state, names);

    let printer = spawn_progress_printer(&state.controller);
    let tasks: Vec<_> = descriptors
        .into_iter()
        .map(|descriptor| {
            let controller = Arc::clone(&state.controller);
            let name = descriptor.name.clone();
            (name, tokio::spawn(async move { controller.uninstall(descriptor).await }))
        })
        .collect();

    for (name, task) in tasks {
        match task.await.map_err(ModManagerError::from).and_then(|r| r) {
            Ok(report) => match report.outcome {
                UninstallOutcome::Removed { files } => {
                    info!("Removed {:?}", files);
                    println!("uninstalled {}!", report.mod_name);
                }
                UninstallOutcome::NothingToUninstall => {
                    println!("couldnt find {} to uninstall.", report.mod_name);
                }
            },
            Err(e) => {
                report_error(&format!("couldnt uninstall {name}: {e}"));
                failures += 1;
            }
        }
    }
    printer.abort();

    Ok(exit_code(failures))
}

fn exit_code(failures: usize) -> ExitCode {
    if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn report_error(message: &str) {
    eprintln!("Error: {message}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_urls_are_shortened() {
        let short = "https://x/Foo.dll";
        assert_eq!(shorten_url(short), short);

        let long = format!("https://github.com/{}/Foo.dll", "a".repeat(60));
        let shown = shorten_url(&long);
        assert_eq!(shown.chars().count(), 50);
        assert!(shown.ends_with("..."));
    }

    #[test]
    fn rendered_mod_shows_metadata() {
        let mut m = ModDescriptor::new("Utilla", "1.6.10", "https://x/Utilla.dll");
        m.author = Some("Graze".into());
        m.group = Some("Libraries".into());
        m.dependencies = vec!["BepInEx".into()];

        let text = render_mod(&m, ModStatus::Installed);
        assert!(text.starts_with("Utilla v1.6.10  by Graze  [Libraries]"));
        assert!(text.contains("\u{2713} Installed"));
        assert!(text.contains("Dependencies: BepInEx"));
    }
}
