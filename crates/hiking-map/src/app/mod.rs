mod logging;
mod map;
mod preferences;
mod settings;
mod storage;

pub use settings::Settings;

use hiking_map_lib::utils::{sanitize_message, track_display_name};
use hiking_map_lib::{
    CoreError, FileTreeNode, FitOutcome, LayerManager, Notice, SyncController, TreeModel,
};
use map::HeadlessMap;
use settings::Command;
use std::process::ExitCode;
use std::sync::Arc;
use storage::{FilePreferencesStore, FsCollection};

type Controller = SyncController<FsCollection, FilePreferencesStore, HeadlessMap>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Failed to start the async runtime: {0}")]
    Runtime(std::io::Error),
}

/// Parse the command line, run the command and map the outcome to an exit code
pub fn run() -> ExitCode {
    logging::setup_logging();
    let settings = Settings::from_cli();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => return report(AppError::Runtime(e)),
    };

    match runtime.block_on(execute(settings)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(e),
    }
}

fn report(err: AppError) -> ExitCode {
    let message = sanitize_message(&err.to_string());
    tracing::error!("{}", message);
    eprintln!("Error: {}", message);
    ExitCode::FAILURE
}

async fn execute(settings: Settings) -> Result<(), AppError> {
    let data_dir = storage::app_data_dir(settings.dev);
    let root = settings
        .root
        .clone()
        .unwrap_or_else(|| storage::default_collection_root(&data_dir));

    let preferences_store =
        Arc::new(FilePreferencesStore::open(storage::settings_path(&data_dir)).await);
    let command = settings.command();

    if let Command::Settings {
        provider,
        api_key,
        style,
        desaturate,
    } = command
    {
        let mut preferences = preferences_store.preferences()?;
        let changed =
            provider.is_some() || api_key.is_some() || style.is_some() || desaturate.is_some();
        if let Some(provider) = provider {
            preferences.map_provider = provider;
        }
        if let Some(api_key) = api_key {
            preferences.mapy.api_key = api_key.trim().to_string();
        }
        if let Some(style) = style {
            preferences.mapy.style = style;
        }
        if let Some(desaturate) = desaturate {
            preferences.desaturate_map = desaturate;
        }
        if changed {
            preferences_store.save(preferences.clone()).await?;
            println!("Settings saved successfully!");
        }

        let tiles = preferences.tiles_provider();
        println!("Settings file: {}", preferences_store.path().display());
        println!("Tiles: {} {} ({})", tiles.name(), tiles.url(), tiles.attribution());
        println!("Desaturated map: {}", preferences.desaturate_map);
        return Ok(());
    }

    let preferences = preferences_store.preferences()?;
    tracing::debug!("Map tiles from {}", preferences.tiles_provider().name());

    let collection = FsCollection::open(root).await?;
    let mut controller: Controller = SyncController::new(
        collection,
        preferences_store,
        HeadlessMap::default(),
        preferences.map,
    );
    controller.load_file_tree().await?;

    let result = dispatch(&mut controller, command).await;
    print_notices(controller.take_notices());
    controller.shutdown().await;
    result.map_err(AppError::from)
}

async fn dispatch(controller: &mut Controller, command: Command) -> hiking_map_lib::Result<()> {
    match command {
        Command::Tree => {
            print_tree(controller.tree(), controller.layers());
        }
        Command::Show => {
            print_layers(controller.layers());
        }
        Command::Fit => {
            if let FitOutcome::Fitted(_) = controller.fit_all_tracks()
                && let Some(view) = controller.layers().map().view()
            {
                println!(
                    "View: center [{:.5}, {:.5}], zoom {}",
                    view.center[0], view.center[1], view.zoom
                );
                controller.on_map_moved(view.center, view.zoom);
            }
        }
        Command::Mkdir { name, parent } => {
            select_target(controller, parent.as_deref())?;
            let folder = controller.create_folder(&name).await?;
            println!("{}", folder.path);
        }
        Command::Color { folder, hex } => {
            controller.set_folder_color(&folder, &hex).await?;
        }
        Command::Upload { files, to } => {
            select_target(controller, to.as_deref())?;
            for file in controller.upload_files(&files).await? {
                println!("{}", file.path);
            }
        }
        Command::Delete { path } => {
            controller.delete_node(&path).await?;
        }
        Command::Settings { .. } => {}
    }
    Ok(())
}

/// Point uploads and new folders at `folder`, or at the root
fn select_target(controller: &mut Controller, folder: Option<&str>) -> hiking_map_lib::Result<()> {
    match folder {
        Some(key) => {
            if controller.tree().find_folder(key).is_none() {
                return Err(CoreError::NotFound(format!("folder '{}'", key)));
            }
            controller.select(key)
        }
        None => {
            controller.clear_selection();
            Ok(())
        }
    }
}

fn print_notices(notices: Vec<Notice>) {
    for notice in notices {
        match notice {
            Notice::Success(message) => println!("{}", message),
            Notice::Error(message) => eprintln!("Error: {}", message),
        }
    }
}

fn print_tree(tree: &TreeModel, layers: &LayerManager<HeadlessMap>) {
    fn print_nodes(
        nodes: &[FileTreeNode],
        depth: usize,
        tree: &TreeModel,
        layers: &LayerManager<HeadlessMap>,
    ) {
        for node in nodes {
            let mark = if tree.is_checked(node.key()) { "[x]" } else { "[ ]" };
            let indent = "  ".repeat(depth);
            match node {
                FileTreeNode::Folder(folder) => {
                    println!("{indent}{mark} {}/ ({})", folder.name, folder.color);
                    print_nodes(&folder.children, depth + 1, tree, layers);
                }
                FileTreeNode::File(file) => {
                    let visible = if layers.is_visible(&file.path) { "" } else { " (hidden)" };
                    println!("{indent}{mark} {}{visible}", track_display_name(&file.name));
                }
            }
        }
    }

    print_nodes(tree.roots(), 0, tree, layers);
    println!("{}", tree.track_count_label());
}

fn print_layers(layers: &LayerManager<HeadlessMap>) {
    for (path, layer) in layers.map().layers() {
        println!("{} [{}]", path, layer.color());
        for polyline in layer.polylines() {
            if let Some(popup) = &polyline.popup {
                for line in popup.lines() {
                    println!("  {}", line);
                }
            }
        }
    }
    println!("{} track(s) on the map", layers.map().layer_count());
}
