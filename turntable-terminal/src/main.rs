/// Turntable Terminal Viewer
///
/// Usage: turntable-terminal [--config <file.toml>] [MODEL]
///
/// Shows a glTF, GLB or STL model as ASCII art. Without a model a cube is
/// shown. Controls:
///   - Left mouse drag: Rotate the model
///   - Q/ESC: Quit
use std::io;
use std::path::PathBuf;
use turntable_core::loader::load_model_file;
use turntable_core::{LoadedAsset, Mesh, Model, Primitive, ViewerConfig};
use turntable_terminal::TerminalApp;

const USAGE: &str = "usage: turntable-terminal [--config <file.toml>] [MODEL]";

fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        println!("{USAGE}");
        return Ok(());
    }
    let config_path: Option<PathBuf> = args
        .opt_value_from_str("--config")
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("{e}\n{USAGE}")))?;
    let model_path: Option<PathBuf> = args
        .opt_free_from_str()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("{e}\n{USAGE}")))?;

    let config = match config_path {
        Some(path) => ViewerConfig::load_from_path(&path).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to read config {}: {e}", path.display()),
            )
        })?,
        None => ViewerConfig::default(),
    };

    let asset = match model_path {
        Some(path) => load_model_file(&path).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to load {}: {e}", path.display()),
            )
        })?,
        None => {
            log::info!("no model given, showing a cube");
            LoadedAsset::new(Model::from_mesh(
                Mesh::new("cube").with_primitive(Primitive::cube(2.0)),
            ))
        }
    };

    let mut app = TerminalApp::new(config, asset)?;
    app.run()
}
