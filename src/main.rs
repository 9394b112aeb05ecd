//! cellview CLI
//!
//! Usage:
//!   cellview [OPTIONS] [SCENE]
//!
//! Options:
//!   -s, --stylesheet <FILE>  Stylesheet with default and named styles (TOML)
//!   -t, --stencils <FILE>    Stencil library (XML), may be repeated
//!   -c, --config <FILE>      Layout configuration (TOML)
//!   --scale <N>              Override the view scale
//!   --log-level <LEVEL>      error, warn, info, debug or trace
//!   -h, --help               Print help

use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use clap::Parser;
use log::{debug, LevelFilter};

use cellview::layout::LayoutConfig;
use cellview::stencil::DescriptorError;
use cellview::{render_with_config, RenderConfig, RenderError, StencilRegistry, Stylesheet};

#[derive(Parser)]
#[command(name = "cellview")]
#[command(about = "Lay out a diagram scene and render it to SVG")]
struct Cli {
    /// Scene file (reads from stdin if not provided)
    input: Option<PathBuf>,

    /// Stylesheet file (TOML format)
    #[arg(short, long)]
    stylesheet: Option<PathBuf>,

    /// Stencil library file (XML format)
    #[arg(short = 't', long = "stencils")]
    stencils: Vec<PathBuf>,

    /// Layout configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// View scale, overriding the configuration file
    #[arg(long)]
    scale: Option<f64>,

    /// Log verbosity
    #[arg(long, default_value = "warn")]
    log_level: LevelFilter,
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(cli.log_level)
        .init();

    if cli.input.is_none() && io::stdin().is_terminal() {
        eprintln!("Usage: cellview [OPTIONS] [SCENE]  (see --help)");
        std::process::exit(2);
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err((path, source, e)) => {
            eprintln!("Error loading '{}':", path.display());
            eprintln!("{}", e.format(&source, &path.display().to_string()));
            std::process::exit(1);
        }
    };

    // Read input
    let scene = match &cli.input {
        Some(path) => match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("Error reading file '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => {
            let mut buffer = String::new();
            match io::stdin().read_to_string(&mut buffer) {
                Ok(_) => buffer,
                Err(e) => {
                    eprintln!("Error reading from stdin: {}", e);
                    std::process::exit(1);
                }
            }
        }
    };

    match render_with_config(&scene, config) {
        Ok(svg) => {
            println!("{}", svg);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// A load failure with the file and text it came from
type LoadFailure = (PathBuf, String, RenderError);

fn load_config(cli: &Cli) -> Result<RenderConfig, LoadFailure> {
    let mut config = RenderConfig::new();

    if let Some(path) = &cli.stylesheet {
        let stylesheet = Stylesheet::from_file(path).map_err(|e| failure(path, "", e))?;
        config = config.with_stylesheet(stylesheet);
    }

    let mut layout = match &cli.config {
        Some(path) => LayoutConfig::from_file(path).map_err(|e| failure(path, "", e))?,
        None => LayoutConfig::default(),
    };
    if let Some(scale) = cli.scale {
        layout = layout.with_scale(scale);
    }
    config = config.with_layout(layout);

    let mut stencils = StencilRegistry::new();
    for path in &cli.stencils {
        let xml = fs::read_to_string(path)
            .map_err(|e| failure(path, "", DescriptorError::from(e)))?;
        let count = stencils
            .load_library(&xml)
            .map_err(|e| failure(path, &xml, e))?;
        debug!(path:% = path.display(), count; "loaded stencils");
    }
    Ok(config.with_stencils(stencils))
}

fn failure(path: &Path, source: &str, err: impl Into<RenderError>) -> LoadFailure {
    (path.to_path_buf(), source.to_string(), err.into())
}
