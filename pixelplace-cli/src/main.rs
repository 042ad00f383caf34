//! # pixelplace CLI
//!
//! Command-line interface for the pixelplace canvas engine.

mod app;
mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pixelplace")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "pixelplace.yml")]
    config: PathBuf,

    /// Override storage.data_dir from the configuration
    #[arg(long, env = "PIXELPLACE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new canvas
    Create {
        /// Display name
        name: String,

        /// Width in cells
        #[arg(long)]
        width: i64,

        /// Height in cells
        #[arg(long)]
        height: i64,

        /// Background color (#RGB or #RRGGBB)
        #[arg(long, default_value = "#FFFFFF")]
        background: String,

        /// Creator recorded on the canvas
        #[arg(long, default_value = "cli")]
        created_by: String,

        /// Explicit canvas id (a UUID is assigned otherwise)
        #[arg(long)]
        id: Option<String>,
    },

    /// Paint one cell
    #[command(allow_negative_numbers = true)]
    Place {
        /// Canvas id
        canvas: String,

        /// Column
        x: i64,

        /// Row
        y: i64,

        /// Color (#RGB or #RRGGBB)
        color: String,

        /// User placing the pixel
        #[arg(long, default_value = "cli")]
        user: String,
    },

    /// Show a canvas reconstructed from the event log
    Show {
        /// Canvas id
        canvas: String,

        /// List every painted cell
        #[arg(long)]
        pixels: bool,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Regenerate rasters from the event log
    Render {
        /// Canvas id
        canvas: String,

        /// Scales to render (comma separated; defaults to the configured set)
        #[arg(long, value_delimiter = ',')]
        scale: Vec<u32>,

        /// Draw the cell grid
        #[arg(long)]
        grid: bool,

        /// Also render every tile
        #[arg(long)]
        tiles: bool,
    },

    /// Summarize every canvas in the event log
    Stats {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for command output
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = app::Settings::load(&cli.config, cli.data_dir.as_deref())?;

    match cli.command {
        Commands::Create {
            name,
            width,
            height,
            background,
            created_by,
            id,
        } => {
            let request = commands::CreateRequest {
                name,
                width,
                height,
                background,
                created_by,
                id,
            };
            commands::create_canvas(&settings, request).await
        }
        Commands::Place {
            canvas,
            x,
            y,
            color,
            user,
        } => commands::place_pixel(&settings, &canvas, x, y, &color, &user).await,
        Commands::Show {
            canvas,
            pixels,
            json,
        } => commands::show_canvas(&settings, &canvas, pixels, json),
        Commands::Render {
            canvas,
            scale,
            grid,
            tiles,
        } => commands::render_canvas(&settings, &canvas, &scale, grid, tiles),
        Commands::Stats { json } => commands::show_stats(&settings, json),
    }
}
