use std::path::PathBuf;
use std::{env, process};

use clap::Parser;
use configory::{Manager as ConfigManager, Options as ConfigOptions};
use sldstyle::attributes::AttrDictionary;
use sldstyle::config::{Config, ConfigEventHandler};
use sldstyle::tiles::{MAX_ZOOM, TileIndex};
use sldstyle::{Error, StyleSet};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Print the styles an SLD document applies to a feature.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path of the SLD document.
    sld: PathBuf,

    /// Layer the feature belongs to.
    #[arg(long, default_value = "")]
    layer: String,

    /// Tile zoom level used to derive the scale denominator.
    #[arg(
        long,
        conflicts_with = "scale",
        value_parser = clap::value_parser!(u8).range(..=MAX_ZOOM as i64),
    )]
    zoom: Option<u8>,

    /// Map scale denominator.
    #[arg(long)]
    scale: Option<f64>,

    /// Feature attributes as JSON object, like '{"class": "motorway"}'.
    #[arg(long, default_value = "{}")]
    attrs: String,
}

fn main() {
    // Setup logging.
    let directives = env::var("RUST_LOG").unwrap_or("warn,sldstyle=info".into());
    let env_filter = EnvFilter::builder().parse_lossy(directives);
    FmtSubscriber::builder().with_env_filter(env_filter).with_line_number(true).init();

    let args = Args::parse();

    if let Err(err) = run(args) {
        error!("[CRITICAL] {err}");
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Error> {
    let config_options = ConfigOptions::new("sldstyle");
    let config_manager = ConfigManager::with_options(&config_options, ConfigEventHandler)?;
    let config = config_manager
        .get::<&str, Config>(&[])
        .inspect_err(|err| error!("Config error: {err}"))
        .ok()
        .flatten()
        .unwrap_or_default();

    let attrs: AttrDictionary = serde_json::from_str(&args.attrs)?;
    let style_set = StyleSet::from_path(&args.sld, &config)?;

    let styles = match (args.zoom, args.scale) {
        (_, Some(scale)) => style_set.styles_for_feature_at_scale(&attrs, scale, &args.layer),
        (Some(zoom), None) => {
            let tile = TileIndex::new(0, 0, zoom);
            if !style_set.layer_should_display(&args.layer, tile) {
                info!("Layer {:?} is hidden at zoom level {zoom}", args.layer);
            }
            style_set.styles_for_feature(&attrs, tile, &args.layer)
        },
        // Default to the most detailed scale.
        (None, None) => style_set.styles_for_feature_at_scale(&attrs, 0., &args.layer),
    };

    info!("{} of {} styles match", styles.len(), style_set.styles().count());

    for style in styles {
        println!("{style}");
    }

    Ok(())
}
