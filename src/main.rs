#[macro_use]
extern crate tracing;

use std::env;
use std::process::ExitCode;

use clap::Parser;
use systray::cli::{self, Cli, Sub};
use systray::layout::Orientation;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let directives = env::var("RUST_LOG").unwrap_or_else(|_| "systray=debug".to_owned());
    let env_filter = EnvFilter::builder().parse_lossy(directives);
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli::load_config(cli.config.as_deref())?;

    match cli.subcommand {
        Sub::Validate => {
            info!("config is valid");

            let tray = cli::preview_container(&config);
            println!("size-max: {}", tray.max_cell_size());
            println!("show-hidden: {}", tray.show_hidden());
            for app in tray.applications() {
                let state = if app.hidden { "hidden" } else { "visible" };
                let icon = app.icon_name.as_deref().unwrap_or("-");
                println!("{} ({state}, icon {icon}): {}", app.name, app.title);
            }
        }
        Sub::Preview {
            extent,
            size_max,
            vertical,
            json,
            icons,
        } => {
            let orientation = if vertical {
                Orientation::Vertical
            } else {
                Orientation::Horizontal
            };
            let output = cli::preview(&config, &icons, extent, size_max, orientation);

            if json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print!("{}", cli::format_preview(&output));
            }
        }
        #[cfg(feature = "x11")]
        Sub::Probe { window } => probe(cli::parse_window_id(&window)?)?,
    }

    Ok(())
}

#[cfg(feature = "x11")]
fn probe(window: systray::icon::WindowId) -> anyhow::Result<()> {
    use systray::backend::x11::X11Display;
    use systray::icon::IconHandle;
    use systray::names;

    let display = X11Display::connect()?;
    let icon = IconHandle::embed(&display, window)?;

    let name = icon.resolve_name(&display);
    println!("window: {window}");
    println!("composited: {}", icon.is_composited());
    match name {
        Some(name) => {
            println!("name: {name}");
            println!("title: {}", names::display_title(name));
        }
        None => println!("name: <none>"),
    }

    icon.unembed();
    Ok(())
}
