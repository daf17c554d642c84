use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use serde::Serialize;
use smithay::utils::{Logical, Rectangle, Size};
use systray_config::Config;

use crate::icon::{ForeignDisplay, ForeignWindowProbeError, NameProperty, VisualInfo, WindowId};
use crate::layout::{is_degenerate, Orientation};
use crate::manager::{RegistrationError, TrayManager};
use crate::tray::TrayContainer;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
#[command(subcommand_value_name = "SUBCOMMAND")]
#[command(subcommand_help_heading = "Subcommands")]
pub struct Cli {
    /// Path to config file (default: `$XDG_CONFIG_HOME/systray/config.kdl`).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub subcommand: Sub,
}

#[derive(Subcommand)]
pub enum Sub {
    /// Validate the config file and list the configured applications.
    Validate,
    /// Lay out made-up icons with the configured settings and print where they end up.
    Preview {
        /// Extent across the icon flow, like the height of a horizontal panel.
        #[arg(long, default_value_t = 24)]
        extent: i32,
        /// Override the configured maximum icon size.
        #[arg(long)]
        size_max: Option<i32>,
        /// Lay the icons out top to bottom.
        #[arg(long)]
        vertical: bool,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
        /// Icons as `name=WIDTHxHEIGHT`.
        #[arg(required = true)]
        icons: Vec<IconSpec>,
    },
    /// Embed a live window and print what the tray sees of it.
    #[cfg(feature = "x11")]
    Probe {
        /// Window id, decimal or `0x` hex.
        window: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconSpec {
    pub name: String,
    pub size: Size<i32, Logical>,
}

impl FromStr for IconSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, size) = s
            .rsplit_once('=')
            .ok_or_else(|| anyhow!("expected name=WIDTHxHEIGHT, got {s:?}"))?;
        let (w, h) = size
            .split_once('x')
            .ok_or_else(|| anyhow!("expected WIDTHxHEIGHT, got {size:?}"))?;

        let w: i32 = w.parse().context("error parsing width")?;
        let h: i32 = h.parse().context("error parsing height")?;
        if w < 0 || h < 0 {
            bail!("icon size must not be negative");
        }

        Ok(Self {
            name: name.to_owned(),
            size: Size::from((w, h)),
        })
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    let dirs = ProjectDirs::from("", "", "systray")?;
    Some(dirs.config_dir().join("config.kdl"))
}

/// Loads the config at `path`, or the default one. A missing default config is not an error.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let (path, explicit) = match path {
        Some(path) => (path.to_owned(), true),
        None => match default_config_path() {
            Some(path) => (path, false),
            None => {
                debug!("no config directory, using the default config");
                return Ok(Config::default());
            }
        },
    };

    if !explicit && !path.exists() {
        debug!("{path:?} does not exist, using the default config");
        return Ok(Config::default());
    }

    Config::load(&path).map_err(|err| anyhow!("{err:?}"))
}

/// Windows made up for the preview.
#[derive(Debug, Default)]
pub struct PreviewDisplay {
    names: HashMap<WindowId, String>,
}

impl PreviewDisplay {
    pub fn add(&mut self, window: WindowId, name: &str) {
        self.names.insert(window, name.to_owned());
    }
}

impl ForeignDisplay for PreviewDisplay {
    fn probe_visual(&self, window: WindowId) -> Result<VisualInfo, ForeignWindowProbeError> {
        if self.names.contains_key(&window) {
            Ok(VisualInfo::opaque(24))
        } else {
            Err(ForeignWindowProbeError::WindowGone(window))
        }
    }

    fn supports_composite(&self) -> bool {
        false
    }

    fn text_property(&self, window: WindowId, property: NameProperty) -> Option<String> {
        match property {
            NameProperty::NetWmName => self.names.get(&window).cloned(),
            NameProperty::WmName => None,
        }
    }

    fn invalidate(&mut self, _area: Rectangle<i32, Logical>) {}

    fn send_expose(&mut self, _window: WindowId, _size: Size<i32, Logical>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// The preview never claims the tray selection.
struct PreviewManager;

impl TrayManager for PreviewManager {
    fn register(&mut self, _screen: usize) -> Result<(), RegistrationError> {
        Err(RegistrationError::Other(anyhow!(
            "the preview does not manage a real tray"
        )))
    }

    fn unregister(&mut self) {}

    fn set_orientation(&mut self, _orientation: Orientation) {}
}

pub fn preview_container(config: &Config) -> TrayContainer<PreviewDisplay> {
    let mut tray = TrayContainer::new(PreviewDisplay::default(), || {
        Box::new(PreviewManager) as Box<dyn TrayManager>
    });
    tray.apply_config(&config.tray);
    tray
}

#[derive(Debug, Serialize)]
pub struct PreviewOutput {
    pub requisition: [i32; 2],
    pub has_hidden: bool,
    pub icons: Vec<PreviewIcon>,
}

#[derive(Debug, Serialize)]
pub struct PreviewIcon {
    pub name: String,
    pub hidden: bool,
    pub on_canvas: bool,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

pub fn preview(
    config: &Config,
    icons: &[IconSpec],
    extent: i32,
    size_max: Option<i32>,
    orientation: Orientation,
) -> PreviewOutput {
    let mut tray = preview_container(config);
    if let Some(size_max) = size_max {
        tray.set_max_cell_size(size_max);
    }
    tray.set_orientation(orientation);
    tray.set_allocated_extent(extent);

    for (idx, spec) in icons.iter().enumerate() {
        let window = WindowId(u32::try_from(idx + 1).unwrap_or(u32::MAX));
        tray.display_mut().add(window, &spec.name);
        if let Some(key) = tray.embed_window(window) {
            tray.set_icon_requisition(key, spec.size);
        }
    }

    let requisition = tray.requisition();
    let packing = match orientation {
        Orientation::Horizontal => requisition.w,
        Orientation::Vertical => requisition.h,
    };
    tray.size_allocate(Rectangle::from_size(orientation.size(packing, extent)));

    let icons = tray
        .icons()
        .map(|(_, icon)| {
            let rect = icon.allocation();
            PreviewIcon {
                name: icon.name().unwrap_or_default().to_owned(),
                hidden: icon.is_hidden(),
                on_canvas: !is_degenerate(icon.requisition()) && rect.loc.x >= 0 && rect.loc.y >= 0,
                x: rect.loc.x,
                y: rect.loc.y,
                width: rect.size.w,
                height: rect.size.h,
            }
        })
        .collect();

    PreviewOutput {
        requisition: [requisition.w, requisition.h],
        has_hidden: tray.has_hidden(),
        icons,
    }
}

pub fn format_preview(output: &PreviewOutput) -> String {
    let mut text = format!(
        "requisition: {}x{}\n",
        output.requisition[0], output.requisition[1]
    );
    for icon in &output.icons {
        let hidden = if icon.hidden { " (hidden)" } else { "" };
        if icon.on_canvas {
            text += &format!(
                "{}{hidden}: {},{} {}x{}\n",
                icon.name, icon.x, icon.y, icon.width, icon.height
            );
        } else {
            text += &format!("{}{hidden}: not shown\n", icon.name);
        }
    }
    text
}

pub fn parse_window_id(s: &str) -> anyhow::Result<WindowId> {
    let id = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    }
    .with_context(|| format!("invalid window id {s:?}"))?;
    Ok(WindowId(id))
}
