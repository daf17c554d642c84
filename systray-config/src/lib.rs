//! Configuration for the notification area.
//!
//! The persisted state is a single `tray` node in a KDL document. The name → hidden policy is
//! stored as two flat lists so that it round-trips without any other on-disk format.

#[macro_use]
extern crate tracing;

use std::ffi::OsStr;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use miette::{Context, IntoDiagnostic};

/// Smallest accepted maximum icon size.
pub const SIZE_MAX_MIN: u16 = 12;
/// Largest accepted maximum icon size.
pub const SIZE_MAX_MAX: u16 = 64;
/// Maximum icon size used when the config does not set one.
pub const SIZE_MAX_DEFAULT: u16 = 22;

#[derive(knuffel::Decode, Debug, Default, Clone, PartialEq, Eq)]
pub struct Config {
    #[knuffel(child, default)]
    pub tray: Tray,
}

#[derive(knuffel::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Tray {
    #[knuffel(child, unwrap(argument), default = SIZE_MAX_DEFAULT)]
    pub size_max: u16,
    #[knuffel(child, unwrap(argument), default = true)]
    pub show_hidden: bool,
    #[knuffel(child, default)]
    pub names_visible: NameList,
    #[knuffel(child, default)]
    pub names_hidden: NameList,
}

impl Default for Tray {
    fn default() -> Self {
        Self {
            size_max: SIZE_MAX_DEFAULT,
            show_hidden: true,
            names_visible: NameList::default(),
            names_hidden: NameList::default(),
        }
    }
}

/// A list of application names as stored in the config.
#[derive(knuffel::Decode, Debug, Default, Clone, PartialEq, Eq)]
pub struct NameList {
    #[knuffel(arguments)]
    pub names: Vec<String>,
}

impl NameList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Tray {
    /// Returns `size_max` clamped into the accepted range.
    pub fn size_max_clamped(&self) -> u16 {
        self.size_max.clamp(SIZE_MAX_MIN, SIZE_MAX_MAX)
    }
}

impl Config {
    pub fn load(path: &Path) -> miette::Result<Self> {
        let contents = fs::read_to_string(path)
            .into_diagnostic()
            .with_context(|| format!("error reading {path:?}"))?;

        let config = Self::parse(
            path.file_name()
                .and_then(OsStr::to_str)
                .unwrap_or("config.kdl"),
            &contents,
        )
        .context("error parsing")?;
        debug!("loaded config from {path:?}");

        if config.tray.size_max != config.tray.size_max_clamped() {
            warn!(
                "size-max {} is outside {SIZE_MAX_MIN}..={SIZE_MAX_MAX}, it will be clamped",
                config.tray.size_max
            );
        }

        Ok(config)
    }

    pub fn parse(filename: &str, text: &str) -> Result<Self, knuffel::Error> {
        knuffel::parse(filename, text)
    }

    /// Serializes the config back into KDL.
    pub fn to_kdl(&self) -> String {
        let tray = &self.tray;
        let mut out = String::from("tray {\n");
        let _ = writeln!(out, "    size-max {}", tray.size_max);
        let _ = writeln!(out, "    show-hidden {}", tray.show_hidden);
        write_name_list(&mut out, "names-visible", &tray.names_visible);
        write_name_list(&mut out, "names-hidden", &tray.names_hidden);
        out.push_str("}\n");
        out
    }
}

fn write_name_list(out: &mut String, node: &str, list: &NameList) {
    if list.is_empty() {
        return;
    }

    out.push_str("    ");
    out.push_str(node);
    for name in &list.names {
        out.push(' ');
        write_kdl_string(out, name);
    }
    out.push('\n');
}

fn write_kdl_string(out: &mut String, value: &str) {
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    use super::*;

    #[track_caller]
    fn do_parse(text: &str) -> Config {
        Config::parse("test.kdl", text)
            .map_err(miette::Report::new)
            .unwrap()
    }

    #[test]
    fn parse_empty_gives_defaults() {
        let config = do_parse("");
        assert_eq!(config, Config::default());
        assert_eq!(config.tray.size_max, SIZE_MAX_DEFAULT);
        assert!(config.tray.show_hidden);
    }

    #[test]
    fn parse_full_tray() {
        let config = do_parse(
            r#"
            tray {
                size-max 32
                show-hidden false
                names-visible "thunar" "workrave"
                names-hidden "networkmanager applet"
            }
            "#,
        );

        assert_eq!(
            config.tray,
            Tray {
                size_max: 32,
                show_hidden: false,
                names_visible: NameList::new(["thunar", "workrave"]),
                names_hidden: NameList::new(["networkmanager applet"]),
            }
        );
    }

    #[test]
    fn parse_rejects_unknown_node() {
        assert!(Config::parse("test.kdl", "tray { frobnicate 1 }").is_err());
    }

    #[test]
    fn size_max_is_clamped() {
        let tray = Tray {
            size_max: 200,
            ..Tray::default()
        };
        assert_eq!(tray.size_max_clamped(), SIZE_MAX_MAX);

        let tray = Tray {
            size_max: 1,
            ..Tray::default()
        };
        assert_eq!(tray.size_max_clamped(), SIZE_MAX_MIN);
    }

    #[test]
    fn to_kdl_output() {
        let config = Config {
            tray: Tray {
                size_max: 24,
                show_hidden: false,
                names_visible: NameList::new(["thunar", "say \"hi\""]),
                names_hidden: NameList::default(),
            },
        };

        assert_snapshot!(config.to_kdl(), @r#"
        tray {
            size-max 24
            show-hidden false
            names-visible "thunar" "say \"hi\""
        }
        "#);
    }

    #[test]
    fn to_kdl_parses_back() {
        let config = Config {
            tray: Tray {
                size_max: 40,
                show_hidden: true,
                names_visible: NameList::new(["a", "b"]),
                names_hidden: NameList::new(["c\\d"]),
            },
        };

        assert_eq!(do_parse(&config.to_kdl()), config);
    }
}
