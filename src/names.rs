//! The name → hidden policy and the table of known applications.

use std::borrow::Cow;
use std::collections::BTreeMap;

/// Better titles and icons for applications whose window names are not very readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownApplication {
    pub name: &'static str,
    pub icon_name: Option<&'static str>,
    pub title: &'static str,
}

pub const KNOWN_APPLICATIONS: &[KnownApplication] = &[
    KnownApplication {
        name: "networkmanager applet",
        icon_name: Some("network-workgroup"),
        title: "Network Manager Applet",
    },
    KnownApplication {
        name: "thunar",
        icon_name: Some("Thunar"),
        title: "Thunar Progress Dialog",
    },
    KnownApplication {
        name: "workrave",
        icon_name: None,
        title: "Workrave",
    },
    KnownApplication {
        name: "workrave tray icon",
        icon_name: None,
        title: "Workrave Applet",
    },
    KnownApplication {
        name: "audacious2",
        icon_name: Some("audacious"),
        title: "Audacious",
    },
    KnownApplication {
        name: "wicd-client.py",
        icon_name: Some("wicd-gtk"),
        title: "Wicd",
    },
    KnownApplication {
        name: "xfce4-power-manager",
        icon_name: Some("xfpm-ac-adapter"),
        title: "Xfce Power Manager",
    },
];

pub fn known_application(name: &str) -> Option<&'static KnownApplication> {
    KNOWN_APPLICATIONS.iter().find(|app| app.name == name)
}

/// Human readable title for an application name.
pub fn display_title(name: &str) -> Cow<'static, str> {
    match known_application(name) {
        Some(app) => Cow::Borrowed(app.title),
        None => Cow::Owned(camel_case(name)),
    }
}

/// Icon name to show next to an application, the name itself if nothing better is known.
pub fn icon_name(name: &str) -> Option<Cow<'_, str>> {
    match known_application(name) {
        Some(app) => app.icon_name.map(Cow::Borrowed),
        None => Some(Cow::Borrowed(name)),
    }
}

/// Upper-cases the first letter of every word and lower-cases the rest.
pub fn camel_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut upper = true;

    for c in text.chars() {
        if c.is_whitespace() {
            upper = true;
            result.push(c);
        } else if upper {
            result.extend(c.to_uppercase());
            upper = false;
        } else {
            result.extend(c.to_lowercase());
        }
    }

    result
}

/// Which application names are hidden.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NamePolicy {
    names: BTreeMap<String, bool>,
}

impl NamePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        self.names.get(name).copied()
    }

    /// Returns whether `name` is hidden, recording it as visible if it was not known.
    ///
    /// The second value is `true` when the name got recorded.
    pub fn lookup_or_insert(&mut self, name: &str) -> (bool, bool) {
        match self.names.get(name) {
            Some(hidden) => (*hidden, false),
            None => {
                self.names.insert(name.to_owned(), false);
                (false, true)
            }
        }
    }

    pub fn set_hidden(&mut self, name: &str, hidden: bool) {
        self.names.insert(name.to_owned(), hidden);
    }

    /// Replaces every name with the given hidden state.
    ///
    /// Names listed here that were recorded with the other state move over.
    pub fn replace<I, S>(&mut self, hidden: bool, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.retain(|_, h| *h != hidden);
        for name in names {
            let name = name.into();
            if name.is_empty() {
                continue;
            }
            self.names.insert(name, hidden);
        }
    }

    pub fn names(&self, hidden: bool) -> Vec<String> {
        self.names
            .iter()
            .filter(|(_, h)| **h == hidden)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn visible_names(&self) -> Vec<String> {
        self.names(false)
    }

    pub fn hidden_names(&self) -> Vec<String> {
        self.names(true)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> + '_ {
        self.names.iter().map(|(name, hidden)| (name.as_str(), *hidden))
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
