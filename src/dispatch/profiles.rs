//! Profile tables and foreground-window profile selection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::GestureLabel;

pub const DEFAULT_PROFILE: &str = "DEFAULT";

type Mapping = BTreeMap<String, Vec<String>>;

/// Profile name to {gesture label to key chord}.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileTable(BTreeMap<String, Mapping>);

impl ProfileTable {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn builtin() -> Self {
        fn chord(keys: &[&str]) -> Vec<String> {
            keys.iter().map(|k| k.to_string()).collect()
        }
        fn profile(entries: &[(GestureLabel, &[&str])]) -> Mapping {
            entries
                .iter()
                .map(|(label, keys)| (label.as_str().to_string(), chord(keys)))
                .collect()
        }

        let mut table = Self::new();
        table.insert(
            DEFAULT_PROFILE,
            profile(&[
                (GestureLabel::SwipeRight, &["right"]),
                (GestureLabel::SwipeLeft, &["left"]),
            ]),
        );
        table.insert(
            "POWERPOINT",
            profile(&[
                (GestureLabel::ThumbsUp, &["right"]),
                (GestureLabel::ThumbsDown, &["left"]),
                (GestureLabel::VSign, &["b"]),
                (GestureLabel::OkSign, &["home"]),
                (GestureLabel::Spiderman, &["end"]),
                (GestureLabel::SwipeRight, &["right"]),
                (GestureLabel::SwipeLeft, &["left"]),
            ]),
        );
        table.insert(
            "CHROME",
            profile(&[
                (GestureLabel::ThumbsUp, &["ctrl", "tab"]),
                (GestureLabel::ThumbsDown, &["ctrl", "shift", "tab"]),
                (GestureLabel::SwipeRight, &["alt", "right"]),
                (GestureLabel::SwipeLeft, &["alt", "left"]),
                (GestureLabel::OpenPalm, &["f5"]),
                (GestureLabel::OkSign, &["ctrl", "t"]),
            ]),
        );
        table
    }

    pub fn insert(&mut self, name: impl Into<String>, mapping: BTreeMap<String, Vec<String>>) {
        self.0.insert(name.into(), mapping);
    }

    /// Binds one label inside `profile`, creating the profile if needed.
    pub fn bind(&mut self, profile: &str, label: &GestureLabel, keys: Vec<String>) {
        self.0
            .entry(profile.to_string())
            .or_default()
            .insert(label.as_str().to_string(), keys);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Named profile's mapping, falling back to `DEFAULT` when the name is unknown.
    pub fn get(&self, name: &str) -> Option<&BTreeMap<String, Vec<String>>> {
        self.0.get(name).or_else(|| self.0.get(DEFAULT_PROFILE))
    }

    pub fn keys_for(&self, profile: &str, label: &GestureLabel) -> Option<&[String]> {
        self.get(profile)?
            .get(label.as_str())
            .map(Vec::as_slice)
            .filter(|keys| !keys.is_empty())
    }
}

impl Default for ProfileTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Foreground window description supplied by the host platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowInfo {
    pub title: String,
    pub process: String,
    pub class: String,
}

impl WindowInfo {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Every present criterion must hold. Title is a case-insensitive substring,
/// process a case-insensitive exact match, class an exact match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppRule {
    pub profile: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
}

impl AppRule {
    fn new(profile: &str) -> Self {
        Self {
            profile: profile.to_string(),
            title: None,
            process: None,
            class: None,
        }
    }

    fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    fn process(mut self, process: &str) -> Self {
        self.process = Some(process.to_string());
        self
    }

    fn class(mut self, class: &str) -> Self {
        self.class = Some(class.to_string());
        self
    }

    /// A rule without any criterion never matches.
    pub fn matches(&self, window: &WindowInfo) -> bool {
        if self.title.is_none() && self.process.is_none() && self.class.is_none() {
            return false;
        }
        let title_ok = self.title.as_ref().is_none_or(|part| {
            window
                .title
                .to_lowercase()
                .contains(&part.to_lowercase())
        });
        let process_ok = self
            .process
            .as_ref()
            .is_none_or(|process| process.eq_ignore_ascii_case(&window.process));
        let class_ok = self.class.as_ref().is_none_or(|class| *class == window.class);
        title_ok && process_ok && class_ok
    }
}

pub fn default_app_rules() -> Vec<AppRule> {
    vec![
        AppRule::new("POWERPOINT")
            .process("POWERPNT.EXE")
            .class("screenClass"),
        AppRule::new("POWERPOINT").process("POWERPNT.EXE").class("OpusApp"),
        AppRule::new("POWERPOINT").title("PowerPoint"),
        AppRule::new("POWERPOINT").title("Google Slides"),
        AppRule::new("CHROME").process("chrome.exe"),
        AppRule::new("CHROME").process("msedge.exe"),
        AppRule::new("CHROME").title("Chrome"),
        AppRule::new("CHROME").title("Edge"),
    ]
}

/// Ordered rules; the first match names the profile.
#[derive(Debug, Clone)]
pub struct ProfileSelector {
    rules: Vec<AppRule>,
}

impl ProfileSelector {
    pub fn new(rules: Vec<AppRule>) -> Self {
        Self { rules }
    }

    pub fn select(&self, window: &WindowInfo) -> &str {
        self.rules
            .iter()
            .find(|rule| rule.matches(window))
            .map_or(DEFAULT_PROFILE, |rule| rule.profile.as_str())
    }
}

impl Default for ProfileSelector {
    fn default() -> Self {
        Self::new(default_app_rules())
    }
}
