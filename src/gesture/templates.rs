//! User-recorded gesture templates and nearest-template matching.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use crate::{
    error::{Error, Result},
    types::{GestureLabel, Landmarks, MIDDLE_MCP, NUM_LANDMARKS, WRIST},
};

type Template = Vec<[f32; 2]>;

#[derive(Debug, Default)]
pub struct TemplateStore {
    templates: BTreeMap<String, Template>,
    path: Option<PathBuf>,
}

impl TemplateStore {
    /// In-memory store; `record` does not persist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the store backed by `path`. A missing file yields an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let templates = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let templates: BTreeMap<String, Template> =
                serde_json::from_str(&content).map_err(|source| Error::TemplateStore {
                    path: path.clone(),
                    source,
                })?;
            for (name, points) in &templates {
                if points.len() != NUM_LANDMARKS {
                    return Err(Error::Template(
                        name.clone(),
                        format!("expected {NUM_LANDMARKS} points, found {}", points.len()),
                    ));
                }
            }
            log::info!(
                "loaded {} custom gestures from {}",
                templates.len(),
                path.display()
            );
            templates
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            templates,
            path: Some(path),
        })
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Stores the normalized pose under `name`, replacing any previous one,
    /// and writes the store back to disk when it has a path.
    pub fn record(&mut self, name: &str, landmarks: &Landmarks) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Template(name.into(), "name must not be empty".into()));
        }
        if !matches!(GestureLabel::from(name), GestureLabel::Custom(_)) {
            return Err(Error::Template(
                name.into(),
                "name collides with a built-in gesture".into(),
            ));
        }

        self.templates.insert(name.to_string(), normalize(landmarks));
        self.persist()?;
        log::info!("recorded custom gesture '{name}'");
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content =
            serde_json::to_string_pretty(&self.templates).map_err(|source| Error::TemplateStore {
                path: path.clone(),
                source,
            })?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Closest template and its mean squared error, when under `threshold`.
    pub fn find_match(&self, landmarks: &Landmarks, threshold: f32) -> Option<(&str, f32)> {
        if self.templates.is_empty() {
            return None;
        }
        let current = normalize(landmarks);

        self.templates
            .iter()
            .map(|(name, template)| (name.as_str(), mean_squared_error(&current, template)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .filter(|(_, error)| *error < threshold)
    }
}

/// Wrist at the origin, scaled by the wrist to middle-MCP distance.
pub fn normalize(landmarks: &Landmarks) -> Template {
    let (wx, wy) = landmarks.point(WRIST);
    let (mx, my) = landmarks.point(MIDDLE_MCP);
    let mut scale = (mx - wx).hypot(my - wy);
    if scale < 1e-6 {
        scale = 1.0;
    }
    landmarks
        .points()
        .iter()
        .map(|&(x, y)| [(x - wx) / scale, (y - wy) / scale])
        .collect()
}

fn mean_squared_error(a: &[[f32; 2]], b: &[[f32; 2]]) -> f32 {
    let sum: f32 = a
        .iter()
        .zip(b)
        .map(|(p, q)| (p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2))
        .sum();
    sum / (2 * a.len().max(1)) as f32
}
