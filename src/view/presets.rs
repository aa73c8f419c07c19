//! Ready-made sets of custom viewpoints.

use serde::{Deserialize, Serialize};

use super::spec::{Resolution, ViewSpec};

/// Named bundles of extra viewpoints that augment the built-in cameras.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewPreset {
    /// Two side views, a top-down view and a close-up of the workspace.
    Peract,
    /// The PerAct-style set plus a diagonal and a rear view.
    Enhanced,
}

impl ViewPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Peract => "peract",
            Self::Enhanced => "enhanced",
        }
    }

    /// Parse from a string (case-insensitive).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "peract" | "peract_style" => Some(Self::Peract),
            "enhanced" => Some(Self::Enhanced),
            _ => None,
        }
    }

    /// The views in this preset, all rendered at `resolution`.
    pub fn views(&self, resolution: Resolution) -> Vec<ViewSpec> {
        let raw: &[(&str, [f64; 3], [f64; 3])] = match self {
            Self::Peract => &[
                ("side_left_camera", [0.5, 0.8, 0.3], [0.0, -30.0, 90.0]),
                ("side_right_camera", [-0.5, 0.8, 0.3], [0.0, -30.0, -90.0]),
                ("top_down_camera", [0.0, 0.0, 1.2], [0.0, -90.0, 0.0]),
                ("close_up_camera", [0.0, 0.3, 0.1], [0.0, 0.0, 0.0]),
            ],
            Self::Enhanced => &[
                ("side_left_camera", [0.6, 0.8, 0.4], [0.0, -20.0, 90.0]),
                ("side_right_camera", [-0.6, 0.8, 0.4], [0.0, -20.0, -90.0]),
                ("top_down_camera", [0.0, 0.0, 1.5], [0.0, -90.0, 0.0]),
                ("close_up_camera", [0.0, 0.4, 0.1], [0.0, 0.0, 0.0]),
                ("diagonal_camera", [0.3, 0.6, 0.5], [0.0, -30.0, 45.0]),
                ("back_camera", [0.0, -0.8, 0.4], [0.0, -20.0, 180.0]),
            ],
        };
        raw.iter()
            .map(|(name, position, orientation)| {
                ViewSpec::new(*name, *position, *orientation).with_resolution(resolution)
            })
            .collect()
    }
}

impl std::fmt::Display for ViewPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::ViewRegistry;

    #[test]
    fn presets_register_cleanly() {
        for preset in [ViewPreset::Peract, ViewPreset::Enhanced] {
            let mut registry = ViewRegistry::default();
            registry
                .register_all(preset.views(Resolution::default()))
                .unwrap();
            assert_eq!(registry.custom_views().len(), preset.views(Resolution::default()).len());
        }
    }

    #[test]
    fn parses_loosely() {
        assert_eq!(ViewPreset::from_str_loose("PerAct"), Some(ViewPreset::Peract));
        assert_eq!(ViewPreset::from_str_loose("enhanced"), Some(ViewPreset::Enhanced));
        assert_eq!(ViewPreset::from_str_loose("fisheye"), None);
    }
}
