//! The viewpoint registry.
//!
//! Holds every [`ViewSpec`] known to a run: the fixed built-in set first (in
//! canonical order), then custom views in registration order. That combined
//! order is the iteration order used by capture, aggregation and persistence.

use tracing::debug;

use super::spec::{Resolution, ViewSpec};
use crate::error::RegistryError;

/// Names of the built-in views, in canonical order.
///
/// These cameras are mounted by the simulator itself; their data arrives on
/// the per-step observation rather than through a camera factory.
const BUILTIN_VIEW_NAMES: [&str; 5] = [
    "left_shoulder_camera",
    "right_shoulder_camera",
    "overhead_camera",
    "wrist_camera",
    "front_camera",
];

/// Ordered set of built-in and custom viewpoints.
#[derive(Debug, Clone)]
pub struct ViewRegistry {
    builtin: Vec<ViewSpec>,
    custom: Vec<ViewSpec>,
}

impl ViewRegistry {
    /// Create a registry holding only the built-in views, rendered at
    /// `resolution`.
    ///
    /// Built-in poses are owned by the simulator; the view spec keeps a zero pose
    /// and the real extrinsics arrive with each observation.
    pub fn new(resolution: Resolution) -> Self {
        let builtin = BUILTIN_VIEW_NAMES
            .iter()
            .map(|name| ViewSpec::new(*name, [0.0; 3], [0.0; 3]).with_resolution(resolution))
            .collect();
        Self {
            builtin,
            custom: Vec::new(),
        }
    }

    /// Names of the built-in views, in canonical order.
    pub fn builtin_names() -> &'static [&'static str] {
        &BUILTIN_VIEW_NAMES
    }

    /// Register a custom view.
    ///
    /// Fails without modifying the registry if the view spec is invalid or its name
    /// collides with any registered view, built-in or custom.
    pub fn register(&mut self, spec: ViewSpec) -> Result<(), RegistryError> {
        spec.validate()?;
        if self.contains(&spec.name) {
            return Err(RegistryError::DuplicateView { name: spec.name });
        }
        debug!(view = %spec.name, resolution = %spec.resolution, "registered custom view");
        self.custom.push(spec);
        Ok(())
    }

    /// Register several views at once. Either all of them are added or none.
    pub fn register_all(
        &mut self,
        specs: impl IntoIterator<Item = ViewSpec>,
    ) -> Result<(), RegistryError> {
        let mut staged = self.clone();
        for spec in specs {
            staged.register(spec)?;
        }
        *self = staged;
        Ok(())
    }

    /// Every view in canonical order: built-ins, then custom views.
    pub fn all_views(&self) -> impl Iterator<Item = &ViewSpec> {
        self.builtin.iter().chain(self.custom.iter())
    }

    /// View names in canonical order.
    pub fn view_names(&self) -> Vec<&str> {
        self.all_views().map(|v| v.name.as_str()).collect()
    }

    pub fn builtin_views(&self) -> &[ViewSpec] {
        &self.builtin
    }

    pub fn custom_views(&self) -> &[ViewSpec] {
        &self.custom
    }

    pub fn get(&self, name: &str) -> Option<&ViewSpec> {
        self.all_views().find(|v| v.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtin.iter().any(|v| v.name == name)
    }

    pub fn len(&self) -> usize {
        self.builtin.len() + self.custom.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ViewRegistry {
    fn default() -> Self {
        Self::new(Resolution::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom(name: &str) -> ViewSpec {
        ViewSpec::new(name, [0.0, 0.0, 1.2], [0.0, -90.0, 0.0])
    }

    #[test]
    fn builtin_order_is_canonical() {
        let registry = ViewRegistry::default();
        assert_eq!(registry.view_names(), BUILTIN_VIEW_NAMES.to_vec());
        assert!(registry.custom_views().is_empty());
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn custom_views_follow_builtins_in_registration_order() {
        let mut registry = ViewRegistry::default();
        registry.register(custom("top_down_camera")).unwrap();
        registry.register(custom("close_up_camera")).unwrap();

        let names = registry.view_names();
        assert_eq!(names.len(), 7);
        assert_eq!(&names[..5], &BUILTIN_VIEW_NAMES[..]);
        assert_eq!(names[5], "top_down_camera");
        assert_eq!(names[6], "close_up_camera");
        assert!(!registry.is_builtin("top_down_camera"));
        assert!(registry.is_builtin("wrist_camera"));
    }

    #[test]
    fn duplicate_custom_name_is_rejected_and_registry_unchanged() {
        let mut registry = ViewRegistry::default();
        registry.register(custom("top_down_camera")).unwrap();
        let before = registry.view_names().join(",");

        let err = registry.register(custom("top_down_camera")).unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateView {
                name: "top_down_camera".into()
            }
        );
        assert_eq!(registry.view_names().join(","), before);
    }

    #[test]
    fn builtin_name_collision_is_rejected() {
        let mut registry = ViewRegistry::default();
        let err = registry.register(custom("front_camera")).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateView { .. }));
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn register_all_is_atomic() {
        let mut registry = ViewRegistry::default();
        let result = registry.register_all(vec![
            custom("a_camera"),
            custom("b_camera"),
            custom("a_camera"),
        ]);
        assert!(result.is_err());
        assert!(registry.custom_views().is_empty());
    }

    #[test]
    fn builtin_views_use_configured_resolution() {
        let registry = ViewRegistry::new(Resolution::new(128, 128));
        assert!(registry
            .builtin_views()
            .iter()
            .all(|v| v.resolution == Resolution::new(128, 128)));
    }
}
