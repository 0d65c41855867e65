//! Configuration types for the Trellis controller.
//!
//! This module provides configuration structures that control the viewport,
//! the built-in layout engines and event dispatch. All types implement
//! [`serde::Deserialize`] and every field has a default, so a partial
//! configuration file only needs to name what it overrides.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration combining every section.
//! - [`ViewportConfig`] - Initial viewport size, scale extent and fit padding.
//! - [`LayoutConfig`] - Default layout type and engine parameters.
//! - [`EventsConfig`] - Listener dispatch policy and change notifications.
//!
//! # Example
//!
//! ```
//! # use trellis::config::{AppConfig, DispatchPolicy, ScaleExtent};
//! let config = AppConfig::default();
//! assert_eq!(config.viewport().scale_extent(), ScaleExtent::UNBOUNDED);
//! assert_eq!(config.events().dispatch(), DispatchPolicy::FailFast);
//! ```

use serde::Deserialize;

use trellis_core::geometry::Size;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Viewport configuration section.
    #[serde(default)]
    viewport: ViewportConfig,

    /// Layout configuration section.
    #[serde(default)]
    layout: LayoutConfig,

    /// Event configuration section.
    #[serde(default)]
    events: EventsConfig,
}

impl AppConfig {
    /// Creates a new [`AppConfig`] from its sections.
    ///
    /// # Arguments
    ///
    /// * `viewport` - Viewport size and zoom limits.
    /// * `layout` - Layout engine settings.
    /// * `events` - Event dispatch settings.
    pub fn new(viewport: ViewportConfig, layout: LayoutConfig, events: EventsConfig) -> Self {
        Self {
            viewport,
            layout,
            events,
        }
    }

    /// Returns the viewport configuration.
    pub fn viewport(&self) -> &ViewportConfig {
        &self.viewport
    }

    /// Returns the layout configuration.
    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Returns the event configuration.
    pub fn events(&self) -> &EventsConfig {
        &self.events
    }

    /// Replaces the viewport section.
    pub fn with_viewport(mut self, viewport: ViewportConfig) -> Self {
        self.viewport = viewport;
        self
    }

    /// Replaces the layout section.
    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    /// Replaces the event section.
    pub fn with_events(mut self, events: EventsConfig) -> Self {
        self.events = events;
        self
    }
}

/// Viewport settings applied to a freshly created graph.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    width: f32,
    height: f32,
    min_scale: Option<f32>,
    max_scale: Option<f32>,
    fit_padding: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            min_scale: None,
            max_scale: None,
            fit_padding: 40.0,
        }
    }
}

impl ViewportConfig {
    /// Returns the initial viewport size.
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Returns the scale range `scale_by` and `fit` stay within.
    ///
    /// Unbounded unless `min_scale` or `max_scale` is set.
    pub fn scale_extent(&self) -> ScaleExtent {
        ScaleExtent::new(
            self.min_scale.unwrap_or(ScaleExtent::UNBOUNDED.min),
            self.max_scale.unwrap_or(ScaleExtent::UNBOUNDED.max),
        )
    }

    /// Limits the scale to `[min, max]`.
    pub fn with_scale_extent(mut self, min: f32, max: f32) -> Self {
        self.min_scale = Some(min);
        self.max_scale = Some(max);
        self
    }

    /// Returns the padding used when fitting content into the viewport.
    pub fn fit_padding(&self) -> f32 {
        self.fit_padding
    }
}

/// Inclusive range a viewport scale is kept in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleExtent {
    min: f32,
    max: f32,
}

impl ScaleExtent {
    /// Any positive finite scale.
    pub const UNBOUNDED: Self = Self {
        min: f32::MIN_POSITIVE,
        max: f32::MAX,
    };

    /// Creates an extent; the bounds are swapped if given in reverse.
    ///
    /// A NaN or non-positive bound is replaced by the unbounded one.
    pub fn new(min: f32, max: f32) -> Self {
        let min = if min > 0.0 { min } else { Self::UNBOUNDED.min };
        let max = if max > 0.0 { max } else { Self::UNBOUNDED.max };
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// Clamps `scale` into the extent.
    pub fn clamp(&self, scale: f32) -> f32 {
        scale.clamp(self.min, self.max)
    }
}

impl Default for ScaleExtent {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

/// Layout settings shared by the built-in engines.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Layout type bound to a new graph whose model names none.
    default: Option<String>,

    /// Gap between neighbouring nodes.
    spacing: f32,

    /// Padding between a group's children and its border.
    group_padding: f32,

    force: ForceConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            default: None,
            spacing: 50.0,
            group_padding: 20.0,
            force: ForceConfig::default(),
        }
    }
}

impl LayoutConfig {
    /// Returns the default layout type, if any.
    pub fn default_layout(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    pub fn group_padding(&self) -> f32 {
        self.group_padding
    }

    pub fn force(&self) -> &ForceConfig {
        &self.force
    }

    /// Sets the default layout type.
    pub fn with_default_layout(mut self, layout: impl Into<String>) -> Self {
        self.default = Some(layout.into());
        self
    }

    /// Sets the spacing between nodes.
    pub fn with_spacing(mut self, spacing: f32) -> Self {
        self.spacing = spacing;
        self
    }

    /// Sets the group padding.
    pub fn with_group_padding(mut self, padding: f32) -> Self {
        self.group_padding = padding;
        self
    }
}

/// Parameters of the force-directed engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForceConfig {
    iterations: usize,
    spring_constant: f32,
    repulsion_constant: f32,
    damping: f32,
    /// Seed for the initial jitter, so runs are reproducible.
    seed: u64,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            iterations: 300,
            spring_constant: 0.1,
            repulsion_constant: 1000.0,
            damping: 0.85,
            seed: 7,
        }
    }
}

impl ForceConfig {
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn spring_constant(&self) -> f32 {
        self.spring_constant
    }

    pub fn repulsion_constant(&self) -> f32 {
        self.repulsion_constant
    }

    pub fn damping(&self) -> f32 {
        self.damping
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

/// How a dispatch reacts to a failing listener.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispatchPolicy {
    /// The first failing listener stops the dispatch and its error propagates.
    #[default]
    FailFast,
    /// Every listener runs; failures are logged and the first one is returned
    /// after the dispatch completes.
    Isolate,
}

/// Event bus settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    dispatch: DispatchPolicy,

    /// Publish `element.change` batches after each reconciliation.
    notify_changes: bool,
}

impl EventsConfig {
    /// Creates a new [`EventsConfig`].
    ///
    /// # Arguments
    ///
    /// * `dispatch` - Listener failure policy.
    /// * `notify_changes` - Whether reconciliation publishes `element.change`.
    pub fn new(dispatch: DispatchPolicy, notify_changes: bool) -> Self {
        Self {
            dispatch,
            notify_changes,
        }
    }

    pub fn dispatch(&self) -> DispatchPolicy {
        self.dispatch
    }

    pub fn notify_changes(&self) -> bool {
        self.notify_changes
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_approx_eq!(f32, config.viewport().size().width(), 1200.0);
        assert_approx_eq!(f32, config.viewport().size().height(), 800.0);
        assert_eq!(config.viewport().scale_extent(), ScaleExtent::UNBOUNDED);
        assert_approx_eq!(f32, config.viewport().fit_padding(), 40.0);
        assert_eq!(config.layout().default_layout(), None);
        assert_approx_eq!(f32, config.layout().spacing(), 50.0);
        assert_approx_eq!(f32, config.layout().group_padding(), 20.0);
        assert_eq!(config.layout().force().iterations(), 300);
        assert_eq!(config.layout().force().seed(), 7);
        assert_eq!(config.events().dispatch(), DispatchPolicy::FailFast);
        assert!(!config.events().notify_changes());
    }

    #[test]
    fn test_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [viewport]
            width = 640.0

            [layout]
            default = "grid"

            [layout.force]
            iterations = 10

            [events]
            dispatch = "isolate"
            notify_changes = true
            "#,
        )
        .unwrap();

        assert_approx_eq!(f32, config.viewport().size().width(), 640.0);
        assert_approx_eq!(f32, config.viewport().size().height(), 800.0);
        assert_eq!(config.layout().default_layout(), Some("grid"));
        assert_eq!(config.layout().force().iterations(), 10);
        assert_approx_eq!(f32, config.layout().force().damping(), 0.85);
        assert_eq!(config.events().dispatch(), DispatchPolicy::Isolate);
        assert!(config.events().notify_changes());
    }

    #[test]
    fn test_empty_toml() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.viewport().scale_extent(), ScaleExtent::UNBOUNDED);
    }

    #[test]
    fn test_scale_extent_from_toml() {
        let config: AppConfig =
            toml::from_str("[viewport]\nmin_scale = 0.5\nmax_scale = 3.0").unwrap();
        let extent = config.viewport().scale_extent();

        assert_approx_eq!(f32, extent.min(), 0.5);
        assert_approx_eq!(f32, extent.max(), 3.0);
        assert_approx_eq!(f32, extent.clamp(10.0), 3.0);

        let config: AppConfig = toml::from_str("[viewport]\nmax_scale = 3.0").unwrap();
        assert_approx_eq!(f32, config.viewport().scale_extent().clamp(0.001), 0.001);
    }

    #[test]
    fn test_scale_extent_ignores_invalid_bounds() {
        let extent = ScaleExtent::new(f32::NAN, -1.0);
        assert_eq!(extent, ScaleExtent::UNBOUNDED);

        let extent = ScaleExtent::new(4.0, 0.5);
        assert_approx_eq!(f32, extent.min(), 0.5);
        assert_approx_eq!(f32, extent.max(), 4.0);
    }

    #[test]
    fn test_unknown_dispatch_policy() {
        let result: Result<AppConfig, _> = toml::from_str("[events]\ndispatch = \"random\"");
        assert!(result.is_err());
    }
}
