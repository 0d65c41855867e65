//! Graph root state and viewport operations.
//!
//! The graph element carries the viewport: a scale factor and a bounds
//! rectangle whose origin is the screen-space translation and whose size is
//! the visible area. A point `p` in graph coordinates is drawn at
//! `origin + p * scale`.
//!
//! [`GraphMut`] is the handle through which callers drive the viewport and
//! the bound layout. It borrows the controller mutably, so the graph cannot
//! disappear while the handle is alive.

use std::fmt;

use log::{debug, info};

use trellis_core::{
    geometry::{Bounds, Point, Size},
    identifier::Id,
};

use crate::{
    config::{ScaleExtent, ViewportConfig},
    controller::Controller,
    element::{Element, ElementKind},
    error::Result,
    layout::Layout,
};

/// Viewport and layout binding of the graph root.
pub struct GraphState {
    scale: f32,
    bounds: Bounds,
    layout_type: Option<String>,
    layout: Option<Box<dyn Layout>>,
}

impl Default for GraphState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            bounds: Bounds::default(),
            layout_type: None,
            layout: None,
        }
    }
}

impl fmt::Debug for GraphState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphState")
            .field("scale", &self.scale)
            .field("bounds", &self.bounds)
            .field("layout_type", &self.layout_type)
            .field("layout_bound", &self.layout.is_some())
            .finish()
    }
}

/// Options for [`GraphMut::pan_into_view`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PanIntoViewOptions {
    /// Margin kept between the node and the viewport border after panning.
    pub offset: f32,
    /// Part of the node, in graph units, that must stay visible.
    pub minimum_visible: f32,
}

impl GraphState {
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Viewport rectangle: translation origin and visible size.
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn origin(&self) -> Point {
        self.bounds.min_point()
    }

    pub fn viewport_size(&self) -> Size {
        self.bounds.to_size()
    }

    /// Type tag of the bound layout.
    pub fn layout_type(&self) -> Option<&str> {
        self.layout_type.as_deref()
    }

    pub fn has_layout(&self) -> bool {
        self.layout.is_some()
    }

    /// Maps a point from graph to screen coordinates.
    pub fn to_screen(&self, point: Point) -> Point {
        self.origin().add_point(point.scale(self.scale))
    }

    /// Maps a point from screen to graph coordinates.
    pub fn to_graph(&self, point: Point) -> Point {
        point.sub_point(self.origin()).scale(1.0 / self.scale)
    }

    /// Sets the scale; non-positive and non-finite values are ignored.
    pub(crate) fn set_scale(&mut self, scale: f32) -> bool {
        if !(scale.is_finite() && scale > 0.0) || scale == self.scale {
            return false;
        }
        self.scale = scale;
        true
    }

    pub(crate) fn set_origin(&mut self, origin: Point) -> bool {
        let bounds = self.bounds.with_min_point(origin);
        self.replace_bounds(bounds)
    }

    pub(crate) fn set_dimensions(&mut self, size: Size) -> bool {
        let bounds = self.bounds.with_size(size);
        self.replace_bounds(bounds)
    }

    fn replace_bounds(&mut self, bounds: Bounds) -> bool {
        if bounds == self.bounds {
            return false;
        }
        self.bounds = bounds;
        true
    }

    /// Multiplies the scale by `factor`, keeping `focal` (screen space,
    /// default: viewport center) fixed on screen. The result is clamped to
    /// `extent`.
    pub(crate) fn scale_by(
        &mut self,
        factor: f32,
        focal: Option<Point>,
        extent: ScaleExtent,
    ) -> bool {
        if !(factor.is_finite() && factor > 0.0) {
            return false;
        }
        let size = self.viewport_size();
        let focal = focal.unwrap_or(Point::new(size.width() / 2.0, size.height() / 2.0));
        let anchor = self.to_graph(focal);

        let scale = extent.clamp(self.scale * factor);
        let origin = focal.sub_point(anchor.scale(scale));

        let scaled = self.set_scale(scale);
        let moved = self.set_origin(origin);
        scaled || moved
    }

    /// Selects the largest scale, never above `max(scale, 1)`, that shows
    /// `content` inside the viewport with `padding` on each side, then
    /// centers the content. The scale is kept within `extent`.
    pub(crate) fn fit(
        &mut self,
        content: Option<Bounds>,
        padding: f32,
        extent: ScaleExtent,
    ) -> bool {
        let Some(content) = content.filter(|content| !content.is_empty()) else {
            return false;
        };
        let size = self.viewport_size();
        let available = Size::new(
            size.width() - padding * 2.0,
            size.height() - padding * 2.0,
        );
        if available.width() <= 0.0 || available.height() <= 0.0 {
            return false;
        }

        let scale = extent.clamp(
            (available.width() / content.width())
                .min(available.height() / content.height())
                .min(self.scale.max(1.0)),
        );
        let center = content.center();
        let origin = Point::new(
            size.width() / 2.0 - center.x() * scale,
            size.height() / 2.0 - center.y() * scale,
        );

        let scaled = self.set_scale(scale);
        let moved = self.set_origin(origin);
        scaled || moved
    }

    /// Pans the viewport by the least amount that makes the part of `node`
    /// required by `options` visible.
    pub(crate) fn pan_into_view(&mut self, node: Bounds, options: PanIntoViewOptions) -> bool {
        let view = self.bounds;
        let screen = node.scale(self.scale).translate(view.min_point());
        let pan_offset = options.offset * self.scale;
        let minimum_visible = options.minimum_visible * self.scale;

        let mut origin = view.min_point();
        if screen.max_x() - minimum_visible < 0.0 {
            origin = origin.with_x(origin.x() - (screen.min_x() - pan_offset));
        }
        if screen.min_x() + minimum_visible > view.width() {
            origin = origin.with_x(origin.x() - (screen.max_x() - view.width() + pan_offset));
        }
        if screen.max_y() - minimum_visible < 0.0 {
            origin = origin.with_y(origin.y() - (screen.min_y() - pan_offset));
        }
        if screen.min_y() + minimum_visible > view.height() {
            origin = origin.with_y(origin.y() - (screen.max_y() - view.height() + pan_offset));
        }

        self.set_origin(origin)
    }

    /// Restores scale 1 and origin (0, 0); the size is unchanged.
    pub(crate) fn reset(&mut self) -> bool {
        let scaled = self.set_scale(1.0);
        let moved = self.set_origin(Point::default());
        scaled || moved
    }

    pub(crate) fn take_layout(&mut self) -> Option<Box<dyn Layout>> {
        self.layout.take()
    }

    pub(crate) fn restore_layout(&mut self, layout: Box<dyn Layout>) {
        self.layout = Some(layout);
    }

    /// Binds a layout instance under `layout_type`, destroying the previous one.
    pub(crate) fn bind_layout(&mut self, layout_type: String, layout: Box<dyn Layout>) {
        self.unbind_layout();
        self.layout_type = Some(layout_type);
        self.layout = Some(layout);
    }

    /// Destroys and drops the bound layout, if any.
    pub(crate) fn unbind_layout(&mut self) {
        if let Some(mut layout) = self.layout.take() {
            layout.destroy();
        }
        self.layout_type = None;
    }
}

/// Mutable handle to the graph root of a [`Controller`].
///
/// Obtained from [`Controller::graph_mut`].
///
/// # Examples
///
/// ```
/// use trellis::{Controller, model::{GraphModel, Model, NodeModel}};
///
/// let mut controller = Controller::default();
/// controller
///     .from_model(&Model::new()
///         .with_graph(GraphModel::new("g", "graph").with_size(400.0, 300.0))
///         .with_nodes(vec![NodeModel::new("a", "node").with_size(100.0, 50.0)]))
///     .unwrap();
///
/// let mut graph = controller.graph_mut().unwrap();
/// graph.scale_by(2.0, None);
/// assert_eq!(graph.scale(), 2.0);
///
/// graph.fit(20.0);
/// assert!(graph.scale() <= 2.0);
/// ```
pub struct GraphMut<'a> {
    controller: &'a mut Controller,
    id: Id,
}

impl<'a> GraphMut<'a> {
    pub(crate) fn new(controller: &'a mut Controller, id: Id) -> Self {
        Self { controller, id }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    /// Returns the graph element.
    pub fn element(&self) -> Option<&Element> {
        self.controller.get_element_by_id(self.id)
    }

    fn state(&self) -> Option<&GraphState> {
        self.element().and_then(Element::as_graph)
    }

    pub fn scale(&self) -> f32 {
        self.state().map_or(1.0, GraphState::scale)
    }

    pub fn bounds(&self) -> Bounds {
        self.state().map(GraphState::bounds).unwrap_or_default()
    }

    pub fn layout_type(&self) -> Option<&str> {
        self.state().and_then(GraphState::layout_type)
    }

    /// Direct node children of the graph.
    pub fn nodes(&self) -> impl Iterator<Item = &Element> + '_ {
        self.controller.children_of_kind(self.id, ElementKind::Node)
    }

    /// Direct edge children of the graph.
    pub fn edges(&self) -> impl Iterator<Item = &Element> + '_ {
        self.controller.children_of_kind(self.id, ElementKind::Edge)
    }

    /// Binds the layout registered for `layout_type`.
    ///
    /// Setting the current type again is a no-op. `None` or an empty type
    /// unbinds the current layout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`](crate::Error::Configuration) if no
    /// layout factory handles the type.
    pub fn set_layout(&mut self, layout_type: Option<&str>) -> Result<()> {
        self.controller.set_graph_layout(layout_type)
    }

    /// Runs the bound layout. No-op if none is bound.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Layout`](crate::Error::Layout) if the engine fails.
    pub fn layout(&mut self) -> Result<()> {
        self.controller.run_layout()
    }

    /// Zooms by `factor` around `focal` (screen coordinates), defaulting to
    /// the viewport center.
    pub fn scale_by(&mut self, factor: f32, focal: Option<Point>) {
        let extent = self.viewport_config().scale_extent();
        self.controller
            .update_graph(|state| state.scale_by(factor, focal, extent));
        debug!(factor, scale = self.scale(); "Scaled viewport");
    }

    /// Fits all nodes into the viewport with `padding` on each side.
    pub fn fit(&mut self, padding: f32) {
        let content = self.controller.content_bounds(self.id);
        let extent = self.viewport_config().scale_extent();
        if self
            .controller
            .update_graph(|state| state.fit(content, padding, extent))
        {
            info!(scale = self.scale(); "Fitted viewport to content");
        }
    }

    /// Fits all nodes using the configured padding.
    pub fn fit_default(&mut self) {
        let padding = self.viewport_config().fit_padding();
        self.fit(padding);
    }

    /// Pans the viewport so `node` is visible. No-op if the node is unknown
    /// or already visible enough.
    pub fn pan_into_view(&mut self, node: Id, options: PanIntoViewOptions) {
        let Some(bounds) = self
            .controller
            .get_node_by_id(node)
            .and_then(Element::bounds)
        else {
            debug!(node = node.to_string(); "Cannot pan to unknown node");
            return;
        };
        self.controller
            .update_graph(|state| state.pan_into_view(bounds, options));
    }

    /// Resets scale and translation.
    pub fn reset(&mut self) {
        self.controller.update_graph(GraphState::reset);
    }

    /// Resizes the viewport, keeping its origin.
    pub fn set_dimensions(&mut self, size: Size) {
        self.controller
            .update_graph(|state| state.set_dimensions(size));
    }

    fn viewport_config(&self) -> ViewportConfig {
        self.controller.config().viewport().clone()
    }
}
