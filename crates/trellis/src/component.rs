//! Visual component resolution.
//!
//! A [`Component`] turns an element into a renderer-neutral [`Visual`]. The
//! controller resolves components by element kind and type through its
//! component factory chain; any rendering technology consumes the visuals.

use std::rc::Rc;

use trellis_core::geometry::{Bounds, Point};

use crate::{
    controller::Controller,
    element::{Element, ElementKind},
    factory::{ComponentFactory, FactoryChain},
};

/// Type tag of group nodes.
pub const GROUP_TYPE: &str = "group";

/// Renderer-neutral drawing primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum Visual {
    /// Nothing to draw.
    Empty,
    Rect {
        bounds: Bounds,
        /// Draw the border dashed.
        dashed: bool,
    },
    /// Open polyline; `arrow` marks the last point as the head.
    Path { points: Vec<Point>, arrow: bool },
    Label { position: Point, text: String },
    Group(Vec<Visual>),
}

impl Visual {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Group(children) => children.iter().all(Visual::is_empty),
            _ => false,
        }
    }
}

/// Input of [`Component::render`].
#[derive(Clone, Copy)]
pub struct ComponentProps<'a> {
    /// The element being drawn.
    pub element: &'a Element,
    /// Read access for lookups such as edge endpoints.
    pub controller: &'a Controller,
}

/// Renders an element into a [`Visual`].
pub trait Component {
    fn render(&self, props: ComponentProps<'_>) -> Visual;
}

/// The graph root draws nothing itself.
#[derive(Debug, Default)]
pub struct DefaultGraphComponent;

impl Component for DefaultGraphComponent {
    fn render(&self, _props: ComponentProps<'_>) -> Visual {
        Visual::Empty
    }
}

/// A rectangle with the label centered inside.
#[derive(Debug, Default)]
pub struct DefaultNodeComponent;

impl Component for DefaultNodeComponent {
    fn render(&self, props: ComponentProps<'_>) -> Visual {
        if props.element.is_group() {
            return GroupComponent.render(props);
        }
        let Some(bounds) = props.element.bounds() else {
            return Visual::Empty;
        };

        let mut visuals = vec![Visual::Rect {
            bounds,
            dashed: false,
        }];
        if let Some(label) = props.element.label() {
            visuals.push(Visual::Label {
                position: bounds.center(),
                text: label.to_string(),
            });
        }
        Visual::Group(visuals)
    }
}

/// A dashed rectangle around the group with its label along the top.
#[derive(Debug, Default)]
pub struct GroupComponent;

impl Component for GroupComponent {
    fn render(&self, props: ComponentProps<'_>) -> Visual {
        let Some(bounds) = props.element.bounds() else {
            return Visual::Empty;
        };

        let mut visuals = vec![Visual::Rect {
            bounds,
            dashed: true,
        }];
        if let Some(label) = props.element.label() {
            visuals.push(Visual::Label {
                position: Point::new(bounds.center().x(), bounds.min_y()),
                text: label.to_string(),
            });
        }
        Visual::Group(visuals)
    }
}

/// A polyline from the source center through the bend points to the target
/// center. Dangling edges draw nothing.
#[derive(Debug, Default)]
pub struct DefaultEdgeComponent;

impl Component for DefaultEdgeComponent {
    fn render(&self, props: ComponentProps<'_>) -> Visual {
        let id = props.element.id();
        let (Some(source), Some(target)) = (
            props.controller.edge_source(id),
            props.controller.edge_target(id),
        ) else {
            return Visual::Empty;
        };
        let (Some(start), Some(end)) = (source.bounds(), target.bounds()) else {
            return Visual::Empty;
        };

        let bendpoints = props
            .element
            .as_edge()
            .map(|edge| edge.bendpoints())
            .unwrap_or_default();
        let points: Vec<Point> = std::iter::once(start.center())
            .chain(bendpoints.iter().copied())
            .chain(std::iter::once(end.center()))
            .collect();

        let path = Visual::Path {
            points,
            arrow: true,
        };
        match props.element.label() {
            Some(label) => Visual::Group(vec![
                path,
                Visual::Label {
                    position: start.center().midpoint(end.center()),
                    text: label.to_string(),
                },
            ]),
            None => path,
        }
    }
}

/// Registers the built-in components as the last-resort factory.
pub(crate) fn register_defaults(chain: &mut FactoryChain<ComponentFactory>) {
    let graph: Rc<dyn Component> = Rc::new(DefaultGraphComponent);
    let node: Rc<dyn Component> = Rc::new(DefaultNodeComponent);
    let group: Rc<dyn Component> = Rc::new(GroupComponent);
    let edge: Rc<dyn Component> = Rc::new(DefaultEdgeComponent);

    chain.register(Box::new(move |kind: ElementKind, element_type: &str| {
        let component = match kind {
            ElementKind::Graph => &graph,
            ElementKind::Node if element_type == GROUP_TYPE => &group,
            ElementKind::Node => &node,
            ElementKind::Edge => &edge,
        };
        Some(Rc::clone(component))
    }));
}
