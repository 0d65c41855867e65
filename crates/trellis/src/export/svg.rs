//! SVG export backend.
//!
//! [`SvgExporter`] walks the graph tree depth-first in child order, renders
//! every element through its resolved component and lays the resulting
//! visuals out in z-ordered layers under the graph's viewport transform.

use std::{
    collections::HashSet,
    fs::File,
    io::Write,
    path::{Path as FilePath, PathBuf},
};

use log::{debug, error, info};
use svg::{
    Document,
    node::{
        Text as SvgText,
        element::{Definitions, Group, Marker, Path, Rectangle, Text},
    },
};

use trellis_core::{geometry::Point, identifier::Id};

use crate::{
    component::{ComponentProps, Visual},
    controller::Controller,
    element::Element,
    export::{
        self,
        layer::{LayeredOutput, RenderLayer},
    },
};

const ARROW_MARKER_ID: &str = "arrow";
const STROKE_COLOR: &str = "#333333";
const NODE_FILL: &str = "#ffffff";
const GROUP_FILL: &str = "#f5f5f5";
const FONT_FAMILY: &str = "sans-serif";
const FONT_SIZE: f32 = 12.0;

/// Renders the controller's graph to SVG.
#[derive(Debug, Default)]
pub struct SvgExporter {
    file_name: Option<PathBuf>,
}

impl SvgExporter {
    /// Creates an exporter whose [`Exporter::export`](export::Exporter::export)
    /// writes to `file_name`.
    pub fn new(file_name: impl Into<PathBuf>) -> Self {
        Self {
            file_name: Some(file_name.into()),
        }
    }

    /// Renders the graph into an SVG document sized like the viewport.
    ///
    /// # Errors
    ///
    /// Returns [`export::Error::Render`] if no graph is set or an element has
    /// no component.
    pub fn render(&self, controller: &Controller) -> Result<Document, export::Error> {
        let graph = controller
            .get_graph()
            .map_err(|err| export::Error::Render(err.to_string()))?;
        let state = graph
            .as_graph()
            .ok_or_else(|| export::Error::Render("graph root has no viewport".to_string()))?;
        let size = state.viewport_size();
        let origin = state.origin();

        let mut output = LayeredOutput::new();
        for id in Self::tree_order(controller, graph) {
            let Some(element) = controller.get_element_by_id(id) else {
                continue;
            };
            let component = controller
                .get_component(element.kind(), element.element_type())
                .map_err(|err| export::Error::Render(err.to_string()))?;
            let visual = component.render(ComponentProps {
                element,
                controller,
            });
            Self::render_visual(&mut output, element, &visual);
        }
        debug!(
            nodes = output.count(RenderLayer::Node),
            groups = output.count(RenderLayer::Group),
            edges = output.count(RenderLayer::Edge);
            "Rendered visuals"
        );

        let mut viewport = Group::new().set(
            "transform",
            format!(
                "translate({}, {}) scale({})",
                origin.x(),
                origin.y(),
                state.scale()
            ),
        );
        for node in output.render() {
            viewport = viewport.add(node);
        }

        let background = Rectangle::new()
            .set("width", "100%")
            .set("height", "100%")
            .set("fill", "white");

        Ok(Document::new()
            .set("viewBox", format!("0 0 {} {}", size.width(), size.height()))
            .set("width", size.width())
            .set("height", size.height())
            .add(Self::marker_definitions())
            .add(background)
            .add(viewport))
    }

    /// Writes `doc` to `file_name`.
    pub fn write_document(&self, doc: &Document, file_name: &FilePath) -> Result<(), export::Error> {
        let display = file_name.display().to_string();
        info!(file_name = display; "Creating SVG file");

        let f = match File::create(file_name) {
            Ok(file) => file,
            Err(err) => {
                error!(file_name = display, err:err; "Failed to create SVG file");
                return Err(export::Error::Io(err));
            }
        };

        if let Err(err) = write!(&f, "{doc}") {
            error!(file_name = display, err:err; "Failed to write SVG content");
            return Err(export::Error::Io(err));
        }

        Ok(())
    }

    /// Element ids below `graph` in depth-first child order.
    fn tree_order(controller: &Controller, graph: &Element) -> Vec<Id> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut stack: Vec<Id> = graph.children().iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            if let Some(element) = controller.get_element_by_id(id) {
                stack.extend(element.children().iter().rev().copied());
            }
        }
        order
    }

    fn render_visual(output: &mut LayeredOutput, element: &Element, visual: &Visual) {
        match visual {
            Visual::Empty => {}
            Visual::Group(children) => {
                for child in children {
                    Self::render_visual(output, element, child);
                }
            }
            Visual::Rect { bounds, dashed } => {
                let mut rect = Rectangle::new()
                    .set("data-id", element.id().to_string())
                    .set("x", bounds.min_x())
                    .set("y", bounds.min_y())
                    .set("width", bounds.width())
                    .set("height", bounds.height())
                    .set("stroke", STROKE_COLOR)
                    .set("stroke-width", 1);
                let layer = if *dashed {
                    rect = rect
                        .set("fill", GROUP_FILL)
                        .set("stroke-dasharray", "4 2");
                    RenderLayer::Group
                } else {
                    rect = rect.set("fill", NODE_FILL);
                    RenderLayer::Node
                };
                output.add_to_layer(layer, Box::new(rect));
            }
            Visual::Path { points, arrow } => {
                let Some(data) = Self::path_data(points) else {
                    return;
                };
                let mut path = Path::new()
                    .set("data-id", element.id().to_string())
                    .set("d", data)
                    .set("fill", "none")
                    .set("stroke", STROKE_COLOR)
                    .set("stroke-width", 1);
                if *arrow {
                    path = path.set("marker-end", format!("url(#{ARROW_MARKER_ID})"));
                }
                output.add_to_layer(RenderLayer::Edge, Box::new(path));
            }
            Visual::Label { position, text } => {
                let label = Text::new("")
                    .set("x", position.x())
                    .set("y", position.y())
                    .set("text-anchor", "middle")
                    .set("dominant-baseline", "central")
                    .set("font-family", FONT_FAMILY)
                    .set("font-size", FONT_SIZE)
                    .add(SvgText::new(text.as_str()));
                output.add_to_layer(RenderLayer::Label, Box::new(label));
            }
        }
    }

    /// Polyline path data; `None` for fewer than two points.
    fn path_data(points: &[Point]) -> Option<String> {
        let (first, rest) = points.split_first()?;
        if rest.is_empty() {
            return None;
        }
        let mut data = format!("M {} {}", first.x(), first.y());
        for point in rest {
            data.push_str(&format!(" L {} {}", point.x(), point.y()));
        }
        Some(data)
    }

    fn marker_definitions() -> Definitions {
        let arrow = Marker::new()
            .set("id", ARROW_MARKER_ID)
            .set("viewBox", "0 0 10 10")
            .set("refX", 9)
            .set("refY", 5)
            .set("markerWidth", 6)
            .set("markerHeight", 6)
            .set("orient", "auto")
            .add(
                Path::new()
                    .set("d", "M 0 0 L 10 5 L 0 10 z")
                    .set("fill", STROKE_COLOR),
            );
        Definitions::new().add(arrow)
    }
}

impl export::Exporter for SvgExporter {
    fn export(&mut self, controller: &Controller) -> Result<(), export::Error> {
        let doc = self.render(controller)?;
        debug!("SVG document rendered");

        let file_name = self
            .file_name
            .clone()
            .ok_or_else(|| export::Error::Render("no output file configured".to_string()))?;
        self.write_document(&doc, &file_name)
    }
}

#[cfg(test)]
mod tests {
    use trellis_core::model::{EdgeModel, GraphModel, Model, NodeModel};

    use super::*;
    use crate::{component::GROUP_TYPE, export::Exporter};

    fn controller() -> Controller {
        let mut controller = Controller::default();
        controller
            .from_model(
                &Model::new()
                    .with_graph(GraphModel::new("g", "graph").with_size(400.0, 300.0))
                    .with_nodes(vec![
                        NodeModel::new("grp", GROUP_TYPE).with_children(["a"]),
                        NodeModel::new("a", "node")
                            .with_position(0.0, 0.0)
                            .with_size(40.0, 20.0)
                            .with_label("A & B"),
                        NodeModel::new("b", "node")
                            .with_position(100.0, 0.0)
                            .with_size(40.0, 20.0),
                    ])
                    .with_edges(vec![EdgeModel::new("ab", "edge").with_endpoints("a", "b")]),
            )
            .unwrap();
        controller
    }

    #[test]
    fn test_render_counts_shapes() {
        let doc = SvgExporter::default().render(&controller()).unwrap().to_string();

        assert_eq!(doc.matches("stroke-dasharray").count(), 1);
        assert_eq!(doc.matches("<path").count(), 2); // marker + edge
        assert!(doc.contains("marker-end=\"url(#arrow)\""));
        assert!(doc.contains("viewBox=\"0 0 400 300\""));
    }

    #[test]
    fn test_label_text_is_escaped() {
        let doc = SvgExporter::default().render(&controller()).unwrap().to_string();
        assert!(doc.contains("A &amp; B"));
    }

    #[test]
    fn test_viewport_transform() {
        let mut controller = controller();
        controller.graph_mut().unwrap().scale_by(2.0, Some(Point::new(0.0, 0.0)));

        let doc = SvgExporter::default().render(&controller).unwrap().to_string();
        assert!(doc.contains("translate(0, 0) scale(2)"));
    }

    #[test]
    fn test_render_without_graph() {
        let err = SvgExporter::default().render(&Controller::default()).unwrap_err();
        assert!(matches!(err, export::Error::Render(_)));
    }

    #[test]
    fn test_export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.svg");

        SvgExporter::new(&path).export(&controller()).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("<svg"));
        assert!(written.contains("data-id=\"ab\""));
    }

    #[test]
    fn test_export_reports_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("graph.svg");

        let err = SvgExporter::new(&path).export(&controller()).unwrap_err();
        assert!(matches!(err, export::Error::Io(_)));
    }

    #[test]
    fn test_export_without_file_name() {
        let err = SvgExporter::default().export(&controller()).unwrap_err();
        assert!(matches!(err, export::Error::Render(_)));
    }

    #[test]
    fn test_tree_order_visits_nested_children_once() {
        let controller = controller();
        let graph = controller.get_graph().unwrap();

        let order = SvgExporter::tree_order(&controller, graph);

        let ids: Vec<String> = order.iter().map(Id::to_string).collect();
        assert_eq!(ids.iter().filter(|id| *id == "a").count(), 1);
        let grp = ids.iter().position(|id| id == "grp").unwrap();
        let a = ids.iter().position(|id| id == "a").unwrap();
        assert!(grp < a);
    }

    #[test]
    fn test_path_data() {
        assert_eq!(SvgExporter::path_data(&[Point::new(0.0, 0.0)]), None);
        assert_eq!(
            SvgExporter::path_data(&[Point::new(0.0, 1.0), Point::new(2.0, 3.0)]).as_deref(),
            Some("M 0 1 L 2 3")
        );
    }
}
