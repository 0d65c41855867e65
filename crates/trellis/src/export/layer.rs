//! Z-ordered collection of SVG nodes.
//!
//! Visuals are emitted in tree order, but the document needs group frames
//! at the bottom, then nodes, then edges, then labels. [`LayeredOutput`]
//! collects nodes per [`RenderLayer`] and emits one `<g>` per layer.

use svg::node::element as svg_element;

/// Boxed SVG node.
pub type SvgNode = Box<dyn svg::Node>;

/// Rendering layers, bottom to top in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RenderLayer {
    /// Group frames
    Group,
    /// Node shapes
    Node,
    /// Edge paths, drawn above nodes
    Edge,
    /// Text labels
    Label,
}

impl RenderLayer {
    pub fn name(self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Node => "node",
            Self::Edge => "edge",
            Self::Label => "label",
        }
    }
}

/// SVG nodes grouped by rendering layer.
#[derive(Debug, Default)]
pub struct LayeredOutput {
    items: Vec<(RenderLayer, SvgNode)>,
}

impl LayeredOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `node` to `layer`.
    pub fn add_to_layer(&mut self, layer: RenderLayer, node: SvgNode) {
        self.items.push((layer, node));
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of nodes in `layer`.
    pub fn count(&self, layer: RenderLayer) -> usize {
        self.items
            .iter()
            .filter(|(item_layer, _)| *item_layer == layer)
            .count()
    }

    /// Renders every non-empty layer into a `<g data-layer="...">`, bottom
    /// to top. Nodes keep their insertion order within a layer.
    pub fn render(mut self) -> Vec<SvgNode> {
        if self.is_empty() {
            return Vec::new();
        }

        // Stable, so tree order survives within a layer.
        self.items.sort_by_key(|(layer, _)| *layer);

        let mut result = Vec::new();
        let mut current_layer = self.items[0].0;
        let mut current_group = svg_element::Group::new().set("data-layer", current_layer.name());

        for (layer, node) in self.items {
            if layer != current_layer {
                result.push(Box::new(current_group) as SvgNode);
                current_layer = layer;
                current_group = svg_element::Group::new().set("data-layer", layer.name());
            }
            current_group = current_group.add(node);
        }
        result.push(Box::new(current_group) as SvgNode);

        result
    }
}
