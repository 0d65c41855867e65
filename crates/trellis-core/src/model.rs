//! Declarative snapshot models.
//!
//! A producer describes the desired state of a graph as a [`Model`]: an
//! optional graph model plus lists of node and edge models. The controller
//! reconciles its live element tree against each snapshot it receives.
//!
//! Every kind-specific field is optional. An absent field means "leave the
//! element's current value untouched", which makes repeated snapshots with
//! partial information safe to apply.
//!
//! Models (de)serialize with camelCase keys, so a snapshot looks like:
//!
//! ```json
//! {
//!   "graph": { "id": "g", "type": "graph", "layout": "force" },
//!   "nodes": [
//!     { "id": "web", "type": "node", "x": 0, "y": 0, "width": 80, "height": 40 },
//!     { "id": "db", "type": "node", "width": 80, "height": 40 }
//!   ],
//!   "edges": [
//!     { "id": "web-db", "type": "edge", "source": "web", "target": "db" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{geometry::Point, identifier::Id};

/// Fields shared by graph, node and edge models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementModel {
    /// Controller-wide unique identifier.
    pub id: Id,

    /// Type tag used to resolve element, component and layout factories.
    #[serde(rename = "type")]
    pub element_type: String,

    /// Ids of the elements owned by this one, in order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Id>>,

    /// Opaque domain payload carried through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ElementModel {
    /// Creates a model with only an id and a type.
    pub fn new(id: impl Into<Id>, element_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            element_type: element_type.into(),
            children: None,
            data: None,
            label: None,
        }
    }
}

/// Common access to the shared element fields of a kind-specific model.
pub trait KindModel {
    /// Returns the shared element fields.
    fn element(&self) -> &ElementModel;

    /// Returns the model id.
    fn id(&self) -> Id {
        self.element().id
    }

    /// Returns the declared children, if any.
    fn children(&self) -> Option<&[Id]> {
        self.element().children.as_deref()
    }
}

/// Snapshot model for the graph root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphModel {
    #[serde(flatten)]
    pub element: ElementModel,

    /// Layout type tag. An empty string unbinds the current layout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,

    /// Viewport scale factor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f32>,

    /// Viewport origin x (translation).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,

    /// Viewport origin y (translation).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,

    /// Viewport width.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,

    /// Viewport height.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,
}

impl GraphModel {
    pub fn new(id: impl Into<Id>, element_type: impl Into<String>) -> Self {
        Self {
            element: ElementModel::new(id, element_type),
            layout: None,
            scale: None,
            x: None,
            y: None,
            width: None,
            height: None,
        }
    }

    /// Sets the layout type tag.
    pub fn with_layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
        self
    }

    /// Sets the viewport scale.
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Sets the viewport size.
    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Sets the declared children.
    pub fn with_children<I, T>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Id>,
    {
        self.element.children = Some(children.into_iter().map(Into::into).collect());
        self
    }
}

impl KindModel for GraphModel {
    fn element(&self) -> &ElementModel {
        &self.element
    }
}

/// Snapshot model for a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeModel {
    #[serde(flatten)]
    pub element: ElementModel,

    /// Left edge in graph coordinates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,

    /// Top edge in graph coordinates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,

    /// Marks the node as a group whose bounds follow its node children.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<bool>,
}

impl NodeModel {
    pub fn new(id: impl Into<Id>, element_type: impl Into<String>) -> Self {
        Self {
            element: ElementModel::new(id, element_type),
            x: None,
            y: None,
            width: None,
            height: None,
            group: None,
        }
    }

    /// Sets the top-left position.
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    /// Sets the size.
    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Marks the node as a group.
    pub fn as_group(mut self) -> Self {
        self.group = Some(true);
        self
    }

    /// Sets the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.element.label = Some(label.into());
        self
    }

    /// Sets the opaque data payload.
    pub fn with_data(mut self, data: Value) -> Self {
        self.element.data = Some(data);
        self
    }

    /// Sets the declared children.
    pub fn with_children<I, T>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Id>,
    {
        self.element.children = Some(children.into_iter().map(Into::into).collect());
        self
    }
}

impl KindModel for NodeModel {
    fn element(&self) -> &ElementModel {
        &self.element
    }
}

/// Snapshot model for an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeModel {
    #[serde(flatten)]
    pub element: ElementModel,

    /// Id of the source node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Id>,

    /// Id of the target node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Id>,

    /// Intermediate points the edge is routed through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bendpoints: Option<Vec<Point>>,
}

impl EdgeModel {
    pub fn new(id: impl Into<Id>, element_type: impl Into<String>) -> Self {
        Self {
            element: ElementModel::new(id, element_type),
            source: None,
            target: None,
            bendpoints: None,
        }
    }

    /// Sets both endpoints.
    pub fn with_endpoints(mut self, source: impl Into<Id>, target: impl Into<Id>) -> Self {
        self.source = Some(source.into());
        self.target = Some(target.into());
        self
    }

    /// Sets the bend points.
    pub fn with_bendpoints(mut self, bendpoints: Vec<Point>) -> Self {
        self.bendpoints = Some(bendpoints);
        self
    }
}

impl KindModel for EdgeModel {
    fn element(&self) -> &ElementModel {
        &self.element
    }
}

/// A complete declarative snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<GraphModel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<NodeModel>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges: Option<Vec<EdgeModel>>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_graph(mut self, graph: GraphModel) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn with_nodes(mut self, nodes: Vec<NodeModel>) -> Self {
        self.nodes = Some(nodes);
        self
    }

    pub fn with_edges(mut self, edges: Vec<EdgeModel>) -> Self {
        self.edges = Some(edges);
        self
    }

    /// Iterates node models (empty when absent).
    pub fn node_models(&self) -> impl Iterator<Item = &NodeModel> {
        self.nodes.iter().flatten()
    }

    /// Iterates edge models (empty when absent).
    pub fn edge_models(&self) -> impl Iterator<Item = &EdgeModel> {
        self.edges.iter().flatten()
    }

    /// Counts the element models in the snapshot, the graph included.
    pub fn element_count(&self) -> usize {
        usize::from(self.graph.is_some()) + self.node_models().count() + self.edge_models().count()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_deserialize_snapshot() {
        let snapshot = json!({
            "graph": { "id": "g", "type": "graph", "layout": "grid", "scale": 0.5 },
            "nodes": [
                { "id": "n1", "type": "node", "x": 1, "y": 2, "width": 10, "height": 20,
                  "data": { "kind": "Pod" } },
                { "id": "grp", "type": "group", "group": true, "children": ["n1"] }
            ],
            "edges": [
                { "id": "e1", "type": "edge", "source": "n1", "target": "grp",
                  "bendpoints": [{ "x": 5, "y": 5 }] }
            ]
        });

        let model: Model = serde_json::from_value(snapshot).unwrap();

        let graph = model.graph.as_ref().unwrap();
        assert_eq!(graph.id(), "g");
        assert_eq!(graph.layout.as_deref(), Some("grid"));
        assert_eq!(graph.scale, Some(0.5));

        let nodes: Vec<_> = model.node_models().collect();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].x, Some(1.0));
        assert_eq!(nodes[0].element.data, Some(json!({ "kind": "Pod" })));
        assert_eq!(nodes[1].group, Some(true));
        assert_eq!(nodes[1].children(), Some(&[Id::new("n1")][..]));

        let edge = model.edge_models().next().unwrap();
        assert_eq!(edge.source, Some(Id::new("n1")));
        assert_eq!(edge.bendpoints, Some(vec![Point::new(5.0, 5.0)]));

        assert_eq!(model.element_count(), 4);
    }

    #[test]
    fn test_absent_fields_stay_absent() {
        let node: NodeModel = serde_json::from_value(json!({ "id": "n", "type": "node" })).unwrap();

        assert_eq!(node.x, None);
        assert_eq!(node.width, None);
        assert_eq!(node.children(), None);

        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value, json!({ "id": "n", "type": "node" }));
    }

    #[test]
    fn test_builders() {
        let model = Model::new()
            .with_graph(GraphModel::new("g", "graph").with_layout("force"))
            .with_nodes(vec![
                NodeModel::new("a", "node")
                    .with_position(0.0, 0.0)
                    .with_size(10.0, 10.0),
            ])
            .with_edges(vec![EdgeModel::new("e", "edge").with_endpoints("a", "a")]);

        assert_eq!(model.element_count(), 3);
        assert_eq!(model.edge_models().next().unwrap().target, Some(Id::new("a")));
    }

    #[test]
    fn test_empty_model() {
        let model: Model = serde_json::from_str("{}").unwrap();
        assert_eq!(model, Model::default());
        assert_eq!(model.element_count(), 0);
    }
}
