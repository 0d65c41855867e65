//! Integration tests for the graph viewport handle.

use float_cmp::{approx_eq, assert_approx_eq};

use trellis::{
    Controller,
    config::{AppConfig, ViewportConfig},
    geometry::{Point, Size},
    graph::PanIntoViewOptions,
    model::{GraphModel, Model, NodeModel},
};

fn controller_with(graph: GraphModel, nodes: Vec<NodeModel>) -> Controller {
    let mut controller = Controller::new(AppConfig::default());
    controller
        .from_model(&Model::new().with_graph(graph).with_nodes(nodes))
        .expect("Failed to import snapshot");
    controller
}

fn viewport() -> GraphModel {
    GraphModel::new("g", "graph").with_size(400.0, 300.0)
}

#[test]
fn test_scale_round_trip_restores_bounds() {
    let mut controller = controller_with(viewport(), vec![]);
    let mut graph = controller.graph_mut().unwrap();
    let before = graph.bounds();
    let focal = Some(Point::new(120.0, 80.0));

    graph.scale_by(2.0, focal);
    assert_approx_eq!(f32, graph.scale(), 2.0);
    graph.scale_by(0.5, focal);

    let after = graph.bounds();
    assert_approx_eq!(f32, graph.scale(), 1.0);
    assert_approx_eq!(f32, after.min_x(), before.min_x(), epsilon = 1e-4);
    assert_approx_eq!(f32, after.min_y(), before.min_y(), epsilon = 1e-4);
    assert_eq!(after.to_size(), before.to_size());
}

#[test]
fn test_scale_keeps_focal_point_fixed() {
    let mut controller = controller_with(viewport(), vec![]);
    let focal = Point::new(100.0, 50.0);

    let anchor = controller.get_graph().unwrap().as_graph().unwrap().to_graph(focal);
    controller.graph_mut().unwrap().scale_by(3.0, Some(focal));

    let state = controller.get_graph().unwrap().as_graph().unwrap();
    let screen = state.to_screen(anchor);
    assert_approx_eq!(f32, screen.x(), focal.x(), epsilon = 1e-4);
    assert_approx_eq!(f32, screen.y(), focal.y(), epsilon = 1e-4);
}

#[test]
fn test_scale_is_clamped_to_configured_extent() {
    let config = AppConfig::default()
        .with_viewport(ViewportConfig::default().with_scale_extent(0.25, 4.0));
    let mut controller = Controller::new(config);
    controller
        .from_model(&Model::new().with_graph(viewport()))
        .expect("Failed to import snapshot");
    let mut graph = controller.graph_mut().unwrap();

    graph.scale_by(100.0, None);
    assert_approx_eq!(f32, graph.scale(), 4.0);
    graph.scale_by(0.0001, None);
    assert_approx_eq!(f32, graph.scale(), 0.25);
}

#[test]
fn test_scale_round_trip_after_fitting_large_content() {
    let mut controller = controller_with(
        GraphModel::new("g", "graph").with_size(800.0, 600.0),
        vec![NodeModel::new("huge", "node")
            .with_position(0.0, 0.0)
            .with_size(8000.0, 6000.0)],
    );
    let mut graph = controller.graph_mut().unwrap();
    let focal = Some(Point::new(100.0, 100.0));

    graph.fit(0.0);
    assert_approx_eq!(f32, graph.scale(), 0.1);
    let before = graph.bounds();

    graph.scale_by(2.0, focal);
    graph.scale_by(0.5, focal);

    let after = graph.bounds();
    assert_approx_eq!(f32, graph.scale(), 0.1, epsilon = 1e-6);
    assert_approx_eq!(f32, after.min_x(), before.min_x(), epsilon = 1e-3);
    assert_approx_eq!(f32, after.min_y(), before.min_y(), epsilon = 1e-3);
}

#[test]
fn test_fit_respects_configured_extent() {
    let config = AppConfig::default()
        .with_viewport(ViewportConfig::default().with_scale_extent(0.25, 4.0));
    let mut controller = Controller::new(config);
    controller
        .from_model(
            &Model::new()
                .with_graph(GraphModel::new("g", "graph").with_size(800.0, 600.0))
                .with_nodes(vec![NodeModel::new("huge", "node")
                    .with_position(0.0, 0.0)
                    .with_size(8000.0, 6000.0)]),
        )
        .expect("Failed to import snapshot");
    let mut graph = controller.graph_mut().unwrap();

    graph.fit(0.0);
    assert_approx_eq!(f32, graph.scale(), 0.25);
    let before = graph.bounds();

    graph.scale_by(2.0, None);
    graph.scale_by(0.5, None);
    assert_approx_eq!(f32, graph.bounds().min_x(), before.min_x(), epsilon = 1e-3);
}

#[test]
fn test_fit_never_zooms_past_one() {
    let mut controller = controller_with(
        viewport().with_scale(0.3),
        vec![NodeModel::new("tiny", "node")
            .with_position(10.0, 10.0)
            .with_size(5.0, 5.0)],
    );
    let mut graph = controller.graph_mut().unwrap();

    graph.fit(10.0);

    assert!(graph.scale() <= 1.0, "scale {} exceeds 1", graph.scale());
    assert_approx_eq!(f32, graph.scale(), 1.0);
}

#[test]
fn test_fit_shrinks_large_content() {
    let mut controller = controller_with(
        viewport(),
        vec![
            NodeModel::new("a", "node")
                .with_position(0.0, 0.0)
                .with_size(100.0, 100.0),
            NodeModel::new("b", "node")
                .with_position(1900.0, 0.0)
                .with_size(100.0, 100.0),
        ],
    );
    let mut graph = controller.graph_mut().unwrap();

    graph.fit(0.0);

    // 2000 graph units wide into a 400 pixel viewport.
    assert_approx_eq!(f32, graph.scale(), 0.2);
    let bounds = graph.bounds();
    assert_approx_eq!(f32, bounds.min_x(), 0.0, epsilon = 1e-3);
    assert_eq!(bounds.to_size(), Size::new(400.0, 300.0));
}

#[test]
fn test_fit_without_nodes_is_noop() {
    let mut controller = controller_with(viewport().with_scale(2.0), vec![]);
    let mut graph = controller.graph_mut().unwrap();
    let before = graph.bounds();

    graph.fit(20.0);

    assert_approx_eq!(f32, graph.scale(), 2.0);
    assert_eq!(graph.bounds(), before);
}

#[test]
fn test_pan_into_view() {
    let mut controller = controller_with(
        viewport(),
        vec![NodeModel::new("far", "node")
            .with_position(1000.0, 0.0)
            .with_size(50.0, 50.0)],
    );
    let mut graph = controller.graph_mut().unwrap();

    graph.pan_into_view(
        "far".into(),
        PanIntoViewOptions {
            offset: 10.0,
            minimum_visible: 20.0,
        },
    );

    // The node's right edge lands `offset` pixels inside the viewport.
    assert_approx_eq!(f32, graph.bounds().min_x(), -660.0);
    assert_approx_eq!(f32, graph.bounds().min_y(), 0.0);
}

#[test]
fn test_pan_into_view_visible_node_is_noop() {
    let mut controller = controller_with(
        viewport(),
        vec![NodeModel::new("near", "node")
            .with_position(10.0, 10.0)
            .with_size(50.0, 50.0)],
    );
    let mut graph = controller.graph_mut().unwrap();
    let before = graph.bounds();

    graph.pan_into_view("near".into(), PanIntoViewOptions::default());
    graph.pan_into_view("missing".into(), PanIntoViewOptions::default());

    assert_eq!(graph.bounds(), before);
}

#[test]
fn test_reset_keeps_size() {
    let mut controller = controller_with(viewport(), vec![]);
    let mut graph = controller.graph_mut().unwrap();

    graph.scale_by(2.0, Some(Point::new(50.0, 50.0)));
    graph.reset();

    assert_approx_eq!(f32, graph.scale(), 1.0);
    assert_eq!(graph.bounds().min_point(), Point::new(0.0, 0.0));
    assert_eq!(graph.bounds().to_size(), Size::new(400.0, 300.0));
}

#[test]
fn test_set_dimensions_keeps_origin() {
    let mut controller = controller_with(viewport(), vec![]);
    let mut graph = controller.graph_mut().unwrap();
    graph.scale_by(2.0, None);
    let origin = graph.bounds().min_point();

    graph.set_dimensions(Size::new(800.0, 600.0));

    assert_eq!(graph.bounds().min_point(), origin);
    assert!(approx_eq!(f32, graph.bounds().width(), 800.0));
}
