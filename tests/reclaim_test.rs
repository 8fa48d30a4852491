use std::sync::Arc;

use scene_reclaim::{
    Layer, NodeKind, ReclaimConfig, Reclaimer, SceneGraph, SceneNode,
    data_structures::model::{Material, Resources},
};

use crate::common::test_utils::{
    DisposeCounter, attach, disposed_nodes, is_released, is_untouched, textured_material, tile,
    tile_in, triangle,
};

mod common;

#[test]
fn should_detach_only_children_of_layer() {
    let (l1, l2) = (Layer::new("l1"), Layer::new("l2"));
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let n = attach(&mut graph, root, SceneNode::plain("n"));
    let a = attach(&mut graph, n, tile_in("a", &l1));
    let b = attach(&mut graph, n, tile_in("b", &l2));
    let c = attach(&mut graph, n, tile("c"));

    let removed = Reclaimer::default()
        .remove_children(&mut graph, &l1, n)
        .unwrap();

    assert_eq!(removed, vec![a]);
    assert_eq!(graph.children(n).unwrap(), &[b, c]);
    assert_eq!(graph.parent(a).unwrap(), None);
    assert!(is_untouched(&graph, a));
    assert!(is_untouched(&graph, b));
    assert!(is_untouched(&graph, c));
    assert!(graph.drain_events().is_empty());
}

#[test]
fn should_match_children_by_id_and_keep_order() {
    let l1 = Layer::new("l1");
    let l1_twin = Layer::new("l1");
    let l2 = Layer::new("l2");
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let n = attach(&mut graph, root, SceneNode::plain("n"));
    let a1 = attach(&mut graph, n, tile_in("a1", &l1));
    let b = attach(&mut graph, n, tile_in("b", &l2));
    let a2 = attach(&mut graph, n, tile_in("a2", &l1_twin));
    let d = attach(&mut graph, n, SceneNode::plain("d"));
    let a3 = attach(&mut graph, n, tile_in("a3", &l1));

    let removed = Reclaimer::default()
        .remove_children(&mut graph, &l1, n)
        .unwrap();

    assert_eq!(removed, vec![a1, a2, a3]);
    assert_eq!(graph.children(n).unwrap(), &[b, d]);
}

#[test]
fn should_only_detach_direct_children() {
    let l1 = Layer::new("l1");
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let n = attach(&mut graph, root, SceneNode::plain("n"));
    let a = attach(&mut graph, n, tile_in("a", &l1));
    let grandchild = attach(&mut graph, a, tile_in("grandchild", &l1));

    let removed = Reclaimer::default()
        .remove_children(&mut graph, &l1, n)
        .unwrap();

    assert_eq!(removed, vec![a]);
    assert_eq!(graph.children(a).unwrap(), &[grandchild]);
    assert!(is_untouched(&graph, grandchild));
}

#[test]
fn should_cleanup_node_of_identical_layer() {
    let l1 = Layer::new("l1");
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let n = attach(&mut graph, root, tile_in("n", &l1));
    let other = attach(&mut graph, n, tile_in("other", &Layer::new("l2")));

    let removed = Reclaimer::default()
        .remove_children_and_cleanup(&mut graph, &l1, n)
        .unwrap();

    assert!(removed.is_empty());
    assert!(is_released(&graph, n));
    assert!(graph.node(n).unwrap().layer.is_none());
    assert!(is_untouched(&graph, other));
    assert_eq!(disposed_nodes(&mut graph), vec![n]);
}

#[test]
fn should_not_cleanup_node_sharing_only_the_layer_id() {
    let l1 = Layer::new("l1");
    let l1_twin = Layer::new("l1");
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let n = attach(&mut graph, root, tile_in("n", &l1_twin));

    let removed = Reclaimer::default()
        .remove_children_and_cleanup(&mut graph, &l1, n)
        .unwrap();

    assert!(removed.is_empty());
    assert!(is_untouched(&graph, n));
    assert!(graph.node(n).unwrap().layer.is_some());

    Reclaimer::new(ReclaimConfig::by_id())
        .remove_children_and_cleanup(&mut graph, &l1, n)
        .unwrap();
    assert!(is_released(&graph, n));
}

#[test]
fn should_never_cleanup_children_when_cleaning_up_parent() {
    let l1 = Layer::new("l1");
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let n = attach(&mut graph, root, tile_in("n", &l1));
    let a = attach(&mut graph, n, tile_in("a", &l1));
    let kept = attach(&mut graph, n, tile("kept"));

    let removed = Reclaimer::default()
        .remove_children_and_cleanup(&mut graph, &l1, n)
        .unwrap();

    assert_eq!(removed, vec![a]);
    assert_eq!(graph.children(n).unwrap(), &[kept]);
    assert!(is_released(&graph, n));
    assert!(is_untouched(&graph, a));
    assert!(is_untouched(&graph, kept));
}

#[test]
fn should_recurse_into_links_without_cleaning_foreign_layers() {
    let (l1, l2) = (Layer::new("l1"), Layer::new("l2"));
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let n = attach(&mut graph, root, SceneNode::plain("n"));
    let a = attach(&mut graph, n, tile_in("a", &l1));
    let b = graph.insert(tile_in("b", &l2));
    graph.add_link(a, b).unwrap();

    let removed = Reclaimer::default()
        .remove_children_and_cleanup_recursively(&mut graph, &l1, n)
        .unwrap();

    assert_eq!(removed, vec![a]);
    assert!(graph.children(n).unwrap().is_empty());
    assert!(is_released(&graph, a));
    assert!(is_untouched(&graph, b));
    assert!(Layer::is(graph.node(b).unwrap().layer.as_ref().unwrap(), &l2));
    assert_eq!(disposed_nodes(&mut graph), vec![a]);
}

#[test]
fn should_release_whole_subtree_bottom_up() {
    let (l1, l2) = (Layer::new("l1"), Layer::new("l2"));
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let n = attach(&mut graph, root, SceneNode::plain("n"));
    let a = attach(&mut graph, n, tile_in("a", &l1));
    let a1 = attach(&mut graph, a, tile_in("a1", &l1));
    let a11 = attach(&mut graph, a1, tile_in("a11", &l1));
    let foreign = attach(&mut graph, a, tile_in("foreign", &l2));

    let removed = Reclaimer::default()
        .remove_children_and_cleanup_recursively(&mut graph, &l1, n)
        .unwrap();

    assert_eq!(removed, vec![a]);
    for id in [a, a1, a11] {
        assert!(is_released(&graph, id));
    }
    assert!(is_untouched(&graph, foreign));
    assert_eq!(graph.children(a).unwrap(), &[foreign]);
    assert!(graph.children(a1).unwrap().is_empty());
    assert_eq!(disposed_nodes(&mut graph), vec![a11, a1, a]);
}

#[test]
fn should_cleanup_linked_node_of_layer_without_moving_it() {
    let l1 = Layer::new("l1");
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let n = attach(&mut graph, root, SceneNode::plain("n"));
    let a = attach(&mut graph, n, tile_in("a", &l1));
    let elsewhere = attach(&mut graph, root, SceneNode::plain("elsewhere"));
    let b = attach(&mut graph, elsewhere, tile_in("b", &l1));
    graph.add_link(a, b).unwrap();

    Reclaimer::default()
        .remove_children_and_cleanup_recursively(&mut graph, &l1, n)
        .unwrap();

    assert!(is_released(&graph, b));
    assert_eq!(graph.parent(b).unwrap(), Some(elsewhere));
}

#[test]
fn should_report_links_of_the_start_node() {
    let l1 = Layer::new("l1");
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let n = attach(&mut graph, root, SceneNode::plain("n"));
    let a = attach(&mut graph, n, tile_in("a", &l1));
    let linked = graph.insert(tile("linked"));
    graph.add_link(n, linked).unwrap();
    graph.add_link(n, a).unwrap();

    let removed = Reclaimer::default()
        .remove_children_and_cleanup_recursively(&mut graph, &l1, n)
        .unwrap();

    assert_eq!(removed, vec![a, linked]);
    assert!(is_untouched(&graph, linked));
}

#[test]
fn should_cleanup_start_node_by_id_when_recursing() {
    let l1 = Layer::new("l1");
    let l1_twin = Layer::new("l1");
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let n = attach(&mut graph, root, tile_in("n", &l1_twin));

    Reclaimer::default()
        .remove_children_and_cleanup_recursively(&mut graph, &l1, n)
        .unwrap();

    assert!(is_released(&graph, n));
}

#[test]
fn should_terminate_on_link_cycles() {
    let l1 = Layer::new("l1");
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let n = attach(&mut graph, root, SceneNode::plain("n"));
    let a = attach(&mut graph, n, tile_in("a", &l1));
    let b = attach(&mut graph, n, tile_in("b", &l1));
    graph.add_link(a, b).unwrap();
    graph.add_link(b, a).unwrap();

    let removed = Reclaimer::default()
        .remove_children_and_cleanup_recursively(&mut graph, &l1, n)
        .unwrap();

    assert_eq!(removed, vec![a, b]);
    assert!(is_released(&graph, a));
    assert!(is_released(&graph, b));
    assert_eq!(disposed_nodes(&mut graph).len(), 2);
}

#[test]
fn should_release_every_resource_of_a_node_once() {
    let l1 = Layer::new("l1");
    let mut graph = SceneGraph::new();
    let node = graph.insert(tile_in("node", &l1));
    let reclaimer = Reclaimer::default();

    reclaimer.cleanup(&mut graph, node).unwrap();

    assert!(is_released(&graph, node));
    assert!(graph.node(node).unwrap().layer.is_none());
    // the released geometry stays on the node
    let resources = graph.node(node).unwrap().resources().unwrap();
    assert!(resources.geometry.as_ref().unwrap().is_released());

    let second = reclaimer.cleanup(&mut graph, node);
    assert!(second.is_err());
    assert!(format!("{:#}", second.unwrap_err()).contains("already released"));
}

#[test]
fn should_release_each_material_of_a_list() {
    let mut graph = SceneGraph::new();
    let node = graph.insert(SceneNode::with_resources(
        "multi",
        Resources::new()
            .with_geometry(triangle("multi geometry"))
            .with_materials(vec![
                textured_material("first"),
                Material::new("second"),
                textured_material("third"),
            ]),
    ));

    Reclaimer::default().cleanup(&mut graph, node).unwrap();

    let resources = graph.node(node).unwrap().resources().unwrap();
    assert_eq!(resources.materials().count(), 3);
    assert!(is_released(&graph, node));
}

#[test]
fn should_fail_on_empty_material_list() {
    let mut graph = SceneGraph::new();
    let node = graph.insert(SceneNode::with_resources(
        "broken",
        Resources::new().with_materials(Vec::new()),
    ));

    assert!(Reclaimer::default().cleanup(&mut graph, node).is_err());
}

#[test]
fn should_delegate_to_disposable_nodes() {
    let l1 = Layer::new("l1");
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let (quiet, quiet_count) = DisposeCounter::new(false);
    let (loud, loud_count) = DisposeCounter::new(true);
    let n = attach(&mut graph, root, SceneNode::plain("n"));
    let q = attach(&mut graph, n, SceneNode::disposable("quiet", Box::new(quiet)).in_layer(&l1));
    let l = attach(&mut graph, n, SceneNode::disposable("loud", Box::new(loud)).in_layer(&l1));

    let removed = Reclaimer::default()
        .remove_children_and_cleanup_recursively(&mut graph, &l1, n)
        .unwrap();

    assert_eq!(removed, vec![q, l]);
    assert_eq!(quiet_count.get(), 1);
    assert_eq!(loud_count.get(), 1);
    assert!(graph.node(q).unwrap().layer.is_none());
    assert!(graph.node(l).unwrap().layer.is_none());
    // only the node that announces itself shows up
    assert_eq!(disposed_nodes(&mut graph), vec![l]);
}

#[test]
fn should_release_scene_root_explicitly() {
    let mut graph = SceneGraph::new();
    let root = graph.root();
    graph.node_mut(root).unwrap().kind =
        NodeKind::SceneRoot(Resources::new().with_geometry(triangle("sky")));

    Reclaimer::default().cleanup(&mut graph, root).unwrap();

    let resources = graph.node(root).unwrap().resources().unwrap();
    assert!(resources.geometry.as_ref().unwrap().is_released());
    assert_eq!(disposed_nodes(&mut graph), vec![root]);
}

#[test]
fn should_fail_for_nodes_outside_the_graph() {
    let l1 = Layer::new("l1");
    let mut graph = SceneGraph::new();
    let loose = graph.insert(SceneNode::plain("loose"));
    graph.prune(loose).unwrap();

    let reclaimer = Reclaimer::default();
    assert!(reclaimer.remove_children(&mut graph, &l1, loose).is_err());
    assert!(reclaimer.cleanup(&mut graph, loose).is_err());
}

#[test]
fn should_leave_other_layers_loaded() {
    let (l1, l2): (Arc<Layer>, Arc<Layer>) = (Layer::new("l1"), Layer::new("l2"));
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let tiles: Vec<_> = (0..4)
        .map(|i| {
            let layer = if i % 2 == 0 { &l1 } else { &l2 };
            attach(&mut graph, root, tile_in(&format!("tile {}", i), layer))
        })
        .collect();

    let removed = Reclaimer::default()
        .remove_children_and_cleanup_recursively(&mut graph, &l1, root)
        .unwrap();

    assert_eq!(removed, vec![tiles[0], tiles[2]]);
    assert_eq!(graph.children(root).unwrap(), &[tiles[1], tiles[3]]);
    assert!(is_untouched(&graph, tiles[1]));
    assert!(is_untouched(&graph, tiles[3]));
    // the root is not in l1 and keeps its (empty) resources
    assert!(graph.node(root).unwrap().is_scene_root());
}

#[test]
fn should_not_grow_arena_over_repeated_unloads() {
    let l1 = Layer::new("l1");
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let reclaimer = Reclaimer::default();

    for round in 0..3 {
        let a = attach(&mut graph, root, tile_in("a", &l1));
        let b = attach(&mut graph, a, tile_in("b", &l1));
        attach(&mut graph, b, tile_in("c", &l1));
        assert_eq!(graph.len(), 4, "round {}", round);

        let removed = reclaimer
            .remove_children_and_cleanup_recursively(&mut graph, &l1, root)
            .unwrap();
        assert_eq!(removed, vec![a]);
        // b and c were detached from their parents while a was torn down
        assert_eq!(graph.prune(a).unwrap(), 3);
        assert_eq!(graph.len(), 1, "round {}", round);
    }
}

#[test]
fn should_sweep_everything_detached_by_a_reclaim() {
    let (l1, l2) = (Layer::new("l1"), Layer::new("l2"));
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let n = attach(&mut graph, root, SceneNode::plain("n"));
    let a = attach(&mut graph, n, tile_in("a", &l1));
    attach(&mut graph, a, tile_in("a1", &l1));
    let kept = attach(&mut graph, n, tile_in("kept", &l2));

    Reclaimer::default()
        .remove_children_and_cleanup_recursively(&mut graph, &l1, n)
        .unwrap();

    assert_eq!(graph.prune_detached().unwrap(), 2);
    assert_eq!(graph.children(n).unwrap(), &[kept]);
    assert_eq!(graph.len(), 3);
    assert_eq!(graph.prune_detached().unwrap(), 0);
}
