use super::support::{memory_group, path, tree, version};
use foldsync::graph::Graph;
use foldsync::FileReference;

#[test]
fn test_restored_version_unrolls_into_acyclic_graph() {
    let group = memory_group();
    let laptop = group.create_history("laptop").unwrap();
    let desktop = group.create_history("desktop").unwrap();

    for secs in [0, 1, 2, 1] {
        laptop.create_snapshot(&tree(&[("/f", secs, 8)])).unwrap();
    }
    desktop.create_snapshot(&tree(&[("/f", 0, 8)])).unwrap();
    desktop.create_snapshot(&tree(&[("/other", 5, 1)])).unwrap();

    let graph = group.file_change_graph(&path("/f")).unwrap();
    // v1 is shared by both of its appearances; v0 by both histories
    assert_eq!(graph.len(), 4);
    let v1 = graph.find(&Some(version("/f", 1, 8))).unwrap();
    let v2 = graph.find(&Some(version("/f", 2, 8))).unwrap();
    assert_eq!(graph.successors(v2), &[v1]);

    let acyclic = graph.to_acyclic();
    let values: Vec<Option<FileReference>> = acyclic.values().cloned().collect();
    assert_eq!(
        values,
        vec![
            Some(version("/f", 0, 8)),
            Some(version("/f", 1, 8)),
            Some(version("/f", 2, 8)),
            Some(version("/f", 1, 8)),
            None,
        ]
    );
    let copy = acyclic.node_ids().nth(3).unwrap();
    assert!(acyclic.successors(copy).is_empty());
}

#[test]
fn test_path_never_present_gives_empty_graph() {
    let group = memory_group();
    let laptop = group.create_history("laptop").unwrap();
    laptop.create_snapshot(&tree(&[("/a", 1, 1)])).unwrap();

    let graph: Graph<Option<FileReference>> = group.file_change_graph(&path("/missing")).unwrap();
    assert!(graph.is_empty());
    assert!(graph.to_acyclic().is_empty());
}
