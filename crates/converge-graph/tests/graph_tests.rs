use converge_graph::DependencyGraph;
use proptest::prelude::*;

/// Build a graph whose edges only go from lower to higher node numbers,
/// which can never contain a cycle.
fn forward_only(node_count: usize, edges: &[(usize, usize)]) -> DependencyGraph<usize> {
    let mut deps = DependencyGraph::new();
    for n in 0..node_count {
        deps.add_node(n);
    }
    for &(a, b) in edges {
        let (a, b) = (a % node_count, b % node_count);
        if a < b {
            deps.add_edge(a, Some(b));
        }
    }
    deps
}

fn position(order: &[usize], node: usize) -> usize {
    order.iter().position(|&n| n == node).unwrap()
}

proptest! {
    #[test]
    fn prop_acyclic_graph_orders_every_edge(
        node_count in 1..25usize,
        edges in proptest::collection::vec((0..25usize, 0..25usize), 0..60)
    ) {
        let deps = forward_only(node_count, &edges);
        let order = deps.topological_order().unwrap();

        prop_assert_eq!(order.len(), node_count);
        for (from, to) in deps.edges() {
            prop_assert!(position(&order, from) < position(&order, to));
        }
    }

    #[test]
    fn prop_reverse_order_is_exact_reverse(
        node_count in 1..25usize,
        edges in proptest::collection::vec((0..25usize, 0..25usize), 0..60)
    ) {
        let deps = forward_only(node_count, &edges);
        let mut forward = deps.topological_order().unwrap();
        forward.reverse();

        prop_assert_eq!(forward, deps.reverse_topological_order().unwrap());
    }

    #[test]
    fn prop_leaves_have_no_prerequisites(
        node_count in 1..25usize,
        edges in proptest::collection::vec((0..25usize, 0..25usize), 0..60)
    ) {
        let deps = forward_only(node_count, &edges);
        let validated = deps.clone().into_validated().unwrap();

        for leaf in validated.leaves() {
            prop_assert!(deps.requires(&leaf).is_empty());
        }
        // The first node of a build order is always a leaf
        prop_assert!(validated.leaves().contains(&validated.order()[0]));
    }

    #[test]
    fn prop_back_edge_creates_cycle(
        node_count in 2..25usize,
        edges in proptest::collection::vec((0..25usize, 0..25usize), 0..60)
    ) {
        let mut deps = forward_only(node_count, &edges);
        // Close a loop through a chain that spans the whole graph
        for n in 0..node_count - 1 {
            deps.add_edge(n, Some(n + 1));
        }
        deps.add_edge(node_count - 1, Some(0));

        let err = deps.validate().unwrap_err();
        prop_assert!(err.involves("0"));
        prop_assert!(err.involves(&(node_count - 1).to_string()));
    }

    #[test]
    fn prop_merge_order_does_not_matter(
        left_edges in proptest::collection::vec((0..15usize, 0..15usize), 0..30),
        right_edges in proptest::collection::vec((0..15usize, 0..15usize), 0..30)
    ) {
        let left = forward_only(15, &left_edges);
        let right = forward_only(15, &right_edges);

        let mut a = left.clone();
        a.merge(&right);
        let mut b = right;
        b += left;

        prop_assert_eq!(a.nodes(), b.nodes());
        prop_assert_eq!(a.edges(), b.edges());
        prop_assert_eq!(a.topological_order().unwrap(), b.topological_order().unwrap());
    }
}

#[test]
fn test_equal_candidates_follow_ord() {
    let mut deps = DependencyGraph::new();
    for name in ["delta", "alpha", "charlie", "bravo"] {
        deps.add_node(name.to_string());
    }

    assert_eq!(
        deps.topological_order().unwrap(),
        vec!["alpha", "bravo", "charlie", "delta"]
    );
}

#[test]
fn test_any_valid_order_respects_dependencies() {
    // Two independent chains: only intra-chain order is fixed
    let mut deps = DependencyGraph::new();
    deps.add_edge("db".to_string(), Some("app".to_string()));
    deps.add_edge("net".to_string(), Some("lb".to_string()));

    let order = deps.topological_order().unwrap();
    let at = |name: &str| order.iter().position(|n| n == name).unwrap();

    assert!(at("db") < at("app"));
    assert!(at("net") < at("lb"));
    assert_eq!(order.len(), 4);
}
