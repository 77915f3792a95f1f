use crate::flow::Flow;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Bfs;
use std::collections::BTreeSet;

/// Builds the menu graph: an edge for every way a call can move into another menu.
pub(crate) fn menu_graph<'a>(flow: &'a Flow, root: &'a str) -> DiGraphMap<&'a str, ()> {
    let mut graph = DiGraphMap::new();
    for id in flow.menus.keys() {
        graph.add_node(id.as_str());
    }
    for (id, menu) in &flow.menus {
        let targets = menu
            .options
            .values()
            .chain(std::iter::once(&menu.fallback_action))
            .filter_map(|action| action.menu_target());
        for target in targets {
            if flow.menus.contains_key(target) {
                graph.add_edge(id.as_str(), target, ());
            }
        }
    }
    // After-hours preempts entry into any menu, so its target hangs off the root.
    if let Some(target) = flow.after_hours.as_ref().and_then(|a| a.menu_target()) {
        if flow.menus.contains_key(target) {
            graph.add_edge(root, target, ());
        }
    }
    graph
}

/// Menus that cannot be reached from the root, in id order. Cycles are fine.
pub(crate) fn unreachable_menus(flow: &Flow, root: &str) -> Vec<String> {
    let graph = menu_graph(flow, root);
    if !graph.contains_node(root) {
        return Vec::new();
    }
    let mut reached = BTreeSet::new();
    let mut bfs = Bfs::new(&graph, root);
    while let Some(node) = bfs.next(&graph) {
        reached.insert(node);
    }
    flow.menus
        .keys()
        .filter(|id| !reached.contains(id.as_str()))
        .cloned()
        .collect()
}
