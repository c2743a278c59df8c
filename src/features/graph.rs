use std::collections::{HashMap, HashSet};

use petgraph::graph::{NodeIndex, UnGraph};

use crate::features::{FeatureKind, FeatureMap};
use crate::grid::Mesh;

/// Граф смежности объектов: вершина — id объекта, ребро — общая граница.
pub fn build_feature_graph(mesh: &Mesh, map: &FeatureMap) -> UnGraph<usize, ()> {
    let mut graph = UnGraph::new_undirected();
    let mut id_to_node = HashMap::new();
    for feature in &map.features {
        id_to_node.insert(feature.id, graph.add_node(feature.id));
    }

    let mut edges = HashSet::new();
    for (cell, neighbors) in mesh.cells.neighbors.iter().enumerate() {
        let id = map.ids[cell];
        for &n in neighbors {
            let n_id = map.ids[n];
            if n_id == id {
                continue;
            }
            let (a, b) = if id < n_id { (id, n_id) } else { (n_id, id) };
            if edges.insert((a, b)) {
                graph.add_edge(id_to_node[&a], id_to_node[&b], ());
            }
        }
    }
    graph
}

/// Острова, все соседи которых — озёра.
pub fn lake_locked_islands(graph: &UnGraph<usize, ()>, map: &FeatureMap) -> HashSet<usize> {
    graph
        .node_indices()
        .filter(|&node| map.feature(graph[node]).kind == FeatureKind::Island)
        .filter(|&node| {
            let mut neighbors = graph.neighbors(node).peekable();
            neighbors.peek().is_some()
                && neighbors.all(|n: NodeIndex| map.feature(graph[n]).kind == FeatureKind::Lake)
        })
        .map(|node| graph[node])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::markup_grid;
    use crate::grid::Grid;
    use crate::random::rng_from_seed;

    #[test]
    fn island_touches_ocean_only() {
        let mut rng = rng_from_seed("graph");
        let grid = Grid::generate(800.0, 600.0, 1000, &mut rng).unwrap();
        let heights: Vec<u8> = grid
            .mesh
            .cells
            .points
            .iter()
            .map(|p| if (p.x - 400.0).hypot(p.y - 300.0) < 150.0 { 50 } else { 0 })
            .collect();
        let map = markup_grid(&grid.mesh, &heights);
        let graph = build_feature_graph(&grid.mesh, &map);

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert!(lake_locked_islands(&graph, &map).is_empty());
    }
}
