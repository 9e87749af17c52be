use super::element::Element;
use crate::core::error::ConstructionError;
use nalgebra::Point3;
use std::collections::VecDeque;

pub const DEFAULT_BOND_SCALE_FACTOR: f64 = 1.2;

/// Undirected covalent bond graph over atom indices.
///
/// The edge list is sorted, deduplicated and stores every bond as `(i, j)` with `i < j`.
/// The adjacency index is built once at construction; the graph is never edited in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BondGraph {
    natoms: usize,
    edges: Vec<(usize, usize)>,
    adjacency: Vec<Vec<usize>>,
}

impl BondGraph {
    /// Perceives bonds with the default scale factor of 1.2.
    pub fn build(
        elements: &[Element],
        positions: &[Point3<f64>],
    ) -> Result<Self, ConstructionError> {
        Self::build_with_scale(elements, positions, DEFAULT_BOND_SCALE_FACTOR)
    }

    /// Connects `i` and `j` when their distance (Å) is below
    /// `scale * (r_i + r_j)` with `r` the covalent radii.
    pub fn build_with_scale(
        elements: &[Element],
        positions: &[Point3<f64>],
        scale: f64,
    ) -> Result<Self, ConstructionError> {
        if elements.len() != positions.len() {
            return Err(ConstructionError::LengthMismatch {
                elements: elements.len(),
                positions: positions.len(),
            });
        }
        if elements.is_empty() {
            return Err(ConstructionError::EmptyAtomSet);
        }

        let natoms = elements.len();
        let mut edges = Vec::new();
        for i in 0..natoms {
            let ri = elements[i].covalent_radius();
            for j in (i + 1)..natoms {
                let threshold = scale * (ri + elements[j].covalent_radius());
                if nalgebra::distance(&positions[i], &positions[j]) < threshold {
                    edges.push((i, j));
                }
            }
        }
        Ok(Self::assemble(natoms, edges))
    }

    /// Builds a graph from an explicit bond list. Edges are normalised to `(min, max)`
    /// and duplicates or self loops are dropped.
    pub fn from_edges(natoms: usize, edges: &[(usize, usize)]) -> Result<Self, ConstructionError> {
        if natoms == 0 {
            return Err(ConstructionError::EmptyAtomSet);
        }
        let mut normalized = Vec::with_capacity(edges.len());
        for &(a, b) in edges {
            for index in [a, b] {
                if index >= natoms {
                    return Err(ConstructionError::AtomIndexOutOfRange { index, natoms });
                }
            }
            if a != b {
                normalized.push((a.min(b), a.max(b)));
            }
        }
        Ok(Self::assemble(natoms, normalized))
    }

    fn assemble(natoms: usize, mut edges: Vec<(usize, usize)>) -> Self {
        edges.sort_unstable();
        edges.dedup();
        let mut adjacency = vec![Vec::new(); natoms];
        for &(i, j) in &edges {
            adjacency[i].push(j);
            adjacency[j].push(i);
        }
        for list in &mut adjacency {
            list.sort_unstable();
        }
        Self {
            natoms,
            edges,
            adjacency,
        }
    }

    #[inline]
    pub fn natoms(&self) -> usize {
        self.natoms
    }

    #[inline]
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    /// Sorted neighbour indices of `atom`. Out-of-range indices have no neighbours.
    pub fn neighbors(&self, atom: usize) -> &[usize] {
        self.adjacency.get(atom).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn degree(&self, atom: usize) -> usize {
        self.neighbors(atom).len()
    }

    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        self.edges.binary_search(&(a.min(b), a.max(b))).is_ok()
    }

    /// Connected components, each sorted ascending, ordered by their lowest atom index.
    pub fn fragments(&self) -> Vec<Vec<usize>> {
        let mut visited = vec![false; self.natoms];
        let mut fragments = Vec::new();
        for start in 0..self.natoms {
            if visited[start] {
                continue;
            }
            visited[start] = true;
            let mut component = vec![start];
            let mut queue = VecDeque::from([start]);
            while let Some(current) = queue.pop_front() {
                for &next in &self.adjacency[current] {
                    if !visited[next] {
                        visited[next] = true;
                        component.push(next);
                        queue.push_back(next);
                    }
                }
            }
            component.sort_unstable();
            fragments.push(component);
        }
        fragments
    }

    /// Graphviz rendering with nodes labelled `symbol + index`.
    pub fn to_dot(&self, elements: &[Element]) -> String {
        let nodes = (0..self.natoms).map(|i| {
            let label = elements
                .get(i)
                .map(|e| format!("{}{}", e.symbol(), i))
                .unwrap_or_else(|| i.to_string());
            format!("  {} [label=\"{}\"];\n", i, label)
        });
        let edges = self.edges.iter().map(|&(i, j)| format!("  {} -- {};\n", i, j));

        let mut out = String::from("graph molecule {\n");
        out.extend(nodes);
        out.extend(edges);
        out.push_str("}\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn water() -> (Vec<Element>, Vec<Point3<f64>>) {
        (
            vec![Element::OXYGEN, Element::HYDROGEN, Element::HYDROGEN],
            vec![
                Point3::new(0.0, 0.0, 0.1173),
                Point3::new(0.0, 0.7572, -0.4692),
                Point3::new(0.0, -0.7572, -0.4692),
            ],
        )
    }

    #[test]
    fn water_has_two_oh_bonds_and_no_hh_bond() {
        let (elements, positions) = water();
        let graph = BondGraph::build(&elements, &positions).unwrap();
        assert_eq!(graph.edges(), &[(0, 1), (0, 2)]);
        assert!(!graph.has_edge(1, 2));
        assert_eq!(graph.degree(0), 2);
        assert_eq!(graph.neighbors(1), &[0]);
    }

    #[test]
    fn carbon_dioxide_is_a_linear_chain() {
        let elements = vec![Element::OXYGEN, Element::CARBON, Element::OXYGEN];
        let positions = vec![
            Point3::new(-1.16, 0.0, 0.0),
            Point3::origin(),
            Point3::new(1.16, 0.0, 0.0),
        ];
        let graph = BondGraph::build(&elements, &positions).unwrap();
        assert_eq!(graph.edges(), &[(0, 1), (1, 2)]);
        assert_eq!(graph.fragments(), vec![vec![0, 1, 2]]);
    }

    #[test]
    fn adjacency_is_symmetric() {
        let (elements, positions) = water();
        let graph = BondGraph::build(&elements, &positions).unwrap();
        for i in 0..graph.natoms() {
            for &j in graph.neighbors(i) {
                assert!(graph.neighbors(j).contains(&i));
                assert!(graph.has_edge(j, i));
            }
        }
    }

    #[test]
    fn bonding_does_not_depend_on_atom_order() {
        let (elements, positions) = water();
        let graph = BondGraph::build(&elements, &positions).unwrap();

        let order = [2usize, 0, 1];
        let perm_elements: Vec<_> = order.iter().map(|&i| elements[i]).collect();
        let perm_positions: Vec<_> = order.iter().map(|&i| positions[i]).collect();
        let permuted = BondGraph::build(&perm_elements, &perm_positions).unwrap();

        for a in 0..3 {
            for b in 0..3 {
                assert_eq!(
                    graph.has_edge(order[a], order[b]),
                    permuted.has_edge(a, b),
                    "pair ({a}, {b})"
                );
            }
        }
    }

    #[test]
    fn distant_atoms_form_separate_fragments() {
        let elements = vec![Element::HYDROGEN, Element::HYDROGEN, Element::CARBON];
        let positions = vec![
            Point3::origin(),
            Point3::new(0.74, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
        ];
        let graph = BondGraph::build(&elements, &positions).unwrap();
        assert_eq!(graph.fragments(), vec![vec![0, 1], vec![2]]);
        assert!(graph.neighbors(2).is_empty());
    }

    #[test]
    fn scale_factor_controls_bond_cutoff() {
        let elements = vec![Element::CARBON, Element::CARBON];
        let positions = vec![Point3::origin(), Point3::new(1.9, 0.0, 0.0)];
        assert!(BondGraph::build(&elements, &positions).unwrap().edges().is_empty());
        let loose = BondGraph::build_with_scale(&elements, &positions, 1.3).unwrap();
        assert_eq!(loose.edges(), &[(0, 1)]);
    }

    #[test]
    fn build_rejects_mismatched_and_empty_input() {
        assert_eq!(
            BondGraph::build(&[Element::CARBON], &[]).unwrap_err(),
            ConstructionError::LengthMismatch {
                elements: 1,
                positions: 0
            }
        );
        assert_eq!(
            BondGraph::build(&[], &[]).unwrap_err(),
            ConstructionError::EmptyAtomSet
        );
    }

    #[test]
    fn from_edges_normalizes_and_validates() {
        let graph = BondGraph::from_edges(4, &[(1, 0), (0, 1), (2, 3), (3, 3)]).unwrap();
        assert_eq!(graph.edges(), &[(0, 1), (2, 3)]);

        let err = BondGraph::from_edges(3, &[(0, 5)]).unwrap_err();
        assert_eq!(
            err,
            ConstructionError::AtomIndexOutOfRange {
                index: 5,
                natoms: 3
            }
        );
    }

    #[test]
    fn to_dot_lists_labelled_nodes_and_edges() {
        let (elements, positions) = water();
        let graph = BondGraph::build(&elements, &positions).unwrap();
        let dot = graph.to_dot(&elements);
        assert!(dot.starts_with("graph molecule {"));
        assert!(dot.contains("0 [label=\"O0\"];"));
        assert!(dot.contains("0 -- 2;"));
        assert!(!dot.contains("1 -- 2;"));
    }
}
