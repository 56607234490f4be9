//! Splitting signed weights into excitatory and inhibitory connection lists

use ndarray::Array2;
use snnt_storage::{Connection, Receptor};

/// The two connection lists attached between one pair of adjacent populations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionLists {
    /// Connections with weight >= 0
    pub excitatory: Vec<Connection>,
    /// Connections with weight < 0
    pub inhibitory: Vec<Connection>,
}

impl ConnectionLists {
    /// Total number of connections across both lists
    pub fn len(&self) -> usize {
        self.excitatory.len() + self.inhibitory.len()
    }

    /// True when both lists are empty
    pub fn is_empty(&self) -> bool {
        self.excitatory.is_empty() && self.inhibitory.is_empty()
    }

    /// List routed to `receptor`
    pub fn for_receptor(&self, receptor: Receptor) -> &[Connection] {
        match receptor {
            Receptor::Excitatory => &self.excitatory,
            Receptor::Inhibitory => &self.inhibitory,
        }
    }
}

/// Split a dense weight matrix (rows = sources, columns = targets).
///
/// Cells are visited row-major, so both lists are ordered by source then
/// target. Zero weights are excitatory.
pub fn split_weights(weights: &Array2<f64>, delay: f64) -> ConnectionLists {
    let mut lists = ConnectionLists::default();
    for ((source, target), &weight) in weights.indexed_iter() {
        let conn = Connection::new(source, target, weight, delay);
        match conn.receptor() {
            Receptor::Excitatory => lists.excitatory.push(conn),
            Receptor::Inhibitory => lists.inhibitory.push(conn),
        }
    }
    lists
}

/// Partition an arbitrary connection list by weight sign, keeping order
pub fn partition_by_sign<I>(connections: I) -> ConnectionLists
where
    I: IntoIterator<Item = Connection>,
{
    let (excitatory, inhibitory) = connections
        .into_iter()
        .partition(|conn| conn.receptor() == Receptor::Excitatory);
    ConnectionLists {
        excitatory,
        inhibitory,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;

    fn tuples(conns: &[Connection]) -> Vec<(usize, usize, f64, f64)> {
        conns.iter().map(Connection::as_tuple).collect()
    }

    #[test]
    fn test_split_two_by_three() {
        let weights = array![[0.5, -0.2, 0.0], [-0.1, 0.3, 0.4]];
        let lists = split_weights(&weights, 1.0);

        assert_eq!(
            tuples(&lists.excitatory),
            vec![(0, 0, 0.5, 1.0), (0, 2, 0.0, 1.0), (1, 1, 0.3, 1.0), (1, 2, 0.4, 1.0)]
        );
        assert_eq!(
            tuples(&lists.inhibitory),
            vec![(0, 1, -0.2, 1.0), (1, 0, -0.1, 1.0)]
        );
    }

    #[test]
    fn test_all_zero_weights_are_excitatory() {
        let weights = Array2::<f64>::zeros((3, 4));
        let lists = split_weights(&weights, 2.0);
        assert_eq!(lists.excitatory.len(), 12);
        assert!(lists.inhibitory.is_empty());
        assert!(lists.excitatory.iter().all(|c| c.delay == 2.0));
    }

    #[test]
    fn test_empty_matrix() {
        let weights = Array2::<f64>::zeros((0, 5));
        let lists = split_weights(&weights, 1.0);
        assert!(lists.is_empty());
        assert_eq!(lists.len(), 0);
    }

    #[test]
    fn test_partition_keeps_order() {
        let conns = vec![
            Connection::new(4, 0, -1.0, 1.0),
            Connection::new(0, 1, 2.0, 1.0),
            Connection::new(2, 2, -3.0, 1.0),
            Connection::new(1, 3, 0.0, 1.0),
        ];
        let lists = partition_by_sign(conns);
        assert_eq!(tuples(lists.for_receptor(Receptor::Excitatory)), vec![(0, 1, 2.0, 1.0), (1, 3, 0.0, 1.0)]);
        assert_eq!(tuples(lists.for_receptor(Receptor::Inhibitory)), vec![(4, 0, -1.0, 1.0), (2, 2, -3.0, 1.0)]);
    }

    proptest! {
        #[test]
        fn prop_split_covers_every_cell(
            rows in 0usize..8,
            cols in 0usize..8,
            seed in proptest::collection::vec(-1.0f64..1.0, 64),
        ) {
            let weights = Array2::from_shape_fn((rows, cols), |(i, j)| seed[i * 8 + j]);
            let lists = split_weights(&weights, 1.0);

            prop_assert_eq!(lists.len(), rows * cols);
            prop_assert!(lists.excitatory.iter().all(|c| c.weight >= 0.0));
            prop_assert!(lists.inhibitory.iter().all(|c| c.weight < 0.0));

            let mut pairs: Vec<(usize, usize)> = lists
                .excitatory
                .iter()
                .chain(lists.inhibitory.iter())
                .map(|c| (c.source, c.target))
                .collect();
            pairs.sort_unstable();
            pairs.dedup();
            prop_assert_eq!(pairs.len(), rows * cols);
        }
    }
}
