//! A partition is a collection of rows accessible by one hash key value

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::shared::values::{Record, Scalar};

/// The rows sharing one hash key value ordered by their range key
#[derive(Debug, Default)]
pub struct Partition {
    /// The rows in this partition keyed by range value
    rows: BTreeMap<Scalar, Record>,
}

impl Partition {
    /// Add a row to this partition, returning any row it replaced
    ///
    /// # Arguments
    ///
    /// * `range` - The range value of this row
    /// * `row` - The row to insert
    pub fn insert(&mut self, range: Scalar, row: Record) -> Option<Record> {
        self.rows.insert(range, row)
    }

    /// Get a single row
    ///
    /// # Arguments
    ///
    /// * `range` - The range value of the row to get
    pub fn get(&self, range: &Scalar) -> Option<&Record> {
        self.rows.get(range)
    }

    /// Remove a single row
    ///
    /// # Arguments
    ///
    /// * `range` - The range value of the row to remove
    pub fn remove(&mut self, range: &Scalar) -> Option<Record> {
        self.rows.remove(range)
    }

    /// The number of rows in this partition
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether this partition has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Walk the rows after an exclusive start in either direction
    ///
    /// # Arguments
    ///
    /// * `start` - The range value to continue after
    /// * `forward` - Whether to walk in ascending range order
    pub fn after<'a>(
        &'a self,
        start: Option<&'a Scalar>,
        forward: bool,
    ) -> Box<dyn Iterator<Item = (&'a Scalar, &'a Record)> + 'a> {
        // only one side is ever bounded so this range can't be inverted
        let (lower, upper) = match (start, forward) {
            (Some(start), true) => (Bound::Excluded(start), Bound::Unbounded),
            (Some(start), false) => (Bound::Unbounded, Bound::Excluded(start)),
            (None, _) => (Bound::Unbounded, Bound::Unbounded),
        };
        let rows = self.rows.range::<Scalar, _>((lower, upper));
        if forward {
            Box::new(rows)
        } else {
            Box::new(rows.rev())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Partition;
    use crate::shared::values::{Record, Scalar};

    fn partition() -> Partition {
        let mut partition = Partition::default();
        for n in [3, 1, 10, 2] {
            partition.insert(Scalar::from(n), Record::new().with("sk", n));
        }
        partition
    }

    fn walk(partition: &Partition, start: Option<&Scalar>, forward: bool) -> Vec<String> {
        partition
            .after(start, forward)
            .map(|(range, _)| range.to_string())
            .collect()
    }

    #[test]
    fn walks_in_numeric_order() {
        let partition = partition();
        assert_eq!(walk(&partition, None, true), ["1", "2", "3", "10"]);
        assert_eq!(walk(&partition, None, false), ["10", "3", "2", "1"]);
    }

    #[test]
    fn starts_are_exclusive() {
        let partition = partition();
        let start = Scalar::from(2);
        assert_eq!(walk(&partition, Some(&start), true), ["3", "10"]);
        assert_eq!(walk(&partition, Some(&start), false), ["1"]);
        // starts that are not stored still bound the walk
        let start = Scalar::from(5);
        assert_eq!(walk(&partition, Some(&start), true), ["10"]);
    }
}
