//! The requests a page source sends to an item store

use super::values::{Record, ResumeKey, Scalar};

/// A condition on the range key of a partition
#[derive(Debug, Clone, PartialEq)]
pub enum RangeCondition {
    /// The range key equals a value
    Eq(Scalar),
    /// The range key is less than a value
    Lt(Scalar),
    /// The range key is less than or equal to a value
    Le(Scalar),
    /// The range key is greater than a value
    Gt(Scalar),
    /// The range key is greater than or equal to a value
    Ge(Scalar),
    /// The range key is within an inclusive range
    Between(Scalar, Scalar),
    /// The range key is a string starting with a prefix
    BeginsWith(String),
}

impl RangeCondition {
    /// Check if a range key value satisfies this condition
    ///
    /// # Arguments
    ///
    /// * `value` - The range key value to check
    #[must_use]
    pub fn matches(&self, value: &Scalar) -> bool {
        match self {
            RangeCondition::Eq(target) => value == target,
            RangeCondition::Lt(target) => value < target,
            RangeCondition::Le(target) => value <= target,
            RangeCondition::Gt(target) => value > target,
            RangeCondition::Ge(target) => value >= target,
            RangeCondition::Between(low, high) => low <= value && value <= high,
            RangeCondition::BeginsWith(prefix) => value
                .as_str()
                .is_some_and(|value| value.starts_with(prefix.as_str())),
        }
    }
}

/// A filter applied to rows after they are read
///
/// Filtered rows still count against a page, so a page may come back empty
/// while the store still has more rows to evaluate.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// A field equals a value
    Equals(String, Scalar),
    /// A field is present
    Exists(String),
    /// A field is absent
    NotExists(String),
    /// A string field starts with a prefix
    BeginsWith(String, String),
}

impl Filter {
    /// Check if a record passes this filter
    ///
    /// # Arguments
    ///
    /// * `record` - The record to check
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::Equals(field, value) => record.get(field) == Some(value),
            Filter::Exists(field) => record.contains(field),
            Filter::NotExists(field) => !record.contains(field),
            Filter::BeginsWith(field, prefix) => record
                .get(field)
                .and_then(Scalar::as_str)
                .is_some_and(|value| value.starts_with(prefix.as_str())),
        }
    }
}

/// Check a record against a list of filters
///
/// # Arguments
///
/// * `filters` - The filters that must all pass
/// * `record` - The record to check
#[must_use]
pub fn passes(filters: &[Filter], record: &Record) -> bool {
    filters.iter().all(|filter| filter.matches(record))
}

/// A query over the rows of a single partition
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// The table to query
    pub table: String,
    /// The hash key value of the partition to read
    pub hash_value: Scalar,
    /// An optional condition on the range key
    pub range: Option<RangeCondition>,
    /// Filters to apply to rows after they are read
    pub filters: Vec<Filter>,
    /// The most rows to evaluate per page, the store default when unset
    pub page_size: Option<usize>,
    /// Whether to walk the partition in ascending range key order
    pub scan_forward: bool,
}

impl QueryRequest {
    /// Build a query over one partition
    ///
    /// # Arguments
    ///
    /// * `table` - The table to query
    /// * `hash_value` - The hash key value of the partition to read
    pub fn new<T: Into<String>, H: Into<Scalar>>(table: T, hash_value: H) -> Self {
        QueryRequest {
            table: table.into(),
            hash_value: hash_value.into(),
            range: None,
            filters: Vec::default(),
            page_size: None,
            scan_forward: true,
        }
    }

    /// Only return rows whose range key matches a condition
    #[must_use]
    pub fn range(mut self, condition: RangeCondition) -> Self {
        self.range = Some(condition);
        self
    }

    /// Add a filter to this query
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Set the most rows to evaluate per page
    #[must_use]
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Walk the partition in descending range key order
    #[must_use]
    pub fn reverse(mut self) -> Self {
        self.scan_forward = false;
        self
    }
}

/// A scan over every row of a table
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    /// The table to scan
    pub table: String,
    /// Filters to apply to rows after they are read
    pub filters: Vec<Filter>,
    /// The most rows to evaluate per page, the store default when unset
    pub page_size: Option<usize>,
}

impl ScanRequest {
    /// Build a scan over a table
    ///
    /// # Arguments
    ///
    /// * `table` - The table to scan
    pub fn new<T: Into<String>>(table: T) -> Self {
        ScanRequest {
            table: table.into(),
            filters: Vec::default(),
            page_size: None,
        }
    }

    /// Add a filter to this scan
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Set the most rows to evaluate per page
    #[must_use]
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }
}

/// A request for an explicit set of keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchGetRequest {
    /// The table to read from
    pub table: String,
    /// The keys to resolve
    pub keys: Vec<ResumeKey>,
}

impl BatchGetRequest {
    /// Build a batch get request
    ///
    /// # Arguments
    ///
    /// * `table` - The table to read from
    /// * `keys` - The keys to resolve
    pub fn new<T: Into<String>>(table: T, keys: Vec<ResumeKey>) -> Self {
        BatchGetRequest {
            table: table.into(),
            keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{passes, Filter, RangeCondition};
    use crate::shared::values::{Record, Scalar};

    #[test]
    fn range_conditions() {
        let value = Scalar::number(5);
        assert!(RangeCondition::Eq(Scalar::number(5)).matches(&value));
        assert!(RangeCondition::Lt(Scalar::number(10)).matches(&value));
        assert!(!RangeCondition::Gt(Scalar::number(5)).matches(&value));
        assert!(RangeCondition::Ge(Scalar::number(5)).matches(&value));
        assert!(RangeCondition::Between(Scalar::number(1), Scalar::number(5)).matches(&value));
        // prefixes only apply to strings
        assert!(!RangeCondition::BeginsWith("5".into()).matches(&value));
        assert!(RangeCondition::BeginsWith("H_".into()).matches(&Scalar::from("H_3")));
    }

    #[test]
    fn filters_all_have_to_pass() {
        let record = Record::new().with("kind", "fish").with("name", "carp");
        let filters = vec![
            Filter::Equals("kind".into(), "fish".into()),
            Filter::Exists("name".into()),
            Filter::NotExists("legs".into()),
            Filter::BeginsWith("name".into(), "ca".into()),
        ];
        assert!(passes(&filters, &record));
        assert!(!passes(&[Filter::Exists("legs".into())], &record));
        assert!(passes(&[], &record));
    }
}
