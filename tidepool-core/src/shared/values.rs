//! The values that flow through a paged traversal

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A single tagged scalar value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scalar {
    /// A string value
    S(String),
    /// A number kept as its decimal text
    N(String),
    /// Raw bytes
    B(Vec<u8>),
    /// A boolean
    Bool(bool),
    /// An explicit null
    Null,
}

impl Scalar {
    /// Build a numeric scalar from anything that prints as a number
    ///
    /// # Arguments
    ///
    /// * `number` - The number to store
    pub fn number<N: fmt::Display>(number: N) -> Self {
        Scalar::N(number.to_string())
    }

    /// The short name for this scalars kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Scalar::S(_) => "S",
            Scalar::N(_) => "N",
            Scalar::B(_) => "B",
            Scalar::Bool(_) => "BOOL",
            Scalar::Null => "NULL",
        }
    }

    /// Get this scalar as a string if it is one
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::S(value) => Some(value),
            _ => None,
        }
    }

    /// Get this scalar as a float if it is numeric
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::N(text) => parse_number(text),
            _ => None,
        }
    }

    /// The rank used to order scalars of different kinds
    fn rank(&self) -> u8 {
        match self {
            Scalar::Null => 0,
            Scalar::Bool(_) => 1,
            Scalar::N(_) => 2,
            Scalar::S(_) => 3,
            Scalar::B(_) => 4,
        }
    }
}

/// Parse numeric text, rejecting anything that is not a finite number
///
/// # Arguments
///
/// * `text` - The text to parse
pub(crate) fn parse_number(text: &str) -> Option<f64> {
    match text.trim().parse::<f64>() {
        Ok(number) if number.is_finite() && text.trim() == text => Some(number),
        _ => None,
    }
}

impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            // numbers sort by value and fall back to their text so Ord agrees with Eq
            (Scalar::N(left), Scalar::N(right)) => {
                match (parse_number(left), parse_number(right)) {
                    (Some(l), Some(r)) => l.total_cmp(&r).then_with(|| left.cmp(right)),
                    _ => left.cmp(right),
                }
            }
            (Scalar::S(left), Scalar::S(right)) => left.cmp(right),
            (Scalar::B(left), Scalar::B(right)) => left.cmp(right),
            (Scalar::Bool(left), Scalar::Bool(right)) => left.cmp(right),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::S(value) => write!(f, "{value:?}"),
            Scalar::N(value) => write!(f, "{value}"),
            Scalar::B(value) => write!(f, "<{} bytes>", value.len()),
            Scalar::Bool(value) => write!(f, "{value}"),
            Scalar::Null => write!(f, "null"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::S(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::S(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<Vec<u8>> for Scalar {
    fn from(value: Vec<u8>) -> Self {
        Scalar::B(value)
    }
}

/// Implement numeric conversions into a [`Scalar`]
macro_rules! numeric_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Scalar {
                fn from(value: $ty) -> Self {
                    Scalar::number(value)
                }
            }
        )*
    };
}

numeric_scalar!(i32, i64, u32, u64, usize, f64);

/// A raw record as returned by an item store
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    /// The fields in this record
    fields: BTreeMap<String, Scalar>,
}

impl Record {
    /// Create an empty record
    #[must_use]
    pub fn new() -> Self {
        Record::default()
    }

    /// Add a field to this record
    ///
    /// # Arguments
    ///
    /// * `field` - The name of the field
    /// * `value` - The value to set
    #[must_use]
    pub fn with<F: Into<String>, V: Into<Scalar>>(mut self, field: F, value: V) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Set a field in this record
    ///
    /// # Arguments
    ///
    /// * `field` - The name of the field
    /// * `value` - The value to set
    pub fn insert<F: Into<String>, V: Into<Scalar>>(&mut self, field: F, value: V) -> Option<Scalar> {
        self.fields.insert(field.into(), value.into())
    }

    /// Get a field from this record
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Scalar> {
        self.fields.get(field)
    }

    /// Check if this record has a field
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// The number of fields in this record
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether this record has no fields
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over the fields in this record
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Scalar)> {
        self.fields.iter()
    }

    /// Project some fields of this record into a resume key
    ///
    /// Returns the name of the first missing field on failure.
    ///
    /// # Arguments
    ///
    /// * `fields` - The fields to project
    pub fn project<'a, I>(&self, fields: I) -> Result<ResumeKey, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut key = ResumeKey::default();
        for field in fields {
            // every key field must be present
            match self.fields.get(field) {
                Some(value) => key.insert(field, value.clone()),
                None => return Err(field.to_owned()),
            };
        }
        Ok(key)
    }
}

impl<F: Into<String>, V: Into<Scalar>> FromIterator<(F, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (F, V)>>(iter: I) -> Self {
        Record {
            fields: iter
                .into_iter()
                .map(|(field, value)| (field.into(), value.into()))
                .collect(),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (index, (field, value)) in self.fields.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{field}: {value}")?;
        }
        write!(f, "}}")
    }
}

/// The exact point after which a traversal should continue
///
/// This is always a subset of a records fields: the key fields of the table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash, PartialOrd, Ord)]
pub struct ResumeKey {
    /// The key fields and their values
    fields: BTreeMap<String, Scalar>,
}

impl ResumeKey {
    /// Create an empty resume key
    #[must_use]
    pub fn new() -> Self {
        ResumeKey::default()
    }

    /// Add a field to this key
    ///
    /// # Arguments
    ///
    /// * `field` - The name of the field
    /// * `value` - The value to set
    #[must_use]
    pub fn with<F: Into<String>, V: Into<Scalar>>(mut self, field: F, value: V) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Set a field in this key
    ///
    /// # Arguments
    ///
    /// * `field` - The name of the field
    /// * `value` - The value to set
    pub fn insert<F: Into<String>, V: Into<Scalar>>(&mut self, field: F, value: V) -> Option<Scalar> {
        self.fields.insert(field.into(), value.into())
    }

    /// Remove a field from this key
    pub fn remove(&mut self, field: &str) -> Option<Scalar> {
        self.fields.remove(field)
    }

    /// Get a field from this key
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Scalar> {
        self.fields.get(field)
    }

    /// Check if this key has a field
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// The number of fields in this key
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether this key has no fields
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over the fields in this key in field name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Scalar)> {
        self.fields.iter()
    }
}

impl<F: Into<String>, V: Into<Scalar>> FromIterator<(F, V)> for ResumeKey {
    fn from_iter<I: IntoIterator<Item = (F, V)>>(iter: I) -> Self {
        ResumeKey {
            fields: iter
                .into_iter()
                .map(|(field, value)| (field.into(), value.into()))
                .collect(),
        }
    }
}

/// The key layout of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    /// The field that picks a partition
    hash_key: String,
    /// The field that orders rows within a partition
    range_key: Option<String>,
}

impl KeySchema {
    /// Build a schema keyed only by a hash key
    ///
    /// # Arguments
    ///
    /// * `hash_key` - The name of the hash key field
    pub fn hash<H: Into<String>>(hash_key: H) -> Self {
        KeySchema {
            hash_key: hash_key.into(),
            range_key: None,
        }
    }

    /// Build a schema keyed by a hash key and a range key
    ///
    /// # Arguments
    ///
    /// * `hash_key` - The name of the hash key field
    /// * `range_key` - The name of the range key field
    pub fn composite<H: Into<String>, R: Into<String>>(hash_key: H, range_key: R) -> Self {
        KeySchema {
            hash_key: hash_key.into(),
            range_key: Some(range_key.into()),
        }
    }

    /// The hash key field
    #[must_use]
    pub fn hash_key(&self) -> &str {
        &self.hash_key
    }

    /// The range key field if this table has one
    #[must_use]
    pub fn range_key(&self) -> Option<&str> {
        self.range_key.as_deref()
    }

    /// All key fields, hash key first
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        let mut fields = Vec::with_capacity(2);
        fields.push(self.hash_key.as_str());
        if let Some(range_key) = &self.range_key {
            fields.push(range_key.as_str());
        }
        fields
    }

    /// Check if a field is this tables hash key
    #[must_use]
    pub fn is_hash_key(&self, field: &str) -> bool {
        self.hash_key == field
    }
}

/// Where the next page of a source should start
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Continuation {
    /// The source has nothing more to return
    #[default]
    None,
    /// Continue after this key
    StartKey(ResumeKey),
    /// These keys were requested but not resolved yet
    Pending(Vec<ResumeKey>),
}

impl Continuation {
    /// Whether this continuation points at more data
    #[must_use]
    pub fn is_some(&self) -> bool {
        match self {
            Continuation::None => false,
            Continuation::StartKey(_) => true,
            Continuation::Pending(keys) => !keys.is_empty(),
        }
    }
}

/// A single page of raw records
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Page {
    /// The records in this page in source order
    pub records: Vec<Record>,
    /// Where the page after this one starts
    pub continuation: Continuation,
}

impl Page {
    /// Build a new page
    ///
    /// # Arguments
    ///
    /// * `records` - The records in this page
    /// * `continuation` - Where the next page starts
    #[must_use]
    pub fn new(records: Vec<Record>, continuation: Continuation) -> Self {
        Page {
            records,
            continuation,
        }
    }

    /// The number of records in this page
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether this page has no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
