//! End to end paging against an in memory table
#![cfg(feature = "server")]

use std::sync::Arc;

use tidepool_core::client::{BatchGetSource, IterState, RangeQuerySource, ScanSource};
use tidepool_core::server::Conf;
use tidepool_core::shared::queries::{BatchGetRequest, Filter, QueryRequest, ScanRequest};
use tidepool_core::shared::traits::SourceKind;
use tidepool_core::shared::values::{KeySchema, Record, ResumeKey, Scalar};
use tidepool_core::tables::EphemeralTable;
use tidepool_core::{Errors, FromRecord, PagedIterable, PagingIterator};

/// A typed view of one seeded row
#[derive(Debug, PartialEq)]
struct Item {
    id: String,
}

impl FromRecord for Item {
    fn from_record(record: &Record) -> Result<Self, Errors> {
        let id = record
            .get("id")
            .and_then(Scalar::as_str)
            .ok_or_else(|| Errors::materialize("row has no string id"))?;
        Ok(Item { id: id.to_owned() })
    }
}

fn conf(page_size: usize, batch_get_max: usize) -> Conf {
    let mut conf = Conf::default();
    conf.paging.page_size = page_size;
    conf.paging.batch_get_max = batch_get_max;
    conf
}

/// Eight rows `H_0..H_7` in one partition
fn partitioned(page_size: usize) -> Arc<EphemeralTable> {
    let schema = KeySchema::composite("tenant", "id");
    let mut table = EphemeralTable::new("items", schema, &conf(page_size, 100));
    for i in 0..8 {
        let row = Record::new()
            .with("tenant", "acme")
            .with("id", format!("H_{i}"))
            .with("n", i);
        table.insert(row).expect("valid row");
    }
    Arc::new(table)
}

/// Eight rows `H_0..H_7` each in their own partition
fn flat(page_size: usize, batch_get_max: usize) -> Arc<EphemeralTable> {
    let mut table = EphemeralTable::new("items", KeySchema::hash("id"), &conf(page_size, batch_get_max));
    for i in 0..8 {
        table
            .insert(Record::new().with("id", format!("H_{i}")))
            .expect("valid row");
    }
    Arc::new(table)
}

fn query(table: &Arc<EphemeralTable>) -> PagedIterable<RangeQuerySource<EphemeralTable>, Item> {
    let request = QueryRequest::new("items", "acme");
    PagedIterable::new(RangeQuerySource::new(table.clone(), request).expect("known table"))
}

fn scan(table: &Arc<EphemeralTable>) -> PagedIterable<ScanSource<EphemeralTable>, Item> {
    let source = ScanSource::new(table.clone(), ScanRequest::new("items")).expect("known table");
    PagedIterable::new(source)
}

fn ids<I: Iterator<Item = Result<Item, Errors>>>(items: I) -> Vec<String> {
    items.map(|item| item.expect("healthy traversal").id).collect()
}

fn expected(range: std::ops::Range<usize>) -> Vec<String> {
    range.map(|i| format!("H_{i}")).collect()
}

/// Walk one limited leg of a traversal and return its position
fn leg<S>(mut paging: PagingIterator<S, Item>, expect: std::ops::Range<usize>) -> String
where
    S: tidepool_core::shared::traits::PageSource,
{
    assert_eq!(ids(paging.by_ref()), expected(expect));
    assert!(paging.has_results_past_limit().expect("limit set"));
    paging
        .position()
        .expect("positions supported")
        .expect("records were returned")
}

#[test]
fn queries_resume_across_processes() {
    let table = partitioned(3);
    // the first process stops after three results
    let mut first = query(&table);
    first.set_limit(3).expect("unstarted");
    let t1 = leg(first.iter(), 0..3);
    // a later process picks up from the first token
    let mut second = query(&table);
    second.set_position(&t1).expect("valid token");
    second.set_limit(3).expect("unstarted");
    let t2 = leg(second.iter(), 3..6);
    // and a final one reads everything that is left
    let mut third = query(&table);
    third.set_position(&t2).expect("valid token");
    let mut paging = third.iter();
    assert_eq!(ids(paging.by_ref()), expected(6..8));
    assert!(!paging.has_next().expect("healthy traversal"));
    assert_eq!(paging.state(), IterState::Exhausted);
    assert_eq!(paging.position().expect("positions supported"), None);
}

#[test]
fn scans_resume_across_processes() {
    let table = flat(3, 100);
    let mut first = scan(&table);
    first.set_limit(3).expect("unstarted");
    let t1 = leg(first.iter(), 0..3);
    let mut second = scan(&table);
    second.set_position(&t1).expect("valid token");
    second.set_limit(3).expect("unstarted");
    let t2 = leg(second.iter(), 3..6);
    let mut third = scan(&table);
    third.set_position(&t2).expect("valid token");
    let mut paging = third.iter();
    assert_eq!(ids(paging.by_ref()), expected(6..8));
    assert!(!paging.has_next().expect("healthy traversal"));
}

#[test]
fn limits_span_pages() {
    let table = partitioned(3);
    let mut iterable = query(&table);
    iterable.set_limit(5).expect("unstarted");
    let mut paging = iterable.iter();
    assert_eq!(ids(paging.by_ref()), expected(0..5));
    assert_eq!(paging.pages_fetched(), 2);
    assert!(matches!(paging.next_item(), Err(Errors::LimitReached(5))));
    assert!(paging.has_results_past_limit().expect("limit set"));
}

#[test]
fn resumed_limits_return_the_rest() {
    let table = partitioned(3);
    let mut first = query(&table);
    first.set_limit(5).expect("unstarted");
    let token = leg(first.iter(), 0..5);
    // the same limit again covers everything that is left
    let mut second = query(&table);
    second.set_position(&token).expect("valid token");
    second.set_limit(5).expect("unstarted");
    let mut paging = second.iter();
    assert_eq!(ids(paging.by_ref()), expected(5..8));
    assert!(!paging.has_results_past_limit().expect("limit set"));
}

#[test]
fn limits_past_the_end() {
    let table = partitioned(3);
    let mut iterable = query(&table);
    iterable.set_limit(20).expect("unstarted");
    let mut paging = iterable.iter();
    assert_eq!(ids(paging.by_ref()).len(), 8);
    assert!(!paging.has_results_past_limit().expect("limit set"));
}

#[test]
fn exact_limits_have_nothing_past_them() {
    let table = partitioned(4);
    let mut iterable = query(&table);
    iterable.set_limit(8).expect("unstarted");
    let mut paging = iterable.iter();
    assert_eq!(ids(paging.by_ref()).len(), 8);
    assert!(!paging.has_results_past_limit().expect("limit set"));
}

#[test]
fn hash_keys_can_travel_out_of_band() {
    let table = partitioned(3);
    let mut first = query(&table);
    first.set_limit(4).expect("unstarted");
    let mut paging = first.iter();
    assert_eq!(ids(paging.by_ref()), expected(0..4));
    let token = paging
        .position_without_hash_key()
        .expect("range queries drop hash keys")
        .expect("records were returned");
    // the token alone is missing our hash key
    let mut broken = query(&table);
    assert!(matches!(
        broken.set_position(&token),
        Err(Errors::MissingKeyField(field)) if field == "tenant"
    ));
    let mut second = query(&table);
    second
        .set_position_with_hash_key(&token, "acme")
        .expect("hash key supplied");
    assert_eq!(ids(second.iter()), expected(4..8));
}

#[test]
fn positions_stay_in_their_partition() {
    let table = partitioned(3);
    let mut first = query(&table);
    first.set_limit(2).expect("unstarted");
    let mut paging = first.iter();
    assert_eq!(ids(paging.by_ref()), expected(0..2));
    let bare = paging
        .position_without_hash_key()
        .expect("range queries drop hash keys")
        .expect("records were returned");
    let full = paging.position().expect("range queries").expect("records were returned");
    // putting back some other hash key must not resume our partition
    let mut mixed = query(&table);
    assert!(matches!(
        mixed.set_position_with_hash_key(&bare, "beta"),
        Err(Errors::CorruptPosition(_))
    ));
    // and a full position cannot resume a query over another partition
    let request = QueryRequest::new("items", "beta");
    let source = RangeQuerySource::new(table.clone(), request).expect("known table");
    let mut other: PagedIterable<_, Item> = PagedIterable::new(source);
    assert!(matches!(other.set_position(&full), Err(Errors::CorruptPosition(_))));
    // both iterables are still usable after the rejection
    assert_eq!(ids(mixed.iter()), expected(0..8));
    assert!(ids(other.iter()).is_empty());
}

#[test]
fn hash_only_positions_keep_their_hash_key() {
    let table = flat(3, 100);
    let source = RangeQuerySource::new(table, QueryRequest::new("items", "H_2")).expect("known table");
    let mut iterable: PagedIterable<_, Item> = PagedIterable::new(source);
    iterable.set_limit(1).expect("unstarted");
    let mut paging = iterable.iter();
    assert_eq!(ids(paging.by_ref()), ["H_2"]);
    // dropping the only key field would leave nothing to resume from
    assert!(matches!(
        paging.position_without_hash_key(),
        Err(Errors::UnsupportedByVariant {
            variant: SourceKind::RangeQuery,
            ..
        })
    ));
    assert!(paging.position().expect("range queries").is_some());
}

#[test]
fn filtered_traversals_skip_empty_pages() {
    let table = partitioned(1);
    let request = QueryRequest::new("items", "acme").filter(Filter::Equals("n".to_owned(), Scalar::from(6)));
    let source = RangeQuerySource::new(table, request).expect("known table");
    let mut iterable: PagedIterable<_, Item> = PagedIterable::new(source);
    let mut paging = iterable.iter();
    assert_eq!(ids(paging.by_ref()), ["H_6"]);
    // every row was evaluated on its own page
    assert_eq!(paging.pages_fetched(), 8);
}

#[test]
fn batch_gets_resolve_over_many_calls() {
    let table = flat(3, 2);
    let keys = [0, 2, 4, 6, 7]
        .iter()
        .map(|i| ResumeKey::new().with("id", format!("H_{i}")))
        .collect();
    let source = BatchGetSource::new(table, BatchGetRequest::new("items", keys));
    let mut iterable: PagedIterable<_, Item> = PagedIterable::new(source);
    iterable.set_limit(4).expect("unstarted");
    let mut paging = iterable.iter();
    assert_eq!(ids(paging.by_ref()), ["H_0", "H_2", "H_4", "H_6"]);
    assert_eq!(paging.source().pending().len(), 1);
    assert!(paging.has_results_past_limit().expect("limit set"));
    // batch gets have no store cursor to resume from
    assert!(matches!(
        paging.position(),
        Err(Errors::UnsupportedByVariant {
            variant: SourceKind::BatchGet,
            ..
        })
    ));
}

#[test]
fn materializer_errors_reach_the_caller() {
    let mut table = EphemeralTable::new("items", KeySchema::composite("tenant", "id"), &conf(10, 10));
    table
        .insert(Record::new().with("tenant", "acme").with("id", 7))
        .expect("numeric ids are valid keys");
    let source = RangeQuerySource::new(Arc::new(table), QueryRequest::new("items", "acme"))
        .expect("known table");
    let mut iterable: PagedIterable<_, Item> = PagedIterable::new(source);
    let results = iterable.iter().collect::<Vec<_>>();
    assert_eq!(results.len(), 1);
    match &results[0] {
        Err(Errors::Materialize(cause)) => assert_eq!(cause.to_string(), "row has no string id"),
        other => panic!("expected a materialize error, got {other:?}"),
    }
}

#[test]
fn unknown_tables_fail_to_build() {
    let table = partitioned(3);
    assert!(matches!(
        RangeQuerySource::new(table, QueryRequest::new("missing", "acme")),
        Err(Errors::SourceFetch(_))
    ));
}
