//! Query engine: parses the filter once, streams objects out of a
//! snapshot, evaluates each, and yields projected matches in file order.

use std::time::{Duration, Instant};

use adsnap_core::error::{Error, FormatError};
use adsnap_core::types::Object;
use adsnap_filter::{matches, EvalContext, FilterNode};
use adsnap_format::{Objects, Schema, Snapshot};

/// Per-call options. Option state lives with the caller; the engine holds
/// nothing between runs.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Attribute projection; `None` emits every attribute an object has.
    pub attributes: Option<Vec<String>>,
    /// Stop after this many matches.
    pub limit: Option<usize>,
    /// ASCII case folding for value comparisons.
    pub case_insensitive: bool,
}

/// Counters for one query run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryStats {
    pub objects_scanned: u64,
    pub objects_matched: u64,
    pub decode_errors: u64,
    pub elapsed: Duration,
}

/// A matched object, projected for output: its DN plus attribute name to
/// rendered value strings, in file/projection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedObject {
    pub dn: String,
    pub attributes: Vec<(String, Vec<String>)>,
}

/// A parsed query bound to a snapshot. Construction parses the filter and
/// resolves the projection; nothing is read from the object section until
/// [`run`] is iterated.
///
/// [`run`]: Query::run
pub struct Query<'a> {
    snapshot: &'a Snapshot,
    filter: FilterNode,
    options: QueryOptions,
    projection: Option<Vec<u32>>,
    unknown_attributes: Vec<String>,
}

impl<'a> Query<'a> {
    pub fn new(
        snapshot: &'a Snapshot,
        filter_text: &str,
        options: QueryOptions,
    ) -> Result<Self, Error> {
        let filter = adsnap_filter::parse(filter_text)?;
        let (projection, unknown_attributes) =
            resolve_projection(snapshot.schema(), options.attributes.as_deref());
        Ok(Self {
            snapshot,
            filter,
            options,
            projection,
            unknown_attributes,
        })
    }

    pub fn filter(&self) -> &FilterNode {
        &self.filter
    }

    /// Projection names that do not exist in the snapshot's schema. They
    /// are skipped rather than failing the query.
    pub fn unknown_attributes(&self) -> &[String] {
        &self.unknown_attributes
    }

    pub fn run(self) -> Matches<'a> {
        Matches {
            objects: self.snapshot.objects(),
            schema: self.snapshot.schema(),
            filter: self.filter,
            case_insensitive: self.options.case_insensitive,
            projection: self.projection,
            limit: self.options.limit,
            scanned: 0,
            matched: 0,
            started: Instant::now(),
            done: false,
        }
    }
}

/// Resolves requested attribute names to schema ids, case-insensitively.
/// If none of the requested names exist the projection falls back to "all
/// attributes", mirroring the unknown-name warning path in the CLI.
fn resolve_projection(
    schema: &Schema,
    requested: Option<&[String]>,
) -> (Option<Vec<u32>>, Vec<String>) {
    let Some(requested) = requested else {
        return (None, Vec::new());
    };
    let mut selected = Vec::new();
    let mut unknown = Vec::new();
    for name in requested {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        match schema.attribute_by_name(name) {
            Some(def) => selected.push(def.id),
            None => unknown.push(name.to_owned()),
        }
    }
    if selected.is_empty() {
        (None, unknown)
    } else {
        (Some(selected), unknown)
    }
}

/// Lazy stream of projected matches. Dropping it part way through releases
/// everything; a fatal snapshot error is yielded once and then fuses the
/// iterator, staying observable through [`error`].
///
/// [`error`]: Matches::error
pub struct Matches<'a> {
    objects: Objects<'a>,
    schema: &'a Schema,
    filter: FilterNode,
    case_insensitive: bool,
    projection: Option<Vec<u32>>,
    limit: Option<usize>,
    scanned: u64,
    matched: u64,
    started: Instant,
    done: bool,
}

impl<'a> Matches<'a> {
    pub fn stats(&self) -> QueryStats {
        QueryStats {
            objects_scanned: self.scanned,
            objects_matched: self.matched,
            decode_errors: self.objects.decode_errors(),
            elapsed: self.started.elapsed(),
        }
    }

    pub fn error(&self) -> Option<&FormatError> {
        self.objects.error()
    }

    fn project(&self, object: Object) -> ProjectedObject {
        let mut attributes = Vec::new();
        match &self.projection {
            Some(ids) => {
                for &id in ids {
                    if let Some(values) = object.values(id) {
                        let name = self
                            .schema
                            .attribute_by_id(id)
                            .map(|def| def.name.clone())
                            .unwrap_or_else(|| id.to_string());
                        attributes.push((name, values.iter().map(|v| v.render()).collect()));
                    }
                }
            }
            None => {
                for (id, values) in &object.attributes {
                    let name = self
                        .schema
                        .attribute_by_id(*id)
                        .map(|def| def.name.clone())
                        .unwrap_or_else(|| id.to_string());
                    attributes.push((name, values.iter().map(|v| v.render()).collect()));
                }
            }
        }
        ProjectedObject {
            dn: object.dn,
            attributes,
        }
    }
}

impl<'a> Iterator for Matches<'a> {
    type Item = Result<ProjectedObject, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.limit.is_some_and(|limit| self.matched >= limit as u64) {
            self.done = true;
            return None;
        }
        let ctx = EvalContext {
            schema: self.schema,
            case_insensitive: self.case_insensitive,
        };
        loop {
            match self.objects.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err.into()));
                }
                Some(Ok(object)) => {
                    self.scanned += 1;
                    if matches(&self.filter, &object, &ctx) {
                        self.matched += 1;
                        return Some(Ok(self.project(object)));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adsnap_core::error::FilterError;
    use adsnap_core::types::SyntaxKind;
    use adsnap_format::fixture::{self, SnapshotBuilder};

    /// The end-to-end fixture: a handful of users and one group with the
    /// attribute mix the scenario queries need.
    fn corpus() -> SnapshotBuilder {
        let mut fx = SnapshotBuilder::new();
        fx.server("DC=corp,DC=local");
        let oc = fx.attribute("objectClass", SyntaxKind::String, false);
        let dn_attr = fx.attribute("distinguishedName", SyntaxKind::Dn, true);
        let sam = fx.attribute("sAMAccountName", SyntaxKind::String, true);
        let mail = fx.attribute("mail", SyntaxKind::String, true);
        let company = fx.attribute("company", SyntaxKind::String, true);
        let street = fx.attribute("streetAddress", SyntaxKind::String, true);
        fx.class("top");
        fx.class("user");
        fx.class("group");
        let root = fx.prefix("");

        let users: &[(&str, &str, Option<&str>, Option<&str>, Option<&str>)] = &[
            // name, sam, mail, company, street
            ("Alice", "ahill", Some("ahill@corp.local"), Some("1234"), Some("HQ-North")),
            ("Adam", "abell", None, Some("1234"), Some("HQ-South")),
            ("Bob", "bjones", Some("bjones@corp.local"), Some("AcmeCorp"), Some("Remote-1")),
            ("Carol", "cday", None, None, None),
        ];
        for &(name, sam_v, mail_v, company_v, street_v) in users {
            let suffix = format!("CN={name},OU=Staff,DC=corp,DC=local");
            let mut attrs = vec![
                (oc, vec![fixture::vstr("top"), fixture::vstr("user")]),
                (dn_attr, vec![fixture::vdn(root, &suffix)]),
                (sam, vec![fixture::vstr(sam_v)]),
            ];
            if let Some(v) = mail_v {
                attrs.push((mail, vec![fixture::vstr(v)]));
            }
            if let Some(v) = company_v {
                attrs.push((company, vec![fixture::vstr(v)]));
            }
            if let Some(v) = street_v {
                attrs.push((street, vec![fixture::vstr(v)]));
            }
            fx.object(root, &suffix, attrs);
        }
        fx.object(
            root,
            "CN=Admins,OU=Groups,DC=corp,DC=local",
            vec![
                (oc, vec![fixture::vstr("top"), fixture::vstr("group")]),
                (sam, vec![fixture::vstr("admins")]),
            ],
        );
        fx
    }

    fn open(fx: &SnapshotBuilder) -> (tempfile::TempDir, Snapshot) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.dat");
        std::fs::write(&path, fx.build()).unwrap();
        let snap = Snapshot::open(&path).unwrap();
        (dir, snap)
    }

    fn run_query(
        snap: &Snapshot,
        filter: &str,
        options: QueryOptions,
    ) -> (Vec<ProjectedObject>, QueryStats) {
        let query = Query::new(snap, filter, options).unwrap();
        let mut matches = query.run();
        let rows: Vec<ProjectedObject> = matches.by_ref().map(|r| r.unwrap()).collect();
        (rows, matches.stats())
    }

    fn rdns(rows: &[ProjectedObject]) -> Vec<String> {
        rows.iter()
            .map(|r| r.dn.split(',').next().unwrap().to_owned())
            .collect()
    }

    #[test]
    fn object_class_equality_matches_users_only() {
        let (_dir, snap) = open(&corpus());
        let (rows, stats) = run_query(
            &snap,
            "(objectClass=USER)",
            QueryOptions {
                case_insensitive: true,
                ..QueryOptions::default()
            },
        );
        assert_eq!(rdns(&rows), ["CN=Alice", "CN=Adam", "CN=Bob", "CN=Carol"]);
        assert_eq!(stats.objects_scanned, 5);
        assert_eq!(stats.objects_matched, 4);
        assert_eq!(stats.decode_errors, 0);
    }

    #[test]
    fn conjunction_with_projection() {
        let (_dir, snap) = open(&corpus());
        let query = Query::new(
            &snap,
            "(&(objectClass=user)(company=1234)(streetAddress=HQ-*))",
            QueryOptions {
                attributes: Some(vec![
                    "distinguishedName".to_owned(),
                    "sAMAccountName".to_owned(),
                    "mail".to_owned(),
                ]),
                ..QueryOptions::default()
            },
        )
        .unwrap();
        assert!(query.unknown_attributes().is_empty());
        let rows: Vec<ProjectedObject> = query.run().map(|r| r.unwrap()).collect();
        assert_eq!(rdns(&rows), ["CN=Alice", "CN=Adam"]);
        // Only the projected attributes are emitted, in requested order;
        // Adam has no mail so it is simply absent.
        let alice = &rows[0];
        let names: Vec<&str> = alice.attributes.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["distinguishedName", "sAMAccountName", "mail"]);
        let adam = &rows[1];
        let names: Vec<&str> = adam.attributes.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["distinguishedName", "sAMAccountName"]);
    }

    #[test]
    fn disjunction_of_presence_and_substring() {
        let (_dir, snap) = open(&corpus());
        let (rows, _) = run_query(
            &snap,
            "(|(mail=*)(sAMAccountName=A*))",
            QueryOptions {
                case_insensitive: true,
                ..QueryOptions::default()
            },
        );
        // Union: mail holders (Alice, Bob) plus sAMAccountName starting
        // with A (Alice, Adam, admins group).
        assert_eq!(rdns(&rows), ["CN=Alice", "CN=Adam", "CN=Bob", "CN=Admins"]);
    }

    #[test]
    fn negation_keeps_undefined_out() {
        let (_dir, snap) = open(&corpus());
        let (rows, _) = run_query(&snap, "(!(company=AcmeCorp))", QueryOptions::default());
        // Only objects where company is present with another value match;
        // objects without company evaluate to NOT(UNDEFINED) = UNDEFINED.
        assert_eq!(rdns(&rows), ["CN=Alice", "CN=Adam"]);
    }

    #[test]
    fn presence_filter_matches_exactly_value_holders() {
        let (_dir, snap) = open(&corpus());
        let (rows, _) = run_query(&snap, "(streetAddress=*)", QueryOptions::default());
        assert_eq!(rdns(&rows), ["CN=Alice", "CN=Adam", "CN=Bob"]);
    }

    #[test]
    fn wildcard_equality_is_presence() {
        let (_dir, snap) = open(&corpus());
        let query = Query::new(&snap, "(mail=*)", QueryOptions::default()).unwrap();
        assert!(matches!(query.filter(), FilterNode::Present(_)));
        let (rows, _) = run_query(&snap, "(mail=*)", QueryOptions::default());
        assert_eq!(rdns(&rows), ["CN=Alice", "CN=Bob"]);
        let (rows, _) = run_query(&snap, "(nothere=*)", QueryOptions::default());
        assert!(rows.is_empty());
    }

    #[test]
    fn malformed_filter_fails_before_iteration() {
        let (_dir, snap) = open(&corpus());
        let err = Query::new(&snap, "(&(objectClass=user)", QueryOptions::default())
            .err()
            .expect("parse must fail");
        match err {
            Error::Filter(FilterError::UnbalancedParen { at }) => {
                assert_eq!(at, "(&(objectClass=user)".len());
            }
            other => panic!("expected UnbalancedParen, got {other:?}"),
        }
    }

    #[test]
    fn empty_and_matches_everything_empty_or_nothing() {
        let (_dir, snap) = open(&corpus());
        let (rows, _) = run_query(&snap, "(&)", QueryOptions::default());
        assert_eq!(rows.len(), 5);
        let (rows, _) = run_query(&snap, "(|)", QueryOptions::default());
        assert!(rows.is_empty());
    }

    #[test]
    fn case_folding_changes_match_set() {
        let (_dir, snap) = open(&corpus());
        let (ci, _) = run_query(
            &snap,
            "(sAMAccountName=AHILL)",
            QueryOptions {
                case_insensitive: true,
                ..QueryOptions::default()
            },
        );
        assert_eq!(rdns(&ci), ["CN=Alice"]);
        let (cs, _) = run_query(&snap, "(sAMAccountName=AHILL)", QueryOptions::default());
        assert!(cs.is_empty());
    }

    #[test]
    fn limit_results_are_a_prefix() {
        let (_dir, snap) = open(&corpus());
        let (all, _) = run_query(&snap, "(objectClass=user)", QueryOptions::default());
        for n in 0..=all.len() {
            let (some, stats) = run_query(
                &snap,
                "(objectClass=user)",
                QueryOptions {
                    limit: Some(n),
                    ..QueryOptions::default()
                },
            );
            assert_eq!(some.as_slice(), &all[..n]);
            assert_eq!(stats.objects_matched, n as u64);
        }
    }

    #[test]
    fn projection_does_not_change_match_set() {
        let (_dir, snap) = open(&corpus());
        let (plain, _) = run_query(&snap, "(mail=*)", QueryOptions::default());
        let (projected, _) = run_query(
            &snap,
            "(mail=*)",
            QueryOptions {
                attributes: Some(vec!["mail".to_owned()]),
                ..QueryOptions::default()
            },
        );
        assert_eq!(rdns(&plain), rdns(&projected));
        for row in &projected {
            assert_eq!(row.attributes.len(), 1);
            assert_eq!(row.attributes[0].0, "mail");
        }
    }

    #[test]
    fn unknown_projection_names_are_reported_and_skipped() {
        let (_dir, snap) = open(&corpus());
        let query = Query::new(
            &snap,
            "(mail=*)",
            QueryOptions {
                attributes: Some(vec!["mail".to_owned(), "nosuch".to_owned()]),
                ..QueryOptions::default()
            },
        )
        .unwrap();
        assert_eq!(query.unknown_attributes(), ["nosuch"]);
        // All requested names unknown: fall back to emitting everything.
        let query = Query::new(
            &snap,
            "(mail=*)",
            QueryOptions {
                attributes: Some(vec!["nosuch".to_owned()]),
                ..QueryOptions::default()
            },
        )
        .unwrap();
        assert_eq!(query.unknown_attributes(), ["nosuch"]);
        let rows: Vec<ProjectedObject> = query.run().map(|r| r.unwrap()).collect();
        assert!(rows[0].attributes.len() > 1);
    }

    #[test]
    fn corrupt_record_surfaces_after_flushed_matches() {
        let fx = corpus();
        let mut data = fx.build();
        // Damage the last object record's length field.
        let mut offset = fixture::first_object_record_offset(&data) as usize;
        for _ in 0..4 {
            let len = fixture::get_u32(&data, offset);
            offset += 4 + len as usize;
        }
        fixture::put_u32(&mut data, offset, u32::MAX);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.dat");
        std::fs::write(&path, &data).unwrap();
        let snap = Snapshot::open(&path).unwrap();

        let query = Query::new(&snap, "(objectClass=user)", QueryOptions::default()).unwrap();
        let mut matches = query.run();
        let mut rows = Vec::new();
        let mut failure = None;
        for item in matches.by_ref() {
            match item {
                Ok(row) => rows.push(row),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        // The four healthy user records stream out before the error.
        assert_eq!(rows.len(), 4);
        assert!(matches!(
            failure,
            Some(Error::Format(FormatError::CorruptSnapshot { .. }))
        ));
        assert!(matches.error().is_some());
        assert!(matches.next().is_none());
    }
}
