//! Top-N ranking grouped into a continent → region → country tree.

use crate::data::{CountryMetaRecord, Metric};
use crate::join::JoinedCountryFrame;
use log::debug;
use serde::Serialize;
use std::collections::HashMap;

/// Name of the implicit root
pub const ROOT_NAME: &str = "World";

/// Leaves carry a value, internal nodes only children
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreemapNode {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreemapNode>,
}

impl TreemapNode {
    fn branch(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: None,
            children: Vec::new(),
        }
    }

    fn leaf(name: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            value: Some(value),
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.value.is_some()
    }

    /// Sum of descendant leaf values, what a layout sizes this node by
    pub fn total(&self) -> f64 {
        match self.value {
            Some(v) => v,
            None => self.children.iter().map(TreemapNode::total).sum(),
        }
    }

    /// Leaves in depth-first order
    pub fn leaves(&self) -> Vec<&TreemapNode> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a TreemapNode>) {
        if self.is_leaf() {
            out.push(self);
        }
        for child in &self.children {
            child.collect_leaves(out);
        }
    }

    fn child_mut(&mut self, name: &str) -> &mut TreemapNode {
        let pos = match self.children.iter().position(|c| c.name == name) {
            Some(pos) => pos,
            None => {
                self.children.push(TreemapNode::branch(name));
                self.children.len() - 1
            }
        };
        &mut self.children[pos]
    }
}

/// A country's rank key
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranked<'a> {
    pub name: &'a str,
    pub value: f64,
}

/// All countries, descending by value. Missing data ranks as zero; equal
/// values order by name so the result never depends on input order.
pub fn rank<'a>(frames: &[JoinedCountryFrame<'a>], metric: Metric) -> Vec<Ranked<'a>> {
    let mut ranked: Vec<Ranked<'a>> = frames
        .iter()
        .map(|f| {
            let value = f.value(metric);
            Ranked {
                name: f.name(),
                value: if value.is_nan() { 0.0 } else { value },
            }
        })
        .collect();
    ranked.sort_by(|a, b| b.value.total_cmp(&a.value).then_with(|| a.name.cmp(b.name)));
    ranked
}

/// Rank, keep the first `top_n`, then group by continent and region.
/// Countries without complete metadata are ranked but left out of the tree.
pub fn aggregate(
    frames: &[JoinedCountryFrame],
    meta: &[CountryMetaRecord],
    metric: Metric,
    top_n: usize,
) -> TreemapNode {
    let mut lookup: HashMap<&str, &CountryMetaRecord> = HashMap::new();
    for record in meta {
        lookup.entry(record.name.as_str()).or_insert(record);
    }

    let mut root = TreemapNode::branch(ROOT_NAME);
    for entry in rank(frames, metric).into_iter().take(top_n) {
        match lookup.get(entry.name).filter(|m| m.is_complete()) {
            Some(m) => root
                .child_mut(&m.continent)
                .child_mut(&m.region)
                .children
                .push(TreemapNode::leaf(entry.name, entry.value)),
            None => debug!("{} has no continent/region, left out of the treemap", entry.name),
        }
    }
    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CountryYearRecord, GeoFeature, RawRow};
    use crate::join::{resolve, RecordIndex};

    fn record(country: &str, gdp: &str) -> CountryYearRecord {
        let row: RawRow = [("country", country), ("year", "2010"), ("gdp", gdp)]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CountryYearRecord::from_row(&row)
    }

    fn meta(name: &str, continent: &str, region: &str) -> CountryMetaRecord {
        CountryMetaRecord {
            name: name.into(),
            continent: continent.into(),
            region: region.into(),
        }
    }

    struct Fixture {
        features: Vec<GeoFeature>,
        records: Vec<CountryYearRecord>,
        meta: Vec<CountryMetaRecord>,
    }

    fn fixture() -> Fixture {
        let names = ["France", "Japan", "Kenya", "Chile", "Spain", "Atlantis"];
        Fixture {
            features: names.iter().map(|n| GeoFeature::new(n, None)).collect(),
            records: vec![
                record("France", "500"),
                record("Japan", "900"),
                record("Kenya", "50"),
                record("Chile", "n/a"),
                record("Spain", "500"),
                record("Atlantis", "700"),
            ],
            meta: vec![
                meta("France", "Europe", "Western Europe"),
                meta("Spain", "Europe", "Southern Europe"),
                meta("Japan", "Asia", "Eastern Asia"),
                meta("Kenya", "Africa", "Eastern Africa"),
                meta("Chile", "Americas", "South America"),
            ],
        }
    }

    #[test]
    fn test_rank_orders_ties_by_name_and_missing_last() {
        let f = fixture();
        let index = RecordIndex::new(&f.records, &[], &f.meta);
        let frames = resolve(&f.features, &index, 2010);
        let names: Vec<_> = rank(&frames, Metric::Gdp).iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Japan", "Atlantis", "France", "Spain", "Kenya", "Chile"]);
    }

    #[test]
    fn test_aggregate_groups_and_drops_unclassified() {
        let f = fixture();
        let index = RecordIndex::new(&f.records, &[], &f.meta);
        let frames = resolve(&f.features, &index, 2010);
        let root = aggregate(&frames, &f.meta, Metric::Gdp, 4);

        assert_eq!(root.name, ROOT_NAME);
        let continents: Vec<_> = root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(continents, vec!["Asia", "Europe"]);
        let europe = &root.children[1];
        assert_eq!(europe.children.len(), 2);
        assert_eq!(europe.value, None);
        assert_eq!(europe.total(), 1000.0);

        // Atlantis ranked second but has no metadata
        let leaves: Vec<_> = root.leaves().iter().map(|l| l.name.as_str()).collect();
        assert_eq!(leaves, vec!["Japan", "France", "Spain"]);
        assert_eq!(root.total(), 1900.0);
    }

    #[test]
    fn test_top_n_is_monotonic() {
        let f = fixture();
        let index = RecordIndex::new(&f.records, &[], &f.meta);
        let frames = resolve(&f.features, &index, 2010);
        let ranking = rank(&frames, Metric::Gdp);

        let mut previous: Vec<String> = Vec::new();
        for n in 0..=8 {
            let root = aggregate(&frames, &f.meta, Metric::Gdp, n);
            let leaves: Vec<String> = root.leaves().iter().map(|l| l.name.clone()).collect();
            assert!(leaves.len() <= n);
            assert!(previous.iter().all(|p| leaves.contains(p)));

            let expected: f64 = ranking
                .iter()
                .take(n)
                .filter(|r| r.name != "Atlantis")
                .map(|r| r.value)
                .sum();
            assert_eq!(root.total(), expected);
            previous = leaves;
        }
        assert_eq!(previous.len(), 5);
    }

    #[test]
    fn test_empty_input_gives_empty_root() {
        let root = aggregate(&[], &[], Metric::Population, 10);
        assert!(root.children.is_empty());
        assert_eq!(root.total(), 0.0);
        assert_eq!(serde_json::to_string(&root).unwrap(), r#"{"name":"World"}"#);
    }

    #[test]
    fn test_serializes_leaf_values() {
        let f = fixture();
        let index = RecordIndex::new(&f.records, &[], &f.meta);
        let frames = resolve(&f.features, &index, 2010);
        let root = aggregate(&frames, &f.meta, Metric::Gdp, 1);
        let json = serde_json::to_value(&root).unwrap();
        assert_eq!(json["children"][0]["name"], "Asia");
        assert_eq!(json["children"][0]["children"][0]["children"][0]["value"], 900.0);
    }
}
