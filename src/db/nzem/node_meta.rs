//! Static node attributes (island, region, ...) read from a CSV file whose
//! first column is the node name.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use itertools::Itertools;
use log::debug;
use rust_decimal::Decimal;

pub trait NodeRow {
    fn node(&self) -> &str;
}

/// How the values of rows sharing an attribute value are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Sum,
    Mean,
    Min,
    Max,
}

impl Aggregation {
    fn apply(&self, values: Vec<Decimal>) -> Option<Decimal> {
        match self {
            Aggregation::Sum => Some(values.into_iter().sum()),
            Aggregation::Mean => {
                let n = Decimal::from(values.len());
                let total: Decimal = values.into_iter().sum();
                total.checked_div(n)
            }
            Aggregation::Min => values.into_iter().min(),
            Aggregation::Max => values.into_iter().max(),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Aggregation::Sum => write!(f, "sum"),
            Aggregation::Mean => write!(f, "mean"),
            Aggregation::Min => write!(f, "min"),
            Aggregation::Max => write!(f, "max"),
        }
    }
}

impl FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sum" => Ok(Aggregation::Sum),
            "mean" | "avg" => Ok(Aggregation::Mean),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            _ => Err(format!("unknown aggregation {}", s)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeMeta {
    /// Attribute names, without the node column.
    pub attributes: Vec<String>,
    nodes: BTreeMap<String, Vec<String>>,
}

impl NodeMeta {
    pub fn from_path(path: &Path) -> Result<NodeMeta, Box<dyn Error>> {
        let file = std::fs::File::open(path)
            .map_err(|e| format!("can't open node metadata {}: {}", path.display(), e))?;
        NodeMeta::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<NodeMeta, Box<dyn Error>> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr.headers()?.clone();
        match headers.get(0) {
            Some(e) if e.trim().eq_ignore_ascii_case("node") => {}
            _ => return Err("first column of node metadata must be Node".into()),
        }
        let attributes: Vec<String> = headers.iter().skip(1).map(|e| e.trim().to_string()).collect();
        let mut nodes = BTreeMap::new();
        for record in rdr.records() {
            let record = record?;
            let mut fields = record.iter().map(|e| e.trim().to_string());
            if let Some(node) = fields.next() {
                nodes.insert(node, fields.collect());
            }
        }
        debug!("read metadata for {} nodes", nodes.len());
        Ok(NodeMeta { attributes, nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn attribute(&self, node: &str, attribute: &str) -> Option<&str> {
        let idx = self.attributes.iter().position(|e| e == attribute)?;
        self.nodes.get(node)?.get(idx).map(|e| e.as_str())
    }

    /// Pair each row with the attribute values of its node.  Rows of unknown
    /// nodes are dropped.
    pub fn join<'a, T: NodeRow>(&'a self, rows: &'a [T]) -> Vec<(&'a T, &'a [String])> {
        rows.iter()
            .filter_map(|row| self.nodes.get(row.node()).map(|meta| (row, meta.as_slice())))
            .collect()
    }

    /// Combine `value` over the rows sharing the same `attribute` value.
    pub fn aggregate_by<T: NodeRow>(
        &self,
        rows: &[T],
        attribute: &str,
        value: impl Fn(&T) -> Decimal,
        aggregation: Aggregation,
    ) -> Result<BTreeMap<String, Decimal>, Box<dyn Error>> {
        let idx = self
            .attributes
            .iter()
            .position(|e| e == attribute)
            .ok_or_else(|| format!("unknown node attribute {}", attribute))?;
        let grouped = self
            .join(rows)
            .into_iter()
            .filter_map(|(row, meta)| meta.get(idx).map(|key| (key.clone(), value(row))))
            .into_group_map();
        Ok(grouped
            .into_iter()
            .filter_map(|(key, values)| aggregation.apply(values).map(|v| (key, v)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use jiff::civil::date;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::db::nzem::nodal_demand::Row;

    const DATA: &str = "Node,Island,Region\nOTA2201,NI,Auckland\nHAY2201,NI,Wellington\nBEN2201,SI,Canterbury\n";

    fn row(node: &str, demand: Decimal) -> Row {
        Row {
            node: node.to_string(),
            trading_date: date(2014, 1, 1),
            trading_period: 1,
            demand,
        }
    }

    #[test]
    fn read_meta() -> Result<(), Box<dyn Error>> {
        let meta = NodeMeta::from_reader(DATA.as_bytes())?;
        assert_eq!(meta.len(), 3);
        assert_eq!(meta.attributes, vec!["Island", "Region"]);
        assert_eq!(meta.attribute("HAY2201", "Region"), Some("Wellington"));
        assert_eq!(meta.attribute("XXX0000", "Region"), None);
        assert_eq!(meta.attribute("HAY2201", "Zone"), None);
        assert!(NodeMeta::from_reader("Island,Node\nNI,OTA2201\n".as_bytes()).is_err());
        Ok(())
    }

    #[test]
    fn join_is_inner() -> Result<(), Box<dyn Error>> {
        let meta = NodeMeta::from_reader(DATA.as_bytes())?;
        let rows = vec![row("OTA2201", dec!(1)), row("TWC2201", dec!(2))];
        let joined = meta.join(&rows);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].0.node, "OTA2201");
        assert_eq!(joined[0].1[1], "Auckland");
        Ok(())
    }

    #[test]
    fn sum_by_attribute() -> Result<(), Box<dyn Error>> {
        let meta = NodeMeta::from_reader(DATA.as_bytes())?;
        let rows = vec![
            row("OTA2201", dec!(300.5)),
            row("HAY2201", dec!(100)),
            row("BEN2201", dec!(50)),
            row("TWC2201", dec!(-10)),
        ];
        let by_island = meta.aggregate_by(&rows, "Island", |e| e.demand, Aggregation::Sum)?;
        assert_eq!(by_island.get("NI"), Some(&dec!(400.5)));
        assert_eq!(by_island.get("SI"), Some(&dec!(50)));
        assert_eq!(by_island.len(), 2);
        assert!(meta
            .aggregate_by(&rows, "Zone", |e| e.demand, Aggregation::Sum)
            .is_err());
        Ok(())
    }

    #[test]
    fn other_aggregations() -> Result<(), Box<dyn Error>> {
        let meta = NodeMeta::from_reader(DATA.as_bytes())?;
        let rows = vec![
            row("OTA2201", dec!(300.5)),
            row("HAY2201", dec!(100)),
            row("OTA2201", dec!(19.5)),
            row("BEN2201", dec!(50)),
        ];
        let mean = meta.aggregate_by(&rows, "Island", |e| e.demand, Aggregation::Mean)?;
        assert_eq!(mean.get("NI"), Some(&dec!(140)));
        assert_eq!(mean.get("SI"), Some(&dec!(50)));
        let mean = meta.aggregate_by(&rows, "Region", |e| e.demand, Aggregation::Mean)?;
        assert_eq!(mean.get("Auckland"), Some(&dec!(160)));
        let min = meta.aggregate_by(&rows, "Island", |e| e.demand, Aggregation::Min)?;
        assert_eq!(min.get("NI"), Some(&dec!(19.5)));
        let max = meta.aggregate_by(&rows, "Island", |e| e.demand, Aggregation::Max)?;
        assert_eq!(max.get("NI"), Some(&dec!(300.5)));
        Ok(())
    }

    #[test]
    fn parse_aggregation() {
        assert_eq!("Mean".parse::<Aggregation>(), Ok(Aggregation::Mean));
        assert_eq!("sum".parse::<Aggregation>(), Ok(Aggregation::Sum));
        assert_eq!(Aggregation::Max.to_string(), "max");
        assert!("median".parse::<Aggregation>().is_err());
    }
}
