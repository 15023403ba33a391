//! Graph entities derived from variant rows.
//!
//! Each data row yields exactly one [`Node`] and at most one [`Link`].

use serde::{Deserialize, Serialize};

use crate::{err::Error, record::Row};

/// INFO key holding the reference SNP cluster identifier.
pub const KEY_RS: &str = "RS";
/// INFO key of the ESP allele frequency.
pub const KEY_AF_ESP: &str = "AF_ESP";
/// INFO key of the ExAC allele frequency.
pub const KEY_AF_EXAC: &str = "AF_EXAC";
/// INFO key of the 1000 Genomes allele frequency.
pub const KEY_AF_TGP: &str = "AF_TGP";
/// INFO key of the ClinVar allele identifier.
pub const KEY_ALLELEID: &str = "ALLELEID";

/// A variant vertex for the graph store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "CHROM")]
    pub chrom: String,
    /// 1-based position
    #[serde(rename = "POS")]
    pub pos: i64,
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "REF")]
    pub reference: String,
    #[serde(rename = "ALT")]
    pub alternative: String,
    #[serde(rename = "AF_ESP")]
    pub af_esp: Option<f64>,
    #[serde(rename = "AF_EXAC")]
    pub af_exac: Option<f64>,
    #[serde(rename = "AF_TGP")]
    pub af_tgp: Option<f64>,
    #[serde(rename = "ALLELEID")]
    pub allele_id: Option<i64>,
}

impl Node {
    /// Project `row` onto a node.
    pub fn from_row(row: &Row) -> Result<Self, Error> {
        let pos = row
            .pos()
            .parse::<i64>()
            .map_err(|e| Error::malformed(row.line(), format!("invalid POS {:?}: {}", row.pos(), e)))?;

        // Keys are resolved in this order; each takes the first matching token.
        let af_esp = parse_frequency(row, KEY_AF_ESP)?;
        let af_exac = parse_frequency(row, KEY_AF_EXAC)?;
        let af_tgp = parse_frequency(row, KEY_AF_TGP)?;
        let allele_id = parse_info(row, KEY_ALLELEID)?;

        Ok(Self {
            chrom: row.chrom().to_owned(),
            pos,
            id: row.id().to_owned(),
            reference: row.reference().to_owned(),
            alternative: row.alternative().to_owned(),
            af_esp,
            af_exac,
            af_tgp,
            allele_id,
        })
    }
}

/// Look up `key` in the INFO column of `row` and parse the value, if any.
fn parse_info<T>(row: &Row, key: &str) -> Result<Option<T>, Error>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    row.info()
        .get(key)
        .map(|value| {
            value.parse::<T>().map_err(|e| {
                Error::malformed(row.line(), format!("invalid {} value {:?}: {}", key, value, e))
            })
        })
        .transpose()
}

/// Like [`parse_info`] but rejects `nan` and `inf`, which JSON cannot represent.
fn parse_frequency(row: &Row, key: &str) -> Result<Option<f64>, Error> {
    match parse_info::<f64>(row, key)? {
        Some(value) if !value.is_finite() => Err(Error::malformed(
            row.line(),
            format!("non-finite {} value {}", key, value),
        )),
        value => Ok(value),
    }
}

/// An edge from a variant to its reference SNP cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(rename = "_from")]
    pub from: String,
    #[serde(rename = "_to")]
    pub to: String,
}

impl Link {
    /// Project `row` onto a link; rows without an `RS` annotation have none.
    pub fn from_row(row: &Row) -> Option<Self> {
        row.info().get(KEY_RS).map(|rs| Self {
            from: row.id().to_owned(),
            to: rs.to_owned(),
        })
    }
}

/// Project `row` onto its node and optional link.
pub fn project(row: &Row) -> Result<(Node, Option<Link>), Error> {
    Ok((Node::from_row(row)?, Link::from_row(row)))
}
