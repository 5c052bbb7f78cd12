use super::RatingHeader;
use crate::error::Result;
use crate::table::RatingTable;

/// A rating backed directly by one (possibly nested) table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRating {
    pub header: RatingHeader,
    pub table: RatingTable,
}

impl TableRating {
    pub fn new(header: RatingHeader, table: RatingTable) -> Result<Self> {
        header.validate(table.ind_param_count())?;
        Ok(Self { header, table })
    }

    pub fn rate(&self, ind_values: &[f64]) -> Result<Option<f64>> {
        self.table.rate(ind_values)
    }

    pub fn reverse_rate(&self, dep_value: f64) -> Result<Option<f64>> {
        self.table.reverse_rate(dep_value)
    }
}
