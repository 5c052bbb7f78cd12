//! Rating tables: ordered (independent, dependent) rows for one axis.
//!
//! A table for N independent parameters is a tree of depth N. Each row of
//! an outer table carries a nested table keyed on the next parameter, and
//! only the innermost tables carry scalar dependent values. Lookups
//! recurse into the (up to two) bracketing nested tables first and then
//! apply the outer axis' method to the intermediate results.
//!
//! Independent values are strictly ascending within every table; this is
//! checked at construction so lookups never see a malformed sequence.

use crate::error::{RangeBound, RatingError, Result};
use crate::method::{AxisMethods, RatingMethod, interpolate};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Flat point types (document / collaborator row format)
// ---------------------------------------------------------------------------

/// A single scalar row as delivered by documents and data sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingPoint {
    pub ind: f64,
    pub dep: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl RatingPoint {
    pub fn new(ind: f64, dep: f64) -> Self {
        Self { ind, dep, note: None }
    }
}

/// A run of points sharing the same values of the outer independent
/// parameters (`other_ind`, outermost first). Single-parameter ratings use
/// one group with an empty `other_ind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PointGroup {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other_ind: Vec<f64>,
    pub points: Vec<RatingPoint>,
}

// ---------------------------------------------------------------------------
// Table types
// ---------------------------------------------------------------------------

/// Dependent slot of a row: a scalar, or the table for the next parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum RowValue {
    Value(f64),
    Table(Box<RatingTable>),
}

/// One row of a rating table. Notes are only kept on scalar rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingTableRow {
    pub ind: f64,
    pub dep: RowValue,
    pub note: Option<String>,
}

impl RatingTableRow {
    pub fn value(ind: f64, dep: f64) -> Self {
        Self {
            ind,
            dep: RowValue::Value(dep),
            note: None,
        }
    }

    pub fn nested(ind: f64, table: RatingTable) -> Self {
        Self {
            ind,
            dep: RowValue::Table(Box::new(table)),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

impl From<&RatingPoint> for RatingTableRow {
    fn from(p: &RatingPoint) -> Self {
        Self {
            ind: p.ind,
            dep: RowValue::Value(p.dep),
            note: p.note.clone(),
        }
    }
}

/// An ordered sequence of rows for one independent parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingTable {
    rows: Vec<RatingTableRow>,
    methods: AxisMethods,
    other_ind: Vec<f64>,
    extension: Option<Vec<RatingTableRow>>,
}

/// Where a query value sorts relative to a row sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Below,
    Exact(usize),
    Between(usize),
    Above,
}

fn locate(len: usize, ind_at: impl Fn(usize) -> f64, x: f64) -> Position {
    if x < ind_at(0) {
        return Position::Below;
    }
    let last = len - 1;
    if x > ind_at(last) {
        return Position::Above;
    }
    let (mut lo, mut hi) = (0, last);
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        if x < ind_at(mid) {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    if x == ind_at(lo) {
        Position::Exact(lo)
    } else if x == ind_at(hi) {
        Position::Exact(hi)
    } else {
        Position::Between(lo)
    }
}

fn check_ascending(inds: impl Iterator<Item = f64>, what: &str) -> Result<()> {
    let mut previous: Option<f64> = None;
    for (i, x) in inds.enumerate() {
        if !x.is_finite() {
            return Err(RatingError::construction(format!(
                "{} independent value at row {} is not finite",
                what, i
            )));
        }
        if let Some(p) = previous {
            if x <= p {
                return Err(RatingError::construction(format!(
                    "{} independent values are not strictly increasing at row {} ({} after {})",
                    what, i, x, p
                )));
            }
        }
        previous = Some(x);
    }
    Ok(())
}

impl RatingTable {
    /// Builds a table, validating ordering and row shape.
    ///
    /// Rows must be non-empty, strictly ascending by independent value and
    /// either all scalar or all nested tables of the same depth. Nested
    /// tables get their `other_ind` path assigned from the enclosing rows.
    pub fn new(rows: Vec<RatingTableRow>, methods: AxisMethods) -> Result<Self> {
        if rows.is_empty() {
            return Err(RatingError::construction("rating table has no rows"));
        }
        check_ascending(rows.iter().map(|r| r.ind), "table")?;

        let leaf = matches!(rows[0].dep, RowValue::Value(_));
        let mut nested_depth: Option<usize> = None;
        for (i, row) in rows.iter().enumerate() {
            match &row.dep {
                RowValue::Value(y) => {
                    if !leaf {
                        return Err(RatingError::construction(format!(
                            "row {} mixes a scalar with nested tables",
                            i
                        )));
                    }
                    if !y.is_finite() {
                        return Err(RatingError::construction(format!(
                            "dependent value at row {} is not finite",
                            i
                        )));
                    }
                }
                RowValue::Table(t) => {
                    if leaf {
                        return Err(RatingError::construction(format!(
                            "row {} mixes a nested table with scalars",
                            i
                        )));
                    }
                    let depth = t.ind_param_count();
                    if *nested_depth.get_or_insert(depth) != depth {
                        return Err(RatingError::construction(format!(
                            "nested table at row {} has {} parameters, expected {}",
                            i,
                            depth,
                            nested_depth.unwrap_or(depth)
                        )));
                    }
                }
            }
        }

        let mut table = Self {
            rows,
            methods,
            other_ind: Vec::new(),
            extension: None,
        };
        table.assign_other_ind(Vec::new());
        Ok(table)
    }

    /// Single-parameter table from `(ind, dep)` pairs.
    pub fn from_pairs(pairs: &[(f64, f64)], methods: AxisMethods) -> Result<Self> {
        let rows = pairs
            .iter()
            .map(|&(x, y)| RatingTableRow::value(x, y))
            .collect();
        Self::new(rows, methods)
    }

    /// Single-parameter table from flat points, keeping notes.
    pub fn from_points(points: &[RatingPoint], methods: AxisMethods) -> Result<Self> {
        Self::new(points.iter().map(RatingTableRow::from).collect(), methods)
    }

    /// Builds the nested tree from flat point groups.
    ///
    /// `methods` holds one entry per independent parameter, outermost
    /// first. Groups for the same outer value must be contiguous.
    pub fn from_point_groups(groups: &[PointGroup], methods: &[AxisMethods]) -> Result<Self> {
        let first = groups
            .first()
            .ok_or_else(|| RatingError::construction("rating has no rating-points"))?;
        let ind_count = first.other_ind.len() + 1;
        if let Some(bad) = groups.iter().find(|g| g.other_ind.len() + 1 != ind_count) {
            return Err(RatingError::construction(format!(
                "rating-points group has {} other-ind values, expected {}",
                bad.other_ind.len(),
                ind_count - 1
            )));
        }
        if methods.len() != ind_count {
            return Err(RatingError::construction(format!(
                "{} axis method sets supplied for {} independent parameters",
                methods.len(),
                ind_count
            )));
        }
        let refs: Vec<&PointGroup> = groups.iter().collect();
        Self::build_level(&refs, methods, 0)
    }

    fn build_level(groups: &[&PointGroup], methods: &[AxisMethods], depth: usize) -> Result<Self> {
        if depth == methods.len() - 1 {
            let rows = groups
                .iter()
                .flat_map(|g| g.points.iter().map(RatingTableRow::from))
                .collect();
            return Self::new(rows, methods[depth]);
        }
        let mut rows = Vec::new();
        let mut start = 0;
        while start < groups.len() {
            let key = groups[start].other_ind[depth];
            let mut end = start + 1;
            while end < groups.len() && groups[end].other_ind[depth] == key {
                end += 1;
            }
            let child = Self::build_level(&groups[start..end], methods, depth + 1)?;
            rows.push(RatingTableRow::nested(key, child));
            start = end;
        }
        Self::new(rows, methods[depth])
    }

    /// Attaches extension rows used for extrapolation beyond the table.
    ///
    /// Only single-parameter tables accept extensions. Extension rows that
    /// fall inside the table's own range are ignored during lookups.
    pub fn with_extension(mut self, points: &[RatingPoint]) -> Result<Self> {
        if !self.is_leaf() {
            return Err(RatingError::construction(
                "extension rows are only allowed on single-parameter tables",
            ));
        }
        if points.is_empty() {
            self.extension = None;
            return Ok(self);
        }
        check_ascending(points.iter().map(|p| p.ind), "extension")?;
        if let Some(p) = points.iter().find(|p| !p.dep.is_finite()) {
            return Err(RatingError::construction(format!(
                "extension dependent value at {} is not finite",
                p.ind
            )));
        }
        self.extension = Some(points.iter().map(RatingTableRow::from).collect());
        Ok(self)
    }

    fn assign_other_ind(&mut self, path: Vec<f64>) {
        for row in &mut self.rows {
            if let RowValue::Table(child) = &mut row.dep {
                let mut child_path = path.clone();
                child_path.push(row.ind);
                child.assign_other_ind(child_path);
                row.note = None;
            }
        }
        self.other_ind = path;
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn rows(&self) -> &[RatingTableRow] {
        &self.rows
    }

    pub fn methods(&self) -> AxisMethods {
        self.methods
    }

    /// Values of the outer parameters leading to this table.
    pub fn other_ind(&self) -> &[f64] {
        &self.other_ind
    }

    pub fn extension(&self) -> Option<&[RatingTableRow]> {
        self.extension.as_deref()
    }

    /// True when rows carry scalars (the innermost axis).
    pub fn is_leaf(&self) -> bool {
        matches!(self.rows[0].dep, RowValue::Value(_))
    }

    /// Number of independent parameters, i.e. the depth of the tree.
    pub fn ind_param_count(&self) -> usize {
        match &self.rows[0].dep {
            RowValue::Value(_) => 1,
            RowValue::Table(t) => 1 + t.ind_param_count(),
        }
    }

    /// Axis methods from the outermost table down to the innermost.
    pub fn axis_methods(&self) -> Vec<AxisMethods> {
        let mut out = vec![self.methods];
        if let RowValue::Table(t) = &self.rows[0].dep {
            out.extend(t.axis_methods());
        }
        out
    }

    pub fn independent_values(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.ind).collect()
    }

    /// Flattens the tree back to point groups, outer values first.
    pub fn to_point_groups(&self) -> Vec<PointGroup> {
        let mut groups = Vec::new();
        self.flatten_into(&mut Vec::new(), &mut groups);
        groups
    }

    fn flatten_into(&self, path: &mut Vec<f64>, groups: &mut Vec<PointGroup>) {
        if self.is_leaf() {
            groups.push(PointGroup {
                other_ind: path.clone(),
                points: self.points(),
            });
            return;
        }
        for row in &self.rows {
            if let RowValue::Table(child) = &row.dep {
                path.push(row.ind);
                child.flatten_into(path, groups);
                path.pop();
            }
        }
    }

    /// Scalar rows of this table; empty for an outer (nested) table.
    pub fn points(&self) -> Vec<RatingPoint> {
        self.rows.iter().filter_map(leaf_point).collect()
    }

    pub fn extension_points(&self) -> Vec<RatingPoint> {
        self.extension
            .iter()
            .flatten()
            .filter_map(leaf_point)
            .collect()
    }

    /// Minimum and maximum of every parameter, independents first and the
    /// dependent parameter last.
    pub fn extents(&self) -> (Vec<f64>, Vec<f64>) {
        let n = self.ind_param_count() + 1;
        let mut mins = vec![f64::INFINITY; n];
        let mut maxs = vec![f64::NEG_INFINITY; n];
        self.fill_extents(0, &mut mins, &mut maxs);
        (mins, maxs)
    }

    fn fill_extents(&self, level: usize, mins: &mut [f64], maxs: &mut [f64]) {
        mins[level] = mins[level].min(self.rows[0].ind);
        maxs[level] = maxs[level].max(self.rows[self.rows.len() - 1].ind);
        for row in &self.rows {
            match &row.dep {
                RowValue::Value(y) => {
                    mins[level + 1] = mins[level + 1].min(*y);
                    maxs[level + 1] = maxs[level + 1].max(*y);
                }
                RowValue::Table(t) => t.fill_extents(level + 1, mins, maxs),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Forward lookup
    // -----------------------------------------------------------------------

    /// Rates one set of independent values (outermost parameter first).
    ///
    /// Returns `Ok(None)` when a `NULL` method applies or a query value is
    /// not finite.
    pub fn rate(&self, ind_values: &[f64]) -> Result<Option<f64>> {
        let expected = self.ind_param_count();
        if ind_values.len() != expected {
            return Err(RatingError::ParameterCount {
                expected,
                actual: ind_values.len(),
            });
        }
        self.rate_at(ind_values)
    }

    fn rate_at(&self, inds: &[f64]) -> Result<Option<f64>> {
        let x = inds[0];
        if !x.is_finite() {
            return Ok(None);
        }
        let rest = &inds[1..];
        match locate(self.rows.len(), |i| self.rows[i].ind, x) {
            Position::Exact(i) => row_value(&self.rows[i], rest),
            Position::Between(lo) => pair_value(
                self.methods.in_range,
                x,
                &self.rows[lo],
                &self.rows[lo + 1],
                rest,
                RangeBound::InRange,
            ),
            Position::Below => self.rate_out_of_range(x, RangeBound::Low, rest),
            Position::Above => self.rate_out_of_range(x, RangeBound::High, rest),
        }
    }

    fn rate_out_of_range(&self, x: f64, bound: RangeBound, rest: &[f64]) -> Result<Option<f64>> {
        let (method, boundary) = match bound {
            RangeBound::Low => (self.methods.out_range_low, &self.rows[0]),
            _ => (self.methods.out_range_high, &self.rows[self.rows.len() - 1]),
        };
        match method {
            RatingMethod::Null => Ok(None),
            RatingMethod::Error => Err(RatingError::RangeViolation { value: x, bound }),
            m if m.is_interpolating() => self.extrapolate(m, x, bound, rest),
            _ => row_value(boundary, rest),
        }
    }

    fn extrapolate(
        &self,
        method: RatingMethod,
        x: f64,
        bound: RangeBound,
        rest: &[f64],
    ) -> Result<Option<f64>> {
        let merged = self.effective_rows();
        let n = merged.len();
        if n == 1 {
            return row_value(merged[0], rest);
        }
        let (lo, hi) = match locate(n, |i| merged[i].ind, x) {
            Position::Exact(i) => return row_value(merged[i], rest),
            Position::Between(lo) => (lo, lo + 1),
            Position::Below => (0, 1),
            Position::Above => (n - 2, n - 1),
        };
        pair_value(method, x, merged[lo], merged[hi], rest, bound)
    }

    /// Base rows with extension rows spliced in below and above.
    fn effective_rows(&self) -> Vec<&RatingTableRow> {
        let Some(ext) = &self.extension else {
            return self.rows.iter().collect();
        };
        let first = self.rows[0].ind;
        let last = self.rows[self.rows.len() - 1].ind;
        ext.iter()
            .filter(|r| r.ind < first)
            .chain(self.rows.iter())
            .chain(ext.iter().filter(|r| r.ind > last))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Reverse lookup
    // -----------------------------------------------------------------------

    /// Solves for the independent value producing `dep_value`.
    ///
    /// Only single-parameter tables whose dependent values are strictly
    /// monotonic can be reversed.
    pub fn reverse_rate(&self, dep_value: f64) -> Result<Option<f64>> {
        self.reversed()?.rate_at(&[dep_value])
    }

    /// The table with independent and dependent axes swapped.
    pub fn reversed(&self) -> Result<RatingTable> {
        if !self.is_leaf() {
            return Err(RatingError::NotInvertible(
                "cannot reverse a table with more than one independent parameter".into(),
            ));
        }
        let points = self.points();
        let descending = monotonic_direction(&points)?;
        let swap = |pts: &[RatingPoint]| -> Vec<RatingPoint> {
            let mut out: Vec<RatingPoint> = pts
                .iter()
                .map(|p| RatingPoint {
                    ind: p.dep,
                    dep: p.ind,
                    note: p.note.clone(),
                })
                .collect();
            if descending {
                out.reverse();
            }
            out
        };

        let rows = swap(&points).iter().map(RatingTableRow::from).collect();
        let reversed = RatingTable::new(rows, self.methods.reversed(descending))
            .map_err(|e| RatingError::NotInvertible(e.to_string()))?;
        let ext = self.extension_points();
        if ext.is_empty() {
            return Ok(reversed);
        }
        if monotonic_direction(&ext)? != descending {
            return Err(RatingError::NotInvertible(
                "extension rows run in the opposite direction to the table".into(),
            ));
        }
        reversed
            .with_extension(&swap(&ext))
            .map_err(|e| RatingError::NotInvertible(e.to_string()))
    }
}

fn leaf_point(row: &RatingTableRow) -> Option<RatingPoint> {
    match row.dep {
        RowValue::Value(dep) => Some(RatingPoint {
            ind: row.ind,
            dep,
            note: row.note.clone(),
        }),
        RowValue::Table(_) => None,
    }
}

/// `Ok(false)` for strictly increasing dependent values, `Ok(true)` for
/// strictly decreasing ones.
fn monotonic_direction(points: &[RatingPoint]) -> Result<bool> {
    if points.len() < 2 {
        return Err(RatingError::NotInvertible(
            "at least two rows are needed to reverse a table".into(),
        ));
    }
    let increasing = points.windows(2).all(|w| w[1].dep > w[0].dep);
    let decreasing = points.windows(2).all(|w| w[1].dep < w[0].dep);
    match (increasing, decreasing) {
        (true, _) => Ok(false),
        (_, true) => Ok(true),
        _ => Err(RatingError::NotInvertible(
            "dependent values are not strictly monotonic".into(),
        )),
    }
}

fn row_value(row: &RatingTableRow, rest: &[f64]) -> Result<Option<f64>> {
    match &row.dep {
        RowValue::Value(y) => Ok(Some(*y)),
        RowValue::Table(t) => t.rate_at(rest),
    }
}

/// Applies `method` to query `x` with the bracketing (or extrapolation)
/// rows `r0` < `r1`.
fn pair_value(
    method: RatingMethod,
    x: f64,
    r0: &RatingTableRow,
    r1: &RatingTableRow,
    rest: &[f64],
    bound: RangeBound,
) -> Result<Option<f64>> {
    match method {
        RatingMethod::Null => Ok(None),
        RatingMethod::Error => Err(RatingError::RangeViolation { value: x, bound }),
        RatingMethod::Previous => row_value(r0, rest),
        RatingMethod::Next => row_value(r1, rest),
        RatingMethod::Nearest | RatingMethod::Closest => {
            if (x - r0.ind).abs() <= (r1.ind - x).abs() {
                row_value(r0, rest)
            } else {
                row_value(r1, rest)
            }
        }
        RatingMethod::Lower | RatingMethod::Higher => {
            let (Some(y0), Some(y1)) = (row_value(r0, rest)?, row_value(r1, rest)?) else {
                return Ok(None);
            };
            Ok(Some(if method == RatingMethod::Lower {
                y0.min(y1)
            } else {
                y0.max(y1)
            }))
        }
        _ => {
            let (Some(y0), Some(y1)) = (row_value(r0, rest)?, row_value(r1, rest)?) else {
                return Ok(None);
            };
            interpolate(method, x, (r0.ind, y0), (r1.ind, y1)).map(Some)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
