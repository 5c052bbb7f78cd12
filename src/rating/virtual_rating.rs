//! Virtual ratings: a network of source ratings wired together by
//! connections.
//!
//! Connection points are `I<n>` (the virtual rating's n-th independent
//! value), `D` (its dependent value), `R<n>I<m>` (the m-th independent
//! value of source n) and `R<n>D` (source n's dependent value), all
//! 1-based. Each connection `a=b` feeds one source input (or `D`) from an
//! external input or from another source's output, e.g.
//! `R1I1=I1,R2I1=R1D,D=R2D`. When `D` is not connected it defaults to the
//! only source output that feeds nothing else.

use super::{RateContext, RatingHeader, rate_source};
use crate::error::{RatingError, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Point {
    Input(usize),
    Output,
    SourceInput(usize, usize),
    SourceOutput(usize),
}

impl Point {
    fn parse(token: &str) -> Option<Self> {
        fn index(digits: &str) -> Option<usize> {
            digits.parse::<usize>().ok().filter(|n| *n > 0)
        }
        if token == "D" {
            return Some(Point::Output);
        }
        if let Some(rest) = token.strip_prefix('I') {
            return index(rest).map(Point::Input);
        }
        let rest = token.strip_prefix('R')?;
        let split = rest.find(|c: char| !c.is_ascii_digit())?;
        let source = index(&rest[..split])?;
        match &rest[split..] {
            "D" => Some(Point::SourceOutput(source)),
            tail => {
                let param = index(tail.strip_prefix('I')?)?;
                Some(Point::SourceInput(source, param))
            }
        }
    }
}

/// Where a source input takes its value from (0-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Feed {
    External(usize),
    Source(usize),
}

/// Validated wiring of a virtual rating. Equality compares the normalized
/// connection text.
#[derive(Debug, Clone)]
pub struct Connections {
    text: String,
    /// Inputs of each source, in parameter order.
    feeds: Vec<Vec<Feed>>,
    /// Source whose output is the virtual rating's dependent value.
    output: usize,
    /// Sources in dependency order.
    order: Vec<usize>,
}

impl PartialEq for Connections {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl fmt::Display for Connections {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl Connections {
    pub fn parse(text: &str, source_count: usize, ind_params: usize) -> Result<Self> {
        let invalid = |what: String| RatingError::construction(format!("invalid connections \"{}\": {}", text, what));
        let normalized: String = text
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();
        if normalized.is_empty() {
            return Err(invalid("no connections".into()));
        }

        let mut inputs: Vec<Vec<Option<Feed>>> = vec![Vec::new(); source_count];
        let mut output = None;
        for pair in normalized.split(',') {
            let mut sides = pair.split('=');
            let (Some(a), Some(b), None) = (sides.next(), sides.next(), sides.next()) else {
                return Err(invalid(format!("\"{}\" is not of the form a=b", pair)));
            };
            let (Some(a), Some(b)) = (Point::parse(a), Point::parse(b)) else {
                return Err(invalid(format!("unknown connection point in \"{}\"", pair)));
            };
            let (sink, feed) = match (a, b) {
                (Point::SourceInput(..) | Point::Output, _) => (a, b),
                (_, Point::SourceInput(..) | Point::Output) => (b, a),
                _ => return Err(invalid(format!("\"{}\" connects two outputs", pair))),
            };
            let feed = match feed {
                Point::Input(n) if n <= ind_params => Feed::External(n - 1),
                Point::SourceOutput(n) if n <= source_count => Feed::Source(n - 1),
                Point::Input(_) | Point::SourceOutput(_) => {
                    return Err(invalid(format!("\"{}\" refers past the available parameters", pair)));
                }
                _ => return Err(invalid(format!("\"{}\" connects two inputs", pair))),
            };
            match sink {
                Point::Output => {
                    let Feed::Source(n) = feed else {
                        return Err(invalid("D must be fed by a source rating".into()));
                    };
                    if output.replace(n).is_some() {
                        return Err(invalid("D is connected twice".into()));
                    }
                }
                Point::SourceInput(r, p) => {
                    if r > source_count {
                        return Err(invalid(format!("R{} does not exist", r)));
                    }
                    let slots = &mut inputs[r - 1];
                    if slots.len() < p {
                        slots.resize(p, None);
                    }
                    if slots[p - 1].replace(feed).is_some() {
                        return Err(invalid(format!("R{}I{} is connected twice", r, p)));
                    }
                }
                _ => unreachable!("sink is always D or a source input"),
            }
        }

        let mut feeds = Vec::with_capacity(source_count);
        for (r, slots) in inputs.into_iter().enumerate() {
            if slots.is_empty() {
                return Err(invalid(format!("R{} has no connected inputs", r + 1)));
            }
            let connected = slots
                .iter()
                .enumerate()
                .map(|(p, slot)| slot.ok_or_else(|| invalid(format!("R{}I{} is not connected", r + 1, p + 1))))
                .collect::<Result<Vec<Feed>>>()?;
            feeds.push(connected);
        }
        for n in 0..ind_params {
            if !feeds.iter().flatten().any(|f| *f == Feed::External(n)) {
                return Err(invalid(format!("I{} is not connected", n + 1)));
            }
        }

        let output = match output {
            Some(o) => o,
            None => {
                let unused: Vec<usize> = (0..source_count)
                    .filter(|r| !feeds.iter().flatten().any(|f| *f == Feed::Source(*r)))
                    .collect();
                match unused.as_slice() {
                    [only] => *only,
                    _ => return Err(invalid("D is not connected and no single source output is free".into())),
                }
            }
        };

        let mut order = Vec::with_capacity(source_count);
        let mut state = vec![Visit::New; source_count];
        visit(output, &feeds, &mut state, &mut order).map_err(|r| invalid(format!("R{} depends on itself", r + 1)))?;
        if let Some(r) = state.iter().position(|s| *s != Visit::Done) {
            return Err(invalid(format!("R{} does not lead to D", r + 1)));
        }

        Ok(Self {
            text: normalized,
            feeds,
            output,
            order,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    Active,
    Done,
}

/// Post-order walk from `r` through its source feeds. `Err` carries a
/// source found on its own dependency path.
fn visit(r: usize, feeds: &[Vec<Feed>], state: &mut [Visit], order: &mut Vec<usize>) -> std::result::Result<(), usize> {
    match state[r] {
        Visit::Done => return Ok(()),
        Visit::Active => return Err(r),
        Visit::New => {}
    }
    state[r] = Visit::Active;
    for feed in &feeds[r] {
        if let Feed::Source(upstream) = feed {
            visit(*upstream, feeds, state, order)?;
        }
    }
    state[r] = Visit::Done;
    order.push(r);
    Ok(())
}

// ---------------------------------------------------------------------------
// VirtualRating
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct VirtualRating {
    pub header: RatingHeader,
    sources: Vec<String>,
    connections: Connections,
}

impl VirtualRating {
    /// `sources` are rating spec ids, referred to as `R1`, `R2`, ... in
    /// `connections`.
    pub fn new(header: RatingHeader, sources: Vec<String>, connections: &str) -> Result<Self> {
        let ind_params = header.ind_param_count();
        header.validate(ind_params)?;
        if ind_params == 0 || sources.is_empty() {
            return Err(RatingError::construction(format!(
                "{}: virtual rating needs independent parameters and source ratings",
                header.rating_spec_id
            )));
        }
        if sources.iter().any(|s| *s == header.rating_spec_id) {
            return Err(RatingError::construction(format!(
                "{}: virtual rating lists itself as a source",
                header.rating_spec_id
            )));
        }
        let connections = Connections::parse(connections, sources.len(), ind_params)?;
        Ok(Self {
            header,
            sources,
            connections,
        })
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn connections(&self) -> &Connections {
        &self.connections
    }

    /// Rates every source in dependency order. An undefined source value
    /// makes everything downstream of it undefined.
    pub fn rate(&self, ctx: &RateContext<'_>, ind_values: &[f64]) -> Result<Option<f64>> {
        let mut values: Vec<Option<f64>> = vec![None; self.sources.len()];
        for &r in &self.connections.order {
            let inputs: Option<Vec<f64>> = self.connections.feeds[r]
                .iter()
                .map(|feed| match feed {
                    Feed::External(n) => ind_values.get(*n).copied(),
                    Feed::Source(s) => values[*s],
                })
                .collect();
            values[r] = match inputs {
                Some(inputs) => rate_source(ctx, &self.header.rating_spec_id, &self.sources[r], &inputs)?,
                None => None,
            };
        }
        Ok(values[self.connections.output])
    }

    pub fn reverse_rate(&self, _dep_value: f64) -> Result<Option<f64>> {
        Err(RatingError::NotInvertible(format!(
            "{}: virtual ratings cannot be reversed",
            self.header.rating_spec_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SourceRatings;
    use chrono::{TimeZone, Utc};

    /// "ELEV" adds 100, "STOR" doubles, "SUM" adds its two inputs, "GAP"
    /// is undefined everywhere.
    struct Stubs;

    impl SourceRatings for Stubs {
        fn rate_source(&self, spec_id: &str, _ctx: &RateContext<'_>, inds: &[f64]) -> Result<Option<f64>> {
            match spec_id {
                "ELEV" => Ok(Some(inds[0] + 100.0)),
                "STOR" => Ok(Some(2.0 * inds[0])),
                "SUM" => Ok(Some(inds[0] + inds[1])),
                "GAP" => Ok(None),
                other => Err(RatingError::SourceNotFound(other.to_string())),
            }
        }
    }

    fn header(units: &[&str]) -> RatingHeader {
        let t = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        RatingHeader::new("SWT", "X.Stage;Stor.Virtual.Test", units, t)
    }

    fn virtual_rating(units: &[&str], sources: &[&str], connections: &str) -> Result<VirtualRating> {
        VirtualRating::new(header(units), sources.iter().map(|s| s.to_string()).collect(), connections)
    }

    #[test]
    fn test_chain_with_default_output() {
        let r = virtual_rating(&["ft", "ac-ft"], &["ELEV", "STOR"], "r1i1 = i1, R2I1=R1D").unwrap();
        assert_eq!(r.connections().as_str(), "R1I1=I1,R2I1=R1D");
        let ctx = RateContext::at(Utc::now()).with_sources(&Stubs);
        assert_eq!(r.rate(&ctx, &[5.0]).unwrap(), Some(210.0));
    }

    #[test]
    fn test_two_inputs_and_explicit_output() {
        let r = virtual_rating(
            &["ft", "ft", "ft"],
            &["ELEV", "SUM"],
            "R1I1=I1,R2I1=R1D,R2I2=I2,D=R2D",
        )
        .unwrap();
        let ctx = RateContext::at(Utc::now()).with_sources(&Stubs);
        assert_eq!(r.rate(&ctx, &[5.0, 3.0]).unwrap(), Some(108.0));
    }

    #[test]
    fn test_undefined_source_propagates() {
        let r = virtual_rating(&["ft", "ac-ft"], &["GAP", "STOR"], "R1I1=I1,R2I1=R1D").unwrap();
        let ctx = RateContext::at(Utc::now()).with_sources(&Stubs);
        assert_eq!(r.rate(&ctx, &[5.0]).unwrap(), None);
    }

    #[test]
    fn test_missing_catalogue_is_source_not_found() {
        let r = virtual_rating(&["ft", "ac-ft"], &["ELEV", "STOR"], "R1I1=I1,R2I1=R1D").unwrap();
        assert_eq!(
            r.rate(&RateContext::at(Utc::now()), &[5.0]).unwrap_err(),
            RatingError::SourceNotFound("ELEV".into())
        );
    }

    #[test]
    fn test_invalid_wiring_rejected() {
        let cases = [
            ("R1I1=I1,R2I1=R2D", "source feeding itself"),
            ("R1I1=R2D,R2I1=R1D", "two sources feeding each other, I1 unused"),
            ("R1I1=I1", "R2 not connected"),
            ("R1I1=I1,R1I1=I1,R2I1=R1D", "input connected twice"),
            ("R1I1=I2,R2I1=R1D", "I2 does not exist"),
            ("R3I1=I1,R2I1=R1D", "R3 does not exist"),
            ("R1I1=I1,R2I2=R1D", "R2I1 left open"),
            ("R1D=R2D", "two outputs"),
            ("R1I1=I1,R2I1=I1", "two free outputs and no D"),
            ("R1I1", "not a pair"),
            ("", "empty"),
        ];
        for (connections, why) in cases {
            assert!(
                virtual_rating(&["ft", "ac-ft"], &["ELEV", "STOR"], connections).is_err(),
                "\"{}\" should be rejected: {}",
                connections,
                why
            );
        }
    }

    #[test]
    fn test_self_source_and_reverse() {
        let header = header(&["ft", "ac-ft"]);
        let own = header.rating_spec_id.clone();
        assert!(VirtualRating::new(header, vec![own], "R1I1=I1").is_err());
        let r = virtual_rating(&["ft", "ac-ft"], &["ELEV", "STOR"], "R1I1=I1,R2I1=R1D").unwrap();
        assert!(matches!(r.reverse_rate(1.0).unwrap_err(), RatingError::NotInvertible(_)));
    }
}
