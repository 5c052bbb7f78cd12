//! Model <-> document conversion.

use super::{
    ExpressionRatingDoc, HeaderDoc, OffsetsDoc, RatingDoc, RatingsDocument, ShiftDoc, StreamRatingDoc,
    TableRatingDoc, TransitionalRatingDoc, VirtualRatingDoc,
};
use crate::catalog::RatingCatalog;
use crate::error::{RatingError, Result};
use crate::loading::{InMemorySource, LoadStrategy, PendingRating};
use crate::method::AxisMethods;
use crate::rating::{
    Condition, ExpressionRating, Formula, Rating, RatingHeader, TableRating, TransitionalRating,
    UsgsStreamTableRating, VirtualRating,
};
use crate::set::RatingSet;
use crate::table::RatingTable;
use crate::template::{RatingSpec, RatingTemplate, template_id_from_spec_id};
use crate::units::{format_units_id, parse_units_id};
use std::sync::Arc;
use tracing::info;

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

impl HeaderDoc {
    pub fn to_header(&self) -> Result<RatingHeader> {
        Ok(RatingHeader {
            office_id: self.office_id.clone(),
            rating_spec_id: self.rating_spec_id.clone(),
            units: parse_units_id(&self.units_id)?,
            effective_date: self.effective_date,
            transition_start_date: self.transition_start_date,
            create_date: self.create_date,
            active: self.active,
            description: self.description.clone(),
            vertical_datum: self.vertical_datum_info.clone(),
        })
    }

    pub fn from_header(header: &RatingHeader) -> Self {
        Self {
            office_id: header.office_id.clone(),
            rating_spec_id: header.rating_spec_id.clone(),
            units_id: format_units_id(&header.units),
            effective_date: header.effective_date,
            transition_start_date: header.transition_start_date,
            create_date: header.create_date,
            active: header.active,
            description: header.description.clone(),
            vertical_datum_info: header.vertical_datum.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Ratings
// ---------------------------------------------------------------------------

fn base_methods<'a>(
    explicit: Option<&'a [AxisMethods]>,
    template: Option<&'a [AxisMethods]>,
    spec_id: &str,
) -> Result<&'a [AxisMethods]> {
    explicit.or(template).ok_or_else(|| {
        RatingError::construction(format!(
            "{}: no rating template and no ind-methods to supply rating methods",
            spec_id
        ))
    })
}

/// Explicit methods are written only when they differ from the template.
fn explicit_methods(actual: Vec<AxisMethods>, template: Option<&[AxisMethods]>) -> Option<Vec<AxisMethods>> {
    match template {
        Some(t) if t == actual.as_slice() => None,
        _ => Some(actual),
    }
}

impl RatingDoc {
    /// Builds the model rating. `template_methods` are the base-table
    /// methods from the matching template, if any.
    pub fn to_rating(&self, template_methods: Option<&[AxisMethods]>) -> Result<Rating> {
        match self {
            RatingDoc::Rating(doc) => {
                let header = doc.header.to_header()?;
                let methods = base_methods(doc.ind_methods.as_deref(), template_methods, &header.rating_spec_id)?;
                let table = RatingTable::from_point_groups(&doc.rating_points, methods)?
                    .with_extension(&doc.extension_points)?;
                Ok(TableRating::new(header, table)?.into())
            }
            RatingDoc::UsgsStreamRating(doc) => {
                let header = doc.header.to_header()?;
                let methods = base_methods(doc.ind_methods.as_deref(), template_methods, &header.rating_spec_id)?;
                let base = RatingTable::from_point_groups(&doc.rating_points, methods)?
                    .with_extension(&doc.extension_points)?;
                let offsets = doc
                    .height_offsets
                    .as_ref()
                    .map(|o| RatingTable::from_points(&o.points, o.methods))
                    .transpose()?;
                let shifts = doc
                    .height_shifts
                    .iter()
                    .map(|s| TableRating::new(s.header.to_header()?, RatingTable::from_points(&s.points, s.methods)?))
                    .collect::<Result<Vec<_>>>()?;
                Ok(UsgsStreamTableRating::new(header, base, offsets, shifts)?.into())
            }
            RatingDoc::TransitionalRating(doc) => {
                let header = doc.header.to_header()?;
                let conditions = doc
                    .conditions
                    .iter()
                    .map(|c| Condition::parse(c))
                    .collect::<Result<Vec<_>>>()?;
                Ok(TransitionalRating::new(header, conditions, doc.source_ratings.clone())?.into())
            }
            RatingDoc::ExpressionRating(doc) => {
                let header = doc.header.to_header()?;
                Ok(ExpressionRating::new(header, Formula::parse(&doc.formula)?)?.into())
            }
            RatingDoc::VirtualRating(doc) => {
                let header = doc.header.to_header()?;
                Ok(VirtualRating::new(header, doc.source_ratings.clone(), &doc.connections)?.into())
            }
        }
    }

    pub fn from_rating(rating: &Rating, template_methods: Option<&[AxisMethods]>) -> Self {
        match rating {
            Rating::Table(r) => RatingDoc::Rating(TableRatingDoc {
                header: HeaderDoc::from_header(&r.header),
                ind_methods: explicit_methods(r.table.axis_methods(), template_methods),
                rating_points: r.table.to_point_groups(),
                extension_points: r.table.extension_points(),
            }),
            Rating::UsgsStream(r) => RatingDoc::UsgsStreamRating(StreamRatingDoc {
                header: HeaderDoc::from_header(&r.header),
                ind_methods: explicit_methods(r.base.axis_methods(), template_methods),
                rating_points: r.base.to_point_groups(),
                extension_points: r.base.extension_points(),
                height_offsets: r.offsets.as_ref().map(|o| OffsetsDoc {
                    methods: o.methods(),
                    points: o.points(),
                }),
                height_shifts: r
                    .shifts
                    .iter()
                    .map(|s| ShiftDoc {
                        header: HeaderDoc::from_header(&s.header),
                        methods: s.table.methods(),
                        points: s.table.points(),
                    })
                    .collect(),
            }),
            Rating::Transitional(r) => RatingDoc::TransitionalRating(TransitionalRatingDoc {
                header: HeaderDoc::from_header(&r.header),
                conditions: r.conditions().iter().map(|c| c.as_str().to_string()).collect(),
                source_ratings: r.sources().to_vec(),
            }),
            Rating::Expression(r) => RatingDoc::ExpressionRating(ExpressionRatingDoc {
                header: HeaderDoc::from_header(&r.header),
                formula: r.formula().as_str().to_string(),
            }),
            Rating::Virtual(r) => RatingDoc::VirtualRating(VirtualRatingDoc {
                header: HeaderDoc::from_header(&r.header),
                source_ratings: r.sources().to_vec(),
                connections: r.connections().as_str().to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

impl RatingsDocument {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn spec_for(&self, spec_id: &str) -> Option<&RatingSpec> {
        self.rating_specs.iter().find(|s| s.rating_spec_id == spec_id)
    }

    /// Template matched through the spec, or through the spec id itself
    /// when the document carries no spec.
    pub fn template_for(&self, spec_id: &str) -> Option<&RatingTemplate> {
        let template_id = match self.spec_for(spec_id) {
            Some(spec) => spec.template_id.clone(),
            None => template_id_from_spec_id(spec_id)?,
        };
        self.rating_templates
            .iter()
            .find(|t| t.template_id() == template_id)
    }

    /// Distinct rating spec ids, in order of first appearance.
    pub fn spec_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for doc in &self.ratings {
            let id = doc.header().rating_spec_id.as_str();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Every rating of `spec_id`, in document order.
    pub fn ratings_for(&self, spec_id: &str) -> Result<Vec<Rating>> {
        let template_methods = self.template_for(spec_id).map(RatingTemplate::axis_methods);
        self.ratings
            .iter()
            .filter(|d| d.header().rating_spec_id == spec_id)
            .map(|d| d.to_rating(template_methods.as_deref()))
            .collect()
    }

    /// Builds the set for `spec_id` (eager).
    pub fn rating_set(&self, spec_id: &str) -> Result<RatingSet> {
        self.rating_set_with(spec_id, LoadStrategy::Eager)
    }

    /// Builds the set for `spec_id` with the given loading strategy. Lazy
    /// sets are served from an in-memory copy of the document's rows.
    pub fn rating_set_with(&self, spec_id: &str, strategy: LoadStrategy) -> Result<RatingSet> {
        let template = self.template_for(spec_id).cloned();
        let spec = self.spec_for(spec_id).cloned();
        if strategy == LoadStrategy::Reference {
            let office = spec.as_ref().and_then(|s| s.office_id.clone());
            return Ok(RatingSet::reference(office.as_deref(), spec_id)?.with_metadata(template, spec));
        }

        let ratings = self.ratings_for(spec_id)?;
        if ratings.is_empty() {
            return Err(RatingError::construction(format!(
                "document has no ratings for {}",
                spec_id
            )));
        }
        let office = spec
            .as_ref()
            .and_then(|s| s.office_id.clone())
            .or_else(|| ratings[0].header().office_id.clone());

        let set = match strategy {
            LoadStrategy::Lazy => {
                let mut source = InMemorySource::new();
                let mut pending = Vec::with_capacity(ratings.len());
                for (i, rating) in ratings.iter().enumerate() {
                    let (p, rows) = PendingRating::from_rating(rating, format!("{}#{}", spec_id, i));
                    source.insert(p.handle.clone(), rows);
                    pending.push(p);
                }
                RatingSet::lazy(office.as_deref(), spec_id, pending, Arc::new(source))?
            }
            _ => RatingSet::new(office.as_deref(), spec_id, ratings)?,
        };
        info!(spec = %spec_id, strategy = ?strategy, versions = set.rating_count(), "rating set loaded from document");
        Ok(set.with_metadata(template, spec))
    }

    /// One eager set per spec id in the document. Circular source
    /// references are rejected here rather than at evaluation time.
    pub fn catalog(&self) -> Result<RatingCatalog> {
        let mut catalog = RatingCatalog::new();
        for spec_id in self.spec_ids() {
            catalog.insert(self.rating_set(spec_id)?);
        }
        catalog.check_source_graph()?;
        Ok(catalog)
    }
}

impl RatingSet {
    pub fn from_document(doc: &RatingsDocument, spec_id: &str) -> Result<Self> {
        doc.rating_set(spec_id)
    }

    /// Serializes the set with its template and spec. Unloaded sets fail
    /// with `DataNotLoaded`.
    pub fn to_document(&self) -> Result<RatingsDocument> {
        let ratings = self.ratings()?;
        let template_methods = self.template().map(RatingTemplate::axis_methods);
        Ok(RatingsDocument {
            rating_templates: self.template().cloned().into_iter().collect(),
            rating_specs: self.spec().cloned().into_iter().collect(),
            ratings: ratings
                .iter()
                .map(|r| RatingDoc::from_rating(r, template_methods.as_deref()))
                .collect(),
        })
    }
}

impl RatingCatalog {
    pub fn from_document(doc: &RatingsDocument) -> Result<Self> {
        doc.catalog()
    }

    /// Serializes every loaded set into one document, sets in spec id order.
    pub fn to_document(&self) -> Result<RatingsDocument> {
        let mut out = RatingsDocument::default();
        for spec_id in self.spec_ids() {
            let Some(set) = self.get(spec_id) else {
                continue;
            };
            let doc = set.to_document()?;
            for template in doc.rating_templates {
                if !out.rating_templates.contains(&template) {
                    out.rating_templates.push(template);
                }
            }
            out.rating_specs.extend(doc.rating_specs);
            out.ratings.extend(doc.ratings);
        }
        Ok(out)
    }
}
