//! Evaluation of fields at locations, with per-field caching of the last result.
use crate::error::{FieldError, Result};
use crate::field::{EvaluationInput, Field, FieldId, FieldValues, SourceLocation};
use crate::location::{DifferentialOperator, ElementXiLocation, FieldLocation, NodeLocation};
use crate::mesh::{ElementId, MeshTopology, NodeId};
use crate::module::FieldModule;
use log::trace;
use nalgebra::DVector;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// The last successful evaluation of one field.
///
/// Only valid for exactly the same location, including the requested derivatives, and for the
/// revision the field had when the values were computed.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValueCache {
    location: FieldLocation,
    revision: u64,
    values: FieldValues,
}

impl FieldValueCache {
    pub fn location(&self) -> &FieldLocation {
        &self.location
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    pub fn is_valid_for(&self, location: &FieldLocation, revision: u64) -> bool {
        self.revision == revision && &self.location == location
    }
}

/// An evaluation context for the fields of one module.
///
/// A cache is owned by a single thread of evaluation. Parallel clients create one cache per
/// worker, see [`evaluate_at_locations`].
#[derive(Debug)]
pub struct FieldCache {
    module: FieldModule,
    location: Option<FieldLocation>,
    time: f64,
    entries: FxHashMap<FieldId, FieldValueCache>,
}

impl FieldCache {
    pub fn new(module: &FieldModule) -> Self {
        Self {
            module: module.clone(),
            location: None,
            time: 0.0,
            entries: FxHashMap::default(),
        }
    }

    pub fn module(&self) -> &FieldModule {
        &self.module
    }

    /// The current location of the context, if one was set.
    pub fn location(&self) -> Option<&FieldLocation> {
        self.location.as_ref()
    }

    pub fn set_location(&mut self, location: impl Into<FieldLocation>) {
        let location = location.into();
        self.time = location.time();
        self.location = Some(location);
    }

    /// Moves the context to `xi` in `element`, keeping the current time.
    ///
    /// The element dimension is taken from the mesh of the module, or from the number of xi
    /// coordinates when the module has no mesh.
    pub fn set_element_xi(&mut self, element: ElementId, xi: &[f64]) -> Result<()> {
        let dimension = match self.module.mesh() {
            Some(mesh) => mesh.element_dimension(element).ok_or_else(|| {
                FieldError::invalid_argument(format!("element {element} is not part of the mesh"))
            })?,
            None => xi.len(),
        };
        let location = ElementXiLocation::new(element, dimension, xi, self.time)?;
        self.location = Some(location.into());
        Ok(())
    }

    pub fn set_node(&mut self, node: NodeId) {
        self.location = Some(NodeLocation::new(node, self.time).into());
    }

    pub fn set_time(&mut self, time: f64) {
        self.time = time;
        self.location = self.location.map(|location| match location {
            FieldLocation::ElementXi(location) => location.with_time(time).into(),
            FieldLocation::Node(location) => NodeLocation::new(location.node(), time).into(),
        });
    }

    fn current_location(&self) -> Result<FieldLocation> {
        self.location
            .ok_or_else(|| FieldError::invalid_argument("no location has been set on the field cache"))
    }

    /// Evaluates `field` at `location`, reusing cached values where they are still valid.
    ///
    /// Sources are evaluated first, at the location the kind of `field` requires. A failure
    /// anywhere in the graph leaves no cached value for the failing field. Sources evaluated
    /// before a failing sibling keep their cached values, which remain correct.
    /// A kind whose result does not match its component count and the requested derivatives
    /// fails with [`FieldError::InvalidArgument`].
    pub fn evaluate(&mut self, field: &Field, location: &FieldLocation) -> Result<&FieldValues> {
        self.module.check_field(field)?;
        let module = self.module.clone();
        let _guard = module.read_lock();
        self.evaluate_unlocked(field, location)
    }

    /// Evaluates the values of `field` at the current location.
    pub fn evaluate_real(&mut self, field: &Field) -> Result<DVector<f64>> {
        let location = self.current_location()?.with_derivatives(0)?;
        Ok(self.evaluate(field, &location)?.values.clone())
    }

    /// Evaluates the xi-derivative of every component of `field` at the current location.
    pub fn evaluate_derivative(&mut self, field: &Field, operator: DifferentialOperator) -> Result<DVector<f64>> {
        let location = self.current_location()?;
        let element_location = location
            .element_xi()
            .ok_or_else(|| FieldError::not_defined(field.name(), "derivatives are not available at nodes"))?;
        let dimension = element_location.dimension();
        if operator.xi_index() >= dimension {
            return Err(FieldError::invalid_argument(format!(
                "cannot differentiate with respect to xi{} in an element of dimension {}",
                operator.term(),
                dimension
            )));
        }
        let location = location.with_derivatives(dimension)?;
        let values = self.evaluate(field, &location)?;
        let derivatives = values
            .derivatives
            .as_ref()
            .ok_or_else(|| FieldError::DerivativesUnavailable { field: field.name() })?;
        Ok(derivatives.column(operator.xi_index()).into_owned())
    }

    /// Whether `field` and all of its sources can be evaluated at `location`.
    ///
    /// A `false` answer is a capability statement; evaluation would fail with
    /// [`FieldError::NotDefinedAtLocation`] or [`FieldError::DerivativesUnavailable`].
    pub fn is_defined(&self, field: &Field, location: &FieldLocation) -> bool {
        if self.module.check_field(field).is_err() {
            return false;
        }
        let _guard = self.module.read_lock();
        is_defined_unlocked(self.module.mesh(), field, location)
    }

    /// Drops all cached values.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drops the cached values of one field.
    pub fn invalidate(&mut self, field: &Field) {
        self.entries.remove(&field.id());
    }

    pub fn cached(&self, field: &Field) -> Option<&FieldValueCache> {
        self.entries.get(&field.id())
    }

    fn evaluate_unlocked(&mut self, field: &Field, location: &FieldLocation) -> Result<&FieldValues> {
        let id = field.id();
        let revision = field.revision();
        let valid = self
            .entries
            .get(&id)
            .map_or(false, |entry| entry.is_valid_for(location, revision));
        if !valid {
            match self.compute(field, location) {
                Ok(values) => {
                    let entry = FieldValueCache {
                        location: *location,
                        revision,
                        values,
                    };
                    self.entries.insert(id, entry);
                }
                Err(error) => {
                    self.entries.remove(&id);
                    return Err(error);
                }
            }
        }
        Ok(&self.entries[&id].values)
    }

    fn compute(&mut self, field: &Field, location: &FieldLocation) -> Result<FieldValues> {
        let definition = field.read_definition();
        let name = field.name();
        trace!("Evaluating field `{}` at {:?}", name, location);

        let kind = definition.kind();
        let source_location = source_location(self.module.mesh(), &name, kind.source_location(), location)?;
        // Sources are copied out so that a shared source evaluated again at another location
        // cannot change the inputs of this field
        let mut source_values = Vec::with_capacity(definition.sources().len());
        for source in definition.sources() {
            source_values.push(self.evaluate_unlocked(source, &source_location)?.clone());
        }

        let input = EvaluationInput {
            field_name: &name,
            number_of_components: definition.number_of_components(),
            location,
            source_location: &source_location,
            sources: definition.sources(),
            source_values: &source_values,
            tolerances: self.module.tolerances(),
        };
        let values = kind.evaluate(&input)?;
        let components = definition.number_of_components();
        if values.values.len() != components {
            return Err(FieldError::invalid_argument(format!(
                "{} field `{}` produced {} values, expected {}",
                kind.type_name(),
                name,
                values.values.len(),
                components
            )));
        }
        let number_of_derivatives = location.number_of_derivatives();
        match &values.derivatives {
            None if number_of_derivatives > 0 => Err(FieldError::DerivativesUnavailable { field: name }),
            Some(derivatives) if derivatives.shape() != (components, number_of_derivatives) => {
                Err(FieldError::invalid_argument(format!(
                    "{} field `{}` produced {}x{} derivatives, expected {}x{}",
                    kind.type_name(),
                    name,
                    derivatives.nrows(),
                    derivatives.ncols(),
                    components,
                    number_of_derivatives
                )))
            }
            _ => Ok(values),
        }
    }
}

/// The location at which the sources of a field are evaluated.
fn source_location(
    mesh: Option<&Arc<dyn MeshTopology>>,
    field_name: &str,
    requirement: SourceLocation,
    location: &FieldLocation,
) -> Result<FieldLocation> {
    let element_location = || {
        location
            .element_xi()
            .ok_or_else(|| FieldError::not_defined(field_name, "derivatives are not available at nodes"))
    };
    match requirement {
        SourceLocation::Same => Ok(*location),
        SourceLocation::SameWithDerivatives => {
            let element_location = element_location()?;
            Ok(element_location
                .with_derivatives(element_location.dimension())?
                .into())
        }
        SourceLocation::TopLevelWithDerivatives => {
            let element_location = element_location()?;
            let promoted = match mesh {
                Some(mesh) => element_location.promote_to_top_level(mesh.as_ref())?,
                None => element_location.with_derivatives(element_location.dimension())?,
            };
            Ok(promoted.into())
        }
    }
}

fn is_defined_unlocked(mesh: Option<&Arc<dyn MeshTopology>>, field: &Field, location: &FieldLocation) -> bool {
    let definition = field.read_definition();
    let name = field.name();
    let Ok(source_location) = source_location(mesh, &name, definition.kind().source_location(), location) else {
        return false;
    };
    definition
        .kind()
        .is_defined_at(location, &source_location, definition.sources())
        && definition
            .sources()
            .iter()
            .all(|source| is_defined_unlocked(mesh, source, &source_location))
}

/// Evaluates `field` at every location in parallel, with one [`FieldCache`] per worker.
pub fn evaluate_at_locations(
    module: &FieldModule,
    field: &Field,
    locations: &[FieldLocation],
) -> Vec<Result<FieldValues>> {
    locations
        .par_iter()
        .map_init(
            || FieldCache::new(module),
            |cache, location| cache.evaluate(field, location).cloned(),
        )
        .collect()
}
