//! Fields, the nodes of the computation graph.
//!
//! A [`Field`] is a shared handle to a node whose [`FieldDefinition`] names its kind, its
//! sources and the number of components it produces. Built-in kinds are variants of
//! [`FieldKind`]; kinds defined outside this crate plug in through [`FieldOperator`].
//!
//! Fields are created and redefined through a [`FieldModule`](crate::module::FieldModule) and
//! evaluated through a [`FieldCache`](crate::cache::FieldCache).
use crate::coordinates::CoordinateSystem;
use crate::error::{FieldError, Result};
use crate::interpolate::Interpolant;
use crate::location::{FieldLocation, MAXIMUM_ELEMENT_XI_DIMENSIONS};
use crate::module::{ModuleShared, Tolerances};
use itertools::Itertools;
use nalgebra::{DMatrix, DVector};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use rustc_hash::FxHashSet;
use std::fmt;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

mod arithmetic;
mod derivatives;
mod external;

pub use external::FieldOperator;

/// Values of a field at one location, with optional xi-derivatives.
///
/// `derivatives` has one row per component and one column per xi direction of the location.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValues {
    pub values: DVector<f64>,
    pub derivatives: Option<DMatrix<f64>>,
}

impl FieldValues {
    pub fn new(values: DVector<f64>) -> Self {
        Self {
            values,
            derivatives: None,
        }
    }

    pub fn with_derivatives(values: DVector<f64>, derivatives: DMatrix<f64>) -> Self {
        Self {
            values,
            derivatives: Some(derivatives),
        }
    }

    pub fn zeros(number_of_components: usize) -> Self {
        Self::new(DVector::zeros(number_of_components))
    }

    pub fn number_of_components(&self) -> usize {
        self.values.len()
    }

    pub fn has_derivatives(&self) -> bool {
        self.derivatives.is_some()
    }

    /// The derivative of `component` with respect to xi direction `xi_index`, if available.
    pub fn derivative(&self, component: usize, xi_index: usize) -> Option<f64> {
        self.derivatives
            .as_ref()
            .and_then(|d| d.get((component, xi_index)).copied())
    }
}

/// Where the sources of a field must be evaluated, relative to the requested location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLocation {
    /// At the requested location, with the requested derivatives.
    Same,
    /// At the requested location, always with all xi-derivatives.
    SameWithDerivatives,
    /// At the same point promoted to its top-level element, with all xi-derivatives.
    TopLevelWithDerivatives,
}

/// Everything a kind needs to combine the values of its sources.
#[derive(Debug)]
pub struct EvaluationInput<'a> {
    pub field_name: &'a str,
    pub number_of_components: usize,
    /// The location requested by the caller.
    pub location: &'a FieldLocation,
    /// The location at which `source_values` were evaluated.
    pub source_location: &'a FieldLocation,
    pub sources: &'a [Field],
    pub source_values: &'a [FieldValues],
    pub tolerances: &'a Tolerances,
}

impl<'a> EvaluationInput<'a> {
    /// The element dimension of the source location, or zero at nodes.
    pub fn source_dimension(&self) -> usize {
        self.source_location.element_xi().map_or(0, |l| l.dimension())
    }

    pub fn not_defined(&self, reason: impl Into<String>) -> FieldError {
        FieldError::not_defined(self.field_name, reason)
    }
}

/// The built-in field kinds, plus the extension point for external ones.
pub enum FieldKind {
    Constant { values: Vec<f64> },
    FiniteElement { interpolant: Arc<dyn Interpolant> },
    Xi,
    Component { index: usize },
    Magnitude,
    Add { scale_factors: [f64; 2] },
    Multiply,
    Derivative { xi_index: usize },
    Curl,
    Divergence,
    Gradient,
    External(Box<dyn FieldOperator>),
}

impl Clone for FieldKind {
    fn clone(&self) -> Self {
        match self {
            FieldKind::Constant { values } => FieldKind::Constant { values: values.clone() },
            FieldKind::FiniteElement { interpolant } => FieldKind::FiniteElement {
                interpolant: Arc::clone(interpolant),
            },
            FieldKind::Xi => FieldKind::Xi,
            FieldKind::Component { index } => FieldKind::Component { index: *index },
            FieldKind::Magnitude => FieldKind::Magnitude,
            FieldKind::Add { scale_factors } => FieldKind::Add {
                scale_factors: *scale_factors,
            },
            FieldKind::Multiply => FieldKind::Multiply,
            FieldKind::Derivative { xi_index } => FieldKind::Derivative { xi_index: *xi_index },
            FieldKind::Curl => FieldKind::Curl,
            FieldKind::Divergence => FieldKind::Divergence,
            FieldKind::Gradient => FieldKind::Gradient,
            FieldKind::External(operator) => FieldKind::External(operator.clone_operator()),
        }
    }
}

impl Debug for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Constant { values } => f.debug_struct("Constant").field("values", values).finish(),
            FieldKind::FiniteElement { interpolant } => f
                .debug_struct("FiniteElement")
                .field("interpolant", interpolant)
                .finish(),
            FieldKind::Component { index } => f.debug_struct("Component").field("index", index).finish(),
            FieldKind::Add { scale_factors } => f
                .debug_struct("Add")
                .field("scale_factors", scale_factors)
                .finish(),
            FieldKind::Derivative { xi_index } => f.debug_struct("Derivative").field("xi_index", xi_index).finish(),
            FieldKind::External(operator) => f.debug_tuple("External").field(&operator.type_name()).finish(),
            other => write!(f, "{}", other.type_name()),
        }
    }
}

impl FieldKind {
    pub fn type_name(&self) -> &str {
        match self {
            FieldKind::Constant { .. } => "constant",
            FieldKind::FiniteElement { .. } => "finite_element",
            FieldKind::Xi => "xi_coordinates",
            FieldKind::Component { .. } => "component",
            FieldKind::Magnitude => "magnitude",
            FieldKind::Add { .. } => "add",
            FieldKind::Multiply => "multiply",
            FieldKind::Derivative { .. } => "derivative",
            FieldKind::Curl => "curl",
            FieldKind::Divergence => "divergence",
            FieldKind::Gradient => "gradient",
            FieldKind::External(operator) => operator.type_name(),
        }
    }

    /// Compares kinds and their parameters. Sources are compared separately, by identity.
    pub fn compare(&self, other: &FieldKind) -> bool {
        match (self, other) {
            (FieldKind::Constant { values: a }, FieldKind::Constant { values: b }) => a == b,
            (FieldKind::FiniteElement { interpolant: a }, FieldKind::FiniteElement { interpolant: b }) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            (FieldKind::Xi, FieldKind::Xi) => true,
            (FieldKind::Component { index: a }, FieldKind::Component { index: b }) => a == b,
            (FieldKind::Magnitude, FieldKind::Magnitude) => true,
            (FieldKind::Add { scale_factors: a }, FieldKind::Add { scale_factors: b }) => a == b,
            (FieldKind::Multiply, FieldKind::Multiply) => true,
            (FieldKind::Derivative { xi_index: a }, FieldKind::Derivative { xi_index: b }) => a == b,
            (FieldKind::Curl, FieldKind::Curl) => true,
            (FieldKind::Divergence, FieldKind::Divergence) => true,
            (FieldKind::Gradient, FieldKind::Gradient) => true,
            (FieldKind::External(a), FieldKind::External(b)) => a.compare(b.as_ref()),
            _ => false,
        }
    }

    pub fn source_location(&self) -> SourceLocation {
        match self {
            FieldKind::Derivative { .. } => SourceLocation::SameWithDerivatives,
            FieldKind::Curl | FieldKind::Divergence | FieldKind::Gradient => SourceLocation::TopLevelWithDerivatives,
            FieldKind::External(operator) => operator.source_location(),
            _ => SourceLocation::Same,
        }
    }

    /// Whether this kind can produce values at `location`, assuming its sources can be
    /// evaluated at `source_location`.
    pub fn is_defined_at(&self, location: &FieldLocation, source_location: &FieldLocation, sources: &[Field]) -> bool {
        match self {
            FieldKind::Constant { .. } => true,
            FieldKind::FiniteElement { interpolant } => interpolant.is_defined_at(location),
            FieldKind::Xi => location.element_xi().is_some(),
            FieldKind::Component { .. } | FieldKind::Magnitude | FieldKind::Add { .. } | FieldKind::Multiply => true,
            FieldKind::Derivative { xi_index } => derivatives::derivative_is_defined(*xi_index, location),
            FieldKind::Curl => derivatives::curl_is_defined(source_location, sources),
            FieldKind::Divergence => derivatives::divergence_is_defined(source_location, sources),
            FieldKind::Gradient => derivatives::gradient_is_defined(source_location, sources),
            FieldKind::External(operator) => operator.is_defined_at(location, sources),
        }
    }

    /// Combines evaluated sources into the values of the field.
    pub fn evaluate(&self, input: &EvaluationInput) -> Result<FieldValues> {
        match self {
            FieldKind::Constant { values } => Ok(arithmetic::evaluate_constant(values, input)),
            FieldKind::FiniteElement { interpolant } => interpolant
                .interpolate(input.location)
                .map_err(|e| e.for_field(input.field_name)),
            FieldKind::Xi => arithmetic::evaluate_xi(input),
            FieldKind::Component { index } => Ok(arithmetic::evaluate_component(*index, input)),
            FieldKind::Magnitude => Ok(arithmetic::evaluate_magnitude(input)),
            FieldKind::Add { scale_factors } => Ok(arithmetic::evaluate_add(*scale_factors, input)),
            FieldKind::Multiply => Ok(arithmetic::evaluate_multiply(input)),
            FieldKind::Derivative { xi_index } => derivatives::evaluate_derivative(*xi_index, input),
            FieldKind::Curl => derivatives::evaluate_curl(input),
            FieldKind::Divergence => derivatives::evaluate_divergence(input),
            FieldKind::Gradient => derivatives::evaluate_gradient(input),
            FieldKind::External(operator) => operator.evaluate(input),
        }
    }

    /// A command reproducing the definition, given the names of the sources.
    pub fn command_string(&self, number_of_components: usize, source_names: &[String]) -> String {
        let name = |i: usize| source_names.get(i).map(|s| valid_token(s)).unwrap_or_default();
        match self {
            FieldKind::Constant { values } => format!("constant values {}", values.iter().join(" ")),
            FieldKind::FiniteElement { .. } => format!("finite_element num_components {number_of_components}"),
            FieldKind::Xi => "xi_coordinates".to_string(),
            FieldKind::Component { index } => format!("component field {} index {}", name(0), index + 1),
            FieldKind::Magnitude => format!("magnitude field {}", name(0)),
            FieldKind::Add { scale_factors } => format!(
                "add fields {} {} scale_factors {} {}",
                name(0),
                name(1),
                scale_factors[0],
                scale_factors[1]
            ),
            FieldKind::Multiply => format!("multiply fields {} {}", name(0), name(1)),
            FieldKind::Derivative { xi_index } => format!("derivative field {} xi_index {}", name(0), xi_index + 1),
            FieldKind::Curl => format!("curl coordinate {} vector {}", name(1), name(0)),
            FieldKind::Divergence => format!("divergence coordinate {} vector {}", name(1), name(0)),
            FieldKind::Gradient => format!("gradient coordinate {} field {}", name(1), name(0)),
            FieldKind::External(operator) => {
                let names: Vec<String> = source_names.iter().map(|s| valid_token(s)).collect();
                operator.command_string(&names)
            }
        }
    }
}

/// Quotes `name` if it would not parse as a single token.
fn valid_token(name: &str) -> String {
    if !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\\\""))
    }
}

/// The complete, validated definition of a field.
///
/// Constructors check the component-count rules of each kind, so every definition that exists
/// can be installed on a field.
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    number_of_components: usize,
    coordinate_system: CoordinateSystem,
    sources: Vec<Field>,
    kind: FieldKind,
}

fn require(condition: bool, message: impl FnOnce() -> String) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(FieldError::InvalidArgument(message()))
    }
}

impl FieldDefinition {
    fn new(number_of_components: usize, sources: Vec<Field>, kind: FieldKind) -> Self {
        Self {
            number_of_components,
            coordinate_system: CoordinateSystem::default(),
            sources,
            kind,
        }
    }

    pub fn constant(values: &[f64]) -> Result<Self> {
        require(!values.is_empty(), || "a constant needs at least one value".to_string())?;
        Ok(Self::new(
            values.len(),
            Vec::new(),
            FieldKind::Constant {
                values: values.to_vec(),
            },
        ))
    }

    pub fn finite_element(interpolant: Arc<dyn Interpolant>) -> Result<Self> {
        let n = interpolant.number_of_components();
        require(n > 0, || "an interpolant must have at least one component".to_string())?;
        Ok(Self::new(n, Vec::new(), FieldKind::FiniteElement { interpolant }))
    }

    /// Chart coordinates of the element, padded with zeros to three components.
    pub fn xi() -> Self {
        Self::new(MAXIMUM_ELEMENT_XI_DIMENSIONS, Vec::new(), FieldKind::Xi)
    }

    /// Component `index` (counted from zero) of `source`.
    pub fn component(source: &Field, index: usize) -> Result<Self> {
        let n = source.number_of_components();
        require(index < n, || format!("component index {index} out of range for {n} components"))?;
        Ok(Self::new(1, vec![source.clone()], FieldKind::Component { index }))
    }

    pub fn magnitude(source: &Field) -> Self {
        Self::new(1, vec![source.clone()], FieldKind::Magnitude)
    }

    /// `scale_factors[0] * a + scale_factors[1] * b`, in the coordinate system of `a`.
    pub fn add(a: &Field, b: &Field, scale_factors: [f64; 2]) -> Result<Self> {
        let (n, m) = (a.number_of_components(), b.number_of_components());
        require(n == m, || format!("cannot add fields with {n} and {m} components"))?;
        Ok(Self::new(n, vec![a.clone(), b.clone()], FieldKind::Add { scale_factors })
            .with_coordinate_system(a.coordinate_system()))
    }

    /// The component-wise product of `a` and `b`.
    pub fn multiply(a: &Field, b: &Field) -> Result<Self> {
        let (n, m) = (a.number_of_components(), b.number_of_components());
        require(n == m, || format!("cannot multiply fields with {n} and {m} components"))?;
        Ok(Self::new(n, vec![a.clone(), b.clone()], FieldKind::Multiply))
    }

    /// Derivative of `source` with respect to xi direction `xi_index`, counted from zero.
    pub fn derivative(source: &Field, xi_index: usize) -> Result<Self> {
        require(xi_index < MAXIMUM_ELEMENT_XI_DIMENSIONS, || {
            format!("xi index {xi_index} exceeds the largest element dimension")
        })?;
        Ok(Self::new(
            source.number_of_components(),
            vec![source.clone()],
            FieldKind::Derivative { xi_index },
        ))
    }

    pub fn curl(vector: &Field, coordinate: &Field) -> Result<Self> {
        require(vector.number_of_components() == 3, || {
            "the vector field of a curl must have 3 components".to_string()
        })?;
        require(coordinate.number_of_components() == 3, || {
            "the coordinate field of a curl must have 3 components".to_string()
        })?;
        require(vector.coordinate_system().is_rectangular_cartesian(), || {
            "the vector field of a curl must be rectangular Cartesian".to_string()
        })?;
        Ok(Self::new(3, vec![vector.clone(), coordinate.clone()], FieldKind::Curl))
    }

    pub fn divergence(vector: &Field, coordinate: &Field) -> Result<Self> {
        let (n, m) = (vector.number_of_components(), coordinate.number_of_components());
        require(n == m && n <= 3, || {
            format!("divergence needs equal component counts of at most 3, got {n} and {m}")
        })?;
        require(vector.coordinate_system().is_rectangular_cartesian(), || {
            "the vector field of a divergence must be rectangular Cartesian".to_string()
        })?;
        Ok(Self::new(1, vec![vector.clone(), coordinate.clone()], FieldKind::Divergence))
    }

    /// Gradient of every component of `source` with respect to `coordinate`, component-major.
    pub fn gradient(source: &Field, coordinate: &Field) -> Result<Self> {
        let m = coordinate.number_of_components();
        require(m <= 3, || format!("gradient coordinates must have at most 3 components, got {m}"))?;
        Ok(Self::new(
            source.number_of_components() * m,
            vec![source.clone(), coordinate.clone()],
            FieldKind::Gradient,
        ))
    }

    pub fn external(operator: Box<dyn FieldOperator>, sources: Vec<Field>) -> Result<Self> {
        let n = operator.number_of_components(&sources)?;
        require(n > 0, || format!("operator `{}` produces no components", operator.type_name()))?;
        Ok(Self::new(n, sources, FieldKind::External(operator)))
    }

    pub fn with_coordinate_system(mut self, coordinate_system: CoordinateSystem) -> Self {
        self.coordinate_system = coordinate_system;
        self
    }

    pub fn number_of_components(&self) -> usize {
        self.number_of_components
    }

    pub fn coordinate_system(&self) -> CoordinateSystem {
        self.coordinate_system
    }

    pub fn sources(&self) -> &[Field] {
        &self.sources
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Structural equality: same kind and parameters, and identical sources.
    pub fn matches(&self, other: &FieldDefinition) -> bool {
        self.number_of_components == other.number_of_components
            && self.coordinate_system == other.coordinate_system
            && self.sources.len() == other.sources.len()
            && self
                .sources
                .iter()
                .zip(&other.sources)
                .all(|(a, b)| Field::ptr_eq(a, b))
            && self.kind.compare(&other.kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub(crate) u64);

pub(crate) struct FieldInner {
    pub(crate) id: FieldId,
    pub(crate) module: Weak<ModuleShared>,
    pub(crate) name: RwLock<String>,
    pub(crate) revision: AtomicU64,
    pub(crate) definition: RwLock<FieldDefinition>,
    pub(crate) dependents: Mutex<Vec<Weak<FieldInner>>>,
}

/// A shared handle to a field. Cloning the handle does not copy the field.
#[derive(Clone)]
pub struct Field(pub(crate) Arc<FieldInner>);

impl Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("id", &self.0.id)
            .field("name", &*self.0.name.read())
            .finish()
    }
}

impl Field {
    pub(crate) fn from_parts(id: FieldId, module: Weak<ModuleShared>, name: String, definition: FieldDefinition) -> Self {
        let field = Field(Arc::new(FieldInner {
            id,
            module,
            name: RwLock::new(name),
            revision: AtomicU64::new(0),
            definition: RwLock::new(definition),
            dependents: Mutex::new(Vec::new()),
        }));
        field.register_with_sources();
        field
    }

    pub fn id(&self) -> FieldId {
        self.0.id
    }

    pub fn name(&self) -> String {
        self.0.name.read().clone()
    }

    pub fn number_of_components(&self) -> usize {
        self.0.definition.read().number_of_components
    }

    pub fn coordinate_system(&self) -> CoordinateSystem {
        self.0.definition.read().coordinate_system
    }

    pub fn type_name(&self) -> String {
        self.0.definition.read().kind.type_name().to_string()
    }

    pub fn sources(&self) -> Vec<Field> {
        self.0.definition.read().sources.clone()
    }

    /// A copy of the current definition.
    pub fn definition(&self) -> FieldDefinition {
        self.0.definition.read().clone()
    }

    /// Incremented whenever the definition or the data of the field or of one of its
    /// transitive sources changes.
    pub fn revision(&self) -> u64 {
        self.0.revision.load(Ordering::Acquire)
    }

    pub fn ptr_eq(a: &Field, b: &Field) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    pub(crate) fn read_definition(&self) -> RwLockReadGuard<'_, FieldDefinition> {
        self.0.definition.read()
    }

    pub(crate) fn belongs_to(&self, module: &Arc<ModuleShared>) -> bool {
        Weak::ptr_eq(&self.0.module, &Arc::downgrade(module))
    }

    /// Whether `other` is this field or one of its transitive sources.
    pub(crate) fn depends_on(&self, other: &Field) -> bool {
        Field::ptr_eq(self, other) || self.read_definition().sources.iter().any(|s| s.depends_on(other))
    }

    pub(crate) fn register_with_sources(&self) {
        for source in self.read_definition().sources.iter().unique_by(|s| s.id()) {
            source.0.dependents.lock().push(Arc::downgrade(&self.0));
        }
    }

    /// Bumps the revision of this field and of every field that depends on it.
    pub(crate) fn invalidate_dependents(&self) {
        let mut visited = FxHashSet::default();
        let mut stack = vec![self.clone()];
        while let Some(field) = stack.pop() {
            if !visited.insert(field.id()) {
                continue;
            }
            field.0.revision.fetch_add(1, Ordering::AcqRel);

            let mut dependents = field.0.dependents.lock();
            // Drop links to fields that were dropped or no longer use this field
            dependents.retain(|weak| match weak.upgrade() {
                Some(dependent) => Field(dependent).uses_source(&field),
                None => false,
            });
            stack.extend(dependents.iter().filter_map(Weak::upgrade).map(Field));
        }
    }

    /// Whether any live field currently uses this field as a source.
    pub(crate) fn has_dependents(&self) -> bool {
        self.0
            .dependents
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .any(|dependent| Field(dependent).uses_source(self))
    }

    fn uses_source(&self, source: &Field) -> bool {
        self.read_definition()
            .sources
            .iter()
            .any(|s| Field::ptr_eq(s, source))
    }
}
