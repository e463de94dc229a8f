use crate::error::Result;
use crate::field::{EvaluationInput, Field, FieldValues, SourceLocation};
use crate::location::FieldLocation;
use std::any::Any;

/// A field kind implemented outside this crate, such as an image filter.
///
/// Operators follow the same contract as the built-in kinds: the graph evaluates their sources
/// at [`source_location`](FieldOperator::source_location) before calling
/// [`evaluate`](FieldOperator::evaluate), and never caches a failed evaluation.
pub trait FieldOperator: Send + Sync {
    fn type_name(&self) -> &str;

    /// The number of components produced from the given sources. Rejecting the sources here
    /// prevents the field from being created.
    fn number_of_components(&self, sources: &[Field]) -> Result<usize>;

    fn source_location(&self) -> SourceLocation {
        SourceLocation::Same
    }

    /// Capability check of the operator itself. Sources are checked by the graph.
    fn is_defined_at(&self, _location: &FieldLocation, _sources: &[Field]) -> bool {
        true
    }

    fn evaluate(&self, input: &EvaluationInput) -> Result<FieldValues>;

    /// Whether `other` is the same operator with the same parameters.
    fn compare(&self, other: &dyn FieldOperator) -> bool;

    fn command_string(&self, source_names: &[String]) -> String;

    fn clone_operator(&self) -> Box<dyn FieldOperator>;

    fn as_any(&self) -> &dyn Any;
}
