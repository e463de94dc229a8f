//! The field module owns the registry of named fields and arbitrates graph mutation.
//!
//! Evaluation through a [`FieldCache`](crate::cache::FieldCache) holds the read side of a
//! module-wide change lock. Redefinitions and data-change notifications go through a
//! [`FieldModuleChange`], which holds the write side and propagates invalidation to dependent
//! fields when it is dropped.
use crate::error::{FieldError, Result};
use crate::field::{Field, FieldDefinition, FieldId, FieldInner, FieldOperator};
use crate::interpolate::Interpolant;
use crate::mesh::MeshTopology;
use log::debug;
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use zincfield_linalg::DEFAULT_SINGULAR_TOLERANCE;

/// Numerical tolerances used by the derivative kinds of a module.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerances {
    /// Smallest accepted `|det(dx/dxi)|` when curl and divergence invert coordinate Jacobians.
    pub jacobian_determinant: f64,
    /// Pivot tolerance of the LU factorization used by gradient.
    pub lu_singular: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            jacobian_determinant: DEFAULT_SINGULAR_TOLERANCE,
            lu_singular: DEFAULT_SINGULAR_TOLERANCE,
        }
    }
}

#[derive(Default)]
struct Registry {
    by_name: BTreeMap<String, Weak<FieldInner>>,
    next_temp: u64,
}

impl Registry {
    fn live(&self, name: &str) -> Option<Field> {
        self.by_name.get(name).and_then(Weak::upgrade).map(Field)
    }

    fn generate_name(&mut self) -> String {
        loop {
            self.next_temp += 1;
            let name = format!("temp{}", self.next_temp);
            if self.live(&name).is_none() {
                return name;
            }
        }
    }

    fn prune(&mut self) {
        self.by_name.retain(|_, field| field.strong_count() > 0);
    }
}

pub(crate) struct ModuleShared {
    mesh: Option<Arc<dyn MeshTopology>>,
    tolerances: Tolerances,
    registry: Mutex<Registry>,
    next_id: AtomicU64,
    change_lock: RwLock<()>,
}

/// A registry of fields sharing a mesh and a set of tolerances.
///
/// Cloning the module produces another handle to the same registry.
#[derive(Clone)]
pub struct FieldModule(Arc<ModuleShared>);

impl Debug for FieldModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldModule")
            .field("has_mesh", &self.0.mesh.is_some())
            .field("tolerances", &self.0.tolerances)
            .field("fields", &self.fields().len())
            .finish()
    }
}

impl Default for FieldModule {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldModule {
    /// A module without a mesh. Locations are then never promoted to parent elements.
    pub fn new() -> Self {
        Self::with_settings(None, Tolerances::default())
    }

    pub fn with_mesh(mesh: Arc<dyn MeshTopology>) -> Self {
        Self::with_settings(Some(mesh), Tolerances::default())
    }

    pub fn with_settings(mesh: Option<Arc<dyn MeshTopology>>, tolerances: Tolerances) -> Self {
        Self(Arc::new(ModuleShared {
            mesh,
            tolerances,
            registry: Mutex::new(Registry::default()),
            next_id: AtomicU64::new(0),
            change_lock: RwLock::new(()),
        }))
    }

    pub fn mesh(&self) -> Option<&Arc<dyn MeshTopology>> {
        self.0.mesh.as_ref()
    }

    pub fn tolerances(&self) -> &Tolerances {
        &self.0.tolerances
    }

    pub(crate) fn read_lock(&self) -> RwLockReadGuard<'_, ()> {
        self.0.change_lock.read()
    }

    pub(crate) fn check_field(&self, field: &Field) -> Result<()> {
        if field.belongs_to(&self.0) {
            Ok(())
        } else {
            Err(FieldError::invalid_argument(format!(
                "field `{}` belongs to a different module",
                field.name()
            )))
        }
    }

    fn check_sources(&self, definition: &FieldDefinition) -> Result<()> {
        definition
            .sources()
            .iter()
            .try_for_each(|source| self.check_field(source))
    }

    /// Registers a new field with a generated `temp<N>` name.
    pub fn create_field(&self, definition: FieldDefinition) -> Result<Field> {
        self.check_sources(&definition)?;
        let mut registry = self.0.registry.lock();
        registry.prune();
        let name = registry.generate_name();
        let id = FieldId(self.0.next_id.fetch_add(1, Ordering::Relaxed));
        let field = Field::from_parts(id, Arc::downgrade(&self.0), name.clone(), definition);
        registry.by_name.insert(name, Arc::downgrade(&field.0));
        Ok(field)
    }

    pub fn create_constant(&self, values: &[f64]) -> Result<Field> {
        self.create_field(FieldDefinition::constant(values)?)
    }

    pub fn create_finite_element(&self, interpolant: Arc<dyn Interpolant>) -> Result<Field> {
        self.create_field(FieldDefinition::finite_element(interpolant)?)
    }

    pub fn create_xi(&self) -> Result<Field> {
        self.create_field(FieldDefinition::xi())
    }

    pub fn create_component(&self, source: &Field, index: usize) -> Result<Field> {
        self.create_field(FieldDefinition::component(source, index)?)
    }

    pub fn create_magnitude(&self, source: &Field) -> Result<Field> {
        self.create_field(FieldDefinition::magnitude(source))
    }

    pub fn create_add(&self, a: &Field, b: &Field, scale_factors: [f64; 2]) -> Result<Field> {
        self.create_field(FieldDefinition::add(a, b, scale_factors)?)
    }

    pub fn create_multiply(&self, a: &Field, b: &Field) -> Result<Field> {
        self.create_field(FieldDefinition::multiply(a, b)?)
    }

    pub fn create_derivative(&self, source: &Field, xi_index: usize) -> Result<Field> {
        self.create_field(FieldDefinition::derivative(source, xi_index)?)
    }

    pub fn create_curl(&self, vector: &Field, coordinate: &Field) -> Result<Field> {
        self.create_field(FieldDefinition::curl(vector, coordinate)?)
    }

    pub fn create_divergence(&self, vector: &Field, coordinate: &Field) -> Result<Field> {
        self.create_field(FieldDefinition::divergence(vector, coordinate)?)
    }

    pub fn create_gradient(&self, source: &Field, coordinate: &Field) -> Result<Field> {
        self.create_field(FieldDefinition::gradient(source, coordinate)?)
    }

    pub fn create_external(&self, operator: Box<dyn FieldOperator>, sources: Vec<Field>) -> Result<Field> {
        self.create_field(FieldDefinition::external(operator, sources)?)
    }

    /// Locks out evaluation until the returned guard is dropped.
    ///
    /// Must not be called while a [`FieldCache`](crate::cache::FieldCache) evaluation is in
    /// progress on the same thread.
    pub fn begin_change(&self) -> FieldModuleChange<'_> {
        FieldModuleChange {
            module: self,
            pending: Vec::new(),
            _lock: self.0.change_lock.write(),
        }
    }

    /// Replaces the definition of `field` in place. See [`FieldModuleChange::redefine`].
    pub fn redefine(&self, field: &Field, definition: FieldDefinition) -> Result<()> {
        self.begin_change().redefine(field, definition)
    }

    /// Invalidates cached values of `field` and everything depending on it, after the data
    /// behind it (for example the node values of an interpolant) was edited.
    pub fn notify_data_changed(&self, field: &Field) -> Result<()> {
        self.begin_change().notify_data_changed(field)
    }

    pub fn find_field_by_name(&self, name: &str) -> Option<Field> {
        self.0.registry.lock().live(name)
    }

    /// Renames `field`. Names are unique within the module.
    pub fn set_name(&self, field: &Field, name: &str) -> Result<()> {
        self.check_field(field)?;
        if name.is_empty() {
            return Err(FieldError::invalid_argument("field names cannot be empty"));
        }
        let mut registry = self.0.registry.lock();
        match registry.live(name) {
            Some(existing) if Field::ptr_eq(&existing, field) => return Ok(()),
            Some(_) => {
                return Err(FieldError::invalid_argument(format!(
                    "a field named `{name}` already exists"
                )))
            }
            None => {}
        }
        let mut current = field.0.name.write();
        registry.by_name.remove(current.as_str());
        registry.by_name.insert(name.to_string(), Arc::downgrade(&field.0));
        *current = name.to_string();
        Ok(())
    }

    /// A live field whose definition matches `definition`, so that identical fields can be
    /// shared instead of created twice.
    pub fn find_field_matching(&self, definition: &FieldDefinition) -> Option<Field> {
        self.fields()
            .into_iter()
            .find(|field| field.read_definition().matches(definition))
    }

    /// All live fields, ordered by name.
    pub fn fields(&self) -> Vec<Field> {
        self.0
            .registry
            .lock()
            .by_name
            .values()
            .filter_map(Weak::upgrade)
            .map(Field)
            .collect()
    }

    /// A command reproducing the definition of `field`, referring to its sources by name.
    pub fn command_string(&self, field: &Field) -> String {
        let definition = field.read_definition();
        let names: Vec<String> = definition.sources().iter().map(Field::name).collect();
        definition
            .kind()
            .command_string(definition.number_of_components(), &names)
    }
}

/// Exclusive access to the fields of a module.
///
/// Invalidation of dependent fields is batched and performed when the guard is dropped, before
/// evaluation can resume.
pub struct FieldModuleChange<'a> {
    module: &'a FieldModule,
    pending: Vec<Field>,
    _lock: RwLockWriteGuard<'a, ()>,
}

impl<'a> FieldModuleChange<'a> {
    /// Replaces the definition of `field` in place, keeping its identity and name.
    ///
    /// Fails without modifying anything if the new definition would make `field` depend on
    /// itself, or would change the number of components of a field that other fields use.
    pub fn redefine(&mut self, field: &Field, definition: FieldDefinition) -> Result<()> {
        self.module.check_field(field)?;
        self.module.check_sources(&definition)?;
        if definition.sources().iter().any(|source| source.depends_on(field)) {
            return Err(FieldError::invalid_argument(format!(
                "redefining `{}` would make it depend on itself",
                field.name()
            )));
        }
        let current_components = field.number_of_components();
        if definition.number_of_components() != current_components && field.has_dependents() {
            return Err(FieldError::invalid_argument(format!(
                "cannot change the number of components of `{}` from {} to {} while it is in use",
                field.name(),
                current_components,
                definition.number_of_components()
            )));
        }

        let type_name = definition.kind().type_name().to_string();
        *field.0.definition.write() = definition;
        field.register_with_sources();
        debug!("Redefined field `{}` as {}", field.name(), type_name);
        self.pending.push(field.clone());
        Ok(())
    }

    pub fn notify_data_changed(&mut self, field: &Field) -> Result<()> {
        self.module.check_field(field)?;
        self.pending.push(field.clone());
        Ok(())
    }
}

impl<'a> Drop for FieldModuleChange<'a> {
    fn drop(&mut self) {
        for field in self.pending.drain(..) {
            field.invalidate_dependents();
        }
    }
}
