//! Schema registry: all declarations happen at startup and resolve names to
//! small integer handles.

use std::collections::HashMap;

use vp_core::{Error, Result};

/// Handle to a declared object collection (label + optional category).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle(pub(crate) usize);

/// Handle to a per-instance variable array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayHandle(pub(crate) usize);

/// Handle to a per-event scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScalarHandle(pub(crate) usize);

/// What happens to a field at the start of each variation's iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetPolicy {
    /// Derived per-variation state: scalars go to 0.0, arrays to the
    /// sentinel, at every `reset_variation`.
    PerVariation,
    /// Immutable input or once-per-event value (raw collections, generator
    /// weights): untouched by `reset_variation`.
    Preserve,
}

#[derive(Debug, Clone)]
pub(crate) struct ObjectDecl {
    pub key: String,
    pub capacity: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct ArrayDecl {
    pub name: String,
    pub object: ObjectHandle,
    pub reset: ResetPolicy,
}

#[derive(Debug, Clone)]
pub(crate) struct ScalarDecl {
    pub name: String,
    pub reset: ResetPolicy,
}

/// The set of declared objects, arrays and scalars. Fixed after startup and
/// identical across all variations' records.
#[derive(Debug, Default)]
pub struct Schema {
    pub(crate) objects: Vec<ObjectDecl>,
    pub(crate) arrays: Vec<ArrayDecl>,
    pub(crate) scalars: Vec<ScalarDecl>,
    object_index: HashMap<String, ObjectHandle>,
    array_index: HashMap<String, ArrayHandle>,
    scalar_index: HashMap<String, ScalarHandle>,
}

fn object_key(label: &str, category: Option<&str>) -> String {
    match category {
        Some(c) => format!("{label}{c}"),
        None => label.to_string(),
    }
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object collection with a fixed instance capacity.
    ///
    /// Capacity is fixed at configuration time and never resized at run time.
    pub fn declare_object(
        &mut self,
        label: &str,
        category: Option<&str>,
        capacity: usize,
    ) -> Result<ObjectHandle> {
        let key = object_key(label, category);
        if self.object_index.contains_key(&key) {
            return Err(Error::Validation(format!("object '{key}' declared twice")));
        }
        let handle = ObjectHandle(self.objects.len());
        self.objects.push(ObjectDecl { key: key.clone(), capacity });
        self.object_index.insert(key, handle);
        Ok(handle)
    }

    /// Register a per-instance variable for an object collection.
    pub fn declare_array(
        &mut self,
        object: ObjectHandle,
        var: &str,
        reset: ResetPolicy,
    ) -> Result<ArrayHandle> {
        let decl = self
            .objects
            .get(object.0)
            .ok_or_else(|| Error::Validation(format!("unknown object handle {}", object.0)))?;
        let name = format!("{}_{var}", decl.key);
        if self.array_index.contains_key(&name) {
            return Err(Error::Validation(format!("array '{name}' declared twice")));
        }
        let handle = ArrayHandle(self.arrays.len());
        self.arrays.push(ArrayDecl { name: name.clone(), object, reset });
        self.array_index.insert(name, handle);
        Ok(handle)
    }

    /// Register a per-event scalar.
    pub fn declare_scalar(&mut self, name: &str, reset: ResetPolicy) -> Result<ScalarHandle> {
        if self.scalar_index.contains_key(name) {
            return Err(Error::Validation(format!("scalar '{name}' declared twice")));
        }
        let handle = ScalarHandle(self.scalars.len());
        self.scalars.push(ScalarDecl { name: name.to_string(), reset });
        self.scalar_index.insert(name.to_string(), handle);
        Ok(handle)
    }

    /// Look up a declared object by label and category.
    pub fn resolve_object(&self, label: &str, category: Option<&str>) -> Result<ObjectHandle> {
        let key = object_key(label, category);
        self.object_index
            .get(&key)
            .copied()
            .ok_or_else(|| Error::Validation(format!("object '{key}' was never declared")))
    }

    /// Look up a declared array by its composed name.
    pub fn resolve_array(
        &self,
        label: &str,
        category: Option<&str>,
        var: &str,
    ) -> Result<ArrayHandle> {
        let name = format!("{}_{var}", object_key(label, category));
        self.array_index
            .get(&name)
            .copied()
            .ok_or_else(|| Error::Validation(format!("array '{name}' was never declared")))
    }

    /// Look up a declared scalar by name.
    pub fn resolve_scalar(&self, name: &str) -> Result<ScalarHandle> {
        self.scalar_index
            .get(name)
            .copied()
            .ok_or_else(|| Error::Validation(format!("scalar '{name}' was never declared")))
    }

    /// Declared capacity of an object collection.
    pub fn capacity(&self, object: ObjectHandle) -> usize {
        self.objects[object.0].capacity
    }

    /// Composed name of a declared array.
    pub fn array_name(&self, array: ArrayHandle) -> &str {
        &self.arrays[array.0].name
    }

    /// Name of a declared scalar.
    pub fn scalar_name(&self, scalar: ScalarHandle) -> &str {
        &self.scalars[scalar.0].name
    }

    /// Composed names of every declared array, in declaration order.
    pub fn array_names(&self) -> impl Iterator<Item = &str> {
        self.arrays.iter().map(|a| a.name.as_str())
    }

    /// Names of every declared scalar, in declaration order.
    pub fn scalar_names(&self) -> impl Iterator<Item = &str> {
        self.scalars.iter().map(|s| s.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_and_resolve() {
        let mut schema = Schema::new();
        let jets = schema.declare_object("jetsAK4", None, 10).unwrap();
        let pt = schema.declare_array(jets, "Pt", ResetPolicy::Preserve).unwrap();
        let n = schema.declare_scalar("Event_nJets", ResetPolicy::PerVariation).unwrap();

        assert_eq!(schema.resolve_object("jetsAK4", None).unwrap(), jets);
        assert_eq!(schema.resolve_array("jetsAK4", None, "Pt").unwrap(), pt);
        assert_eq!(schema.resolve_scalar("Event_nJets").unwrap(), n);
        assert_eq!(schema.capacity(jets), 10);
        assert_eq!(schema.array_name(pt), "jetsAK4_Pt");
    }

    #[test]
    fn category_composes_into_key() {
        let mut schema = Schema::new();
        let tight = schema.declare_object("jetsAK4", Some("Tight"), 10).unwrap();
        let pt = schema.declare_array(tight, "Pt", ResetPolicy::PerVariation).unwrap();
        assert_eq!(schema.array_name(pt), "jetsAK4Tight_Pt");
        assert!(schema.resolve_array("jetsAK4", None, "Pt").is_err());
    }

    #[test]
    fn double_declaration_is_fatal() {
        let mut schema = Schema::new();
        let jets = schema.declare_object("jetsAK4", None, 10).unwrap();
        schema.declare_array(jets, "Pt", ResetPolicy::Preserve).unwrap();
        assert!(schema.declare_array(jets, "Pt", ResetPolicy::Preserve).is_err());
        assert!(schema.declare_object("jetsAK4", None, 10).is_err());
        schema.declare_scalar("Event_Ht", ResetPolicy::PerVariation).unwrap();
        assert!(schema.declare_scalar("Event_Ht", ResetPolicy::PerVariation).is_err());
    }

    #[test]
    fn undeclared_lookup_is_fatal() {
        let schema = Schema::new();
        assert!(schema.resolve_scalar("Event_missing").is_err());
        assert!(schema.resolve_array("jetsAK4", None, "Pt").is_err());
    }
}
