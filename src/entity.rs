/*!

An [`EntityType`] is a declared kind of object: a name, a table of [synthesized
properties](crate::property::Property), a table of methods, optional operator overrides used
when a property of this type is the target of an operator instruction, an optional
initializer and an optional [serializer](crate::serialize::Serializer).

Types are built once with [`EntityType::builder`] and then shared behind an `Rc`. An
[`Instance`] holds a handle to its type and the per-instance storage slots that the type's
storage-backed properties read and write.

```rust
use synths::prelude::*;

let synth = Synthesizer::new();
let point = EntityType::builder("Point")
    .property("x", synth.synthesize(Options::new().with_default(0))?)
    .property("y", synth.synthesize(Options::new().with_default(0))?)
    .method("norm", |this, _args| {
        let this = this.as_entity().unwrap();
        let x = this.get("x")?.to_number();
        let y = this.get("y")?.to_number();
        Ok(Value::from(x.hypot(y)))
    })
    .build()?;

let p = point.construct(&[])?;
p.call("x", &vals![3])?.call("y", &vals![4])?;
assert_eq!(p.call("norm", &[])?, Value::from(5));
assert_eq!(p.call("x", &vals!["*", 2])?, Value::from(6));
# Ok::<(), SynthsError>(())
```

*/

use std::cell::RefCell;
use std::fmt::{self, Debug, Formatter};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::log::trace;
use crate::operator::BinOp;
use crate::property::{Property, StorageKey};
use crate::serialize::{make_serializer, Serializer};
use crate::value::Value;
use crate::{HashMap, SynthsError};

/// A method: receives the receiver and the call arguments.
pub type Method = Rc<dyn Fn(&Value, &[Value]) -> Result<Value, SynthsError>>;
/// A binary operator override: receives the accumulated value and the next operand.
pub type OperatorFn = Rc<dyn Fn(&Value, &Value) -> Result<Value, SynthsError>>;
/// Runs once on a freshly constructed instance with the construction arguments.
pub type Initializer = Rc<dyn Fn(&Instance, &[Value]) -> Result<(), SynthsError>>;

pub struct EntityType {
    name: String,
    properties: IndexMap<String, Property>,
    methods: IndexMap<String, Method>,
    operators: HashMap<BinOp, OperatorFn>,
    init: Option<Initializer>,
    serializer: Option<Serializer>,
}

impl EntityType {
    pub fn builder(name: &str) -> EntityTypeBuilder {
        EntityTypeBuilder {
            entity_type: EntityType {
                name: name.to_string(),
                properties: IndexMap::new(),
                methods: IndexMap::new(),
                operators: HashMap::default(),
                init: None,
                serializer: None,
            },
            duplicates: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// The properties in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.properties
            .iter()
            .map(|(name, property)| (name.as_str(), property))
    }

    #[must_use]
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    #[must_use]
    pub fn operator(&self, op: BinOp) -> Option<&OperatorFn> {
        self.operators.get(&op)
    }

    #[must_use]
    pub fn serializer(&self) -> Option<&Serializer> {
        self.serializer.as_ref()
    }

    /// Creates an instance with empty storage and runs the initializer, if any.
    pub fn construct(self: &Rc<Self>, args: &[Value]) -> Result<Instance, SynthsError> {
        let instance = Instance(Rc::new(InstanceData {
            entity_type: Rc::clone(self),
            slots: RefCell::new(Slots::default()),
        }));
        if let Some(init) = &self.init {
            init(&instance, args)?;
        }
        Ok(instance)
    }
}

impl Debug for EntityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityType")
            .field("name", &self.name)
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("operators", &self.operators.keys().collect::<Vec<_>>())
            .field("serializer", &self.serializer)
            .finish_non_exhaustive()
    }
}

pub struct EntityTypeBuilder {
    entity_type: EntityType,
    duplicates: Vec<String>,
}

impl EntityTypeBuilder {
    #[must_use]
    pub fn property(mut self, name: &str, property: Property) -> Self {
        if self.entity_type.properties.contains_key(name)
            || self.entity_type.methods.contains_key(name)
        {
            self.duplicates.push(name.to_string());
        }
        self.entity_type
            .properties
            .insert(name.to_string(), property);
        self
    }

    #[must_use]
    pub fn method<F>(mut self, name: &str, method: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, SynthsError> + 'static,
    {
        if self.entity_type.properties.contains_key(name)
            || self.entity_type.methods.contains_key(name)
        {
            self.duplicates.push(name.to_string());
        }
        self.entity_type
            .methods
            .insert(name.to_string(), Rc::new(method));
        self
    }

    #[must_use]
    pub fn operator<F>(mut self, op: BinOp, f: F) -> Self
    where
        F: Fn(&Value, &Value) -> Result<Value, SynthsError> + 'static,
    {
        self.entity_type.operators.insert(op, Rc::new(f));
        self
    }

    #[must_use]
    pub fn init<F>(mut self, init: F) -> Self
    where
        F: Fn(&Instance, &[Value]) -> Result<(), SynthsError> + 'static,
    {
        self.entity_type.init = Some(Rc::new(init));
        self
    }

    #[must_use]
    pub fn serializer(mut self, serializer: Serializer) -> Self {
        self.entity_type.serializer = Some(serializer);
        self
    }

    /// Declares the serializer from mode arguments, see
    /// [`make_serializer`](crate::serialize::make_serializer).
    pub fn to_json(self, mode_args: &[Value]) -> Result<Self, SynthsError> {
        Ok(self.serializer(make_serializer(mode_args)?))
    }

    /// Fails if a member name was declared twice.
    pub fn build(self) -> Result<Rc<EntityType>, SynthsError> {
        if !self.duplicates.is_empty() {
            return Err(SynthsError::InvalidOptions(format!(
                "{} declares {} more than once",
                self.entity_type.name,
                self.duplicates.join(", ")
            )));
        }
        Ok(self.finish())
    }

    /// Builds without checking for duplicates; used for the built-in behavior tables.
    pub(crate) fn finish(self) -> Rc<EntityType> {
        trace!(
            "declared entity type {} with {} properties",
            self.entity_type.name,
            self.entity_type.properties.len()
        );
        Rc::new(self.entity_type)
    }
}

#[derive(Default)]
struct Slots {
    named: IndexMap<String, Value>,
    generated: HashMap<usize, Value>,
}

struct InstanceData {
    entity_type: Rc<EntityType>,
    slots: RefCell<Slots>,
}

/// A handle to an entity instance. Cloning shares the instance.
#[derive(Clone)]
pub struct Instance(Rc<InstanceData>);

impl Instance {
    #[must_use]
    pub fn entity_type(&self) -> &Rc<EntityType> {
        &self.0.entity_type
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The raw content of a storage slot. The borrow ends before this returns, so the result
    /// can be handed to user code.
    #[must_use]
    pub fn slot(&self, key: &StorageKey) -> Option<Value> {
        let slots = self.0.slots.borrow();
        match key {
            StorageKey::Named(name) => slots.named.get(name).cloned(),
            StorageKey::Generated(id) => slots.generated.get(id).cloned(),
        }
    }

    pub fn set_slot(&self, key: &StorageKey, value: Value) {
        let mut slots = self.0.slots.borrow_mut();
        match key {
            StorageKey::Named(name) => {
                slots.named.insert(name.clone(), value);
            }
            StorageKey::Generated(id) => {
                slots.generated.insert(*id, value);
            }
        }
    }

    /// Keyed access on an instance reads its named slots.
    #[must_use]
    pub fn field(&self, name: &str) -> Value {
        self.0
            .slots
            .borrow()
            .named
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_field(&self, name: &str, value: Value) {
        self.0
            .slots
            .borrow_mut()
            .named
            .insert(name.to_string(), value);
    }

    /// Whether `name` is a property, a method or a named slot of this instance.
    #[must_use]
    pub fn has_member(&self, name: &str) -> bool {
        let entity_type = self.entity_type();
        entity_type.property(name).is_some()
            || entity_type.method(name).is_some()
            || self.0.slots.borrow().named.contains_key(name)
    }

    /// Calls the property `name` with `args`, or the method `name` if there is no such
    /// property.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, SynthsError> {
        let this = Value::Entity(self.clone());
        let entity_type = self.entity_type();
        if let Some(property) = entity_type.property(name) {
            return property.invoke(&this, args);
        }
        if let Some(method) = entity_type.method(name) {
            return method(&this, args);
        }
        Err(SynthsError::InvalidMethod(format!(
            "{}.{name}",
            entity_type.name()
        )))
    }

    /// Reads the property `name`.
    pub fn get(&self, name: &str) -> Result<Value, SynthsError> {
        self.call(name, &[])
    }

    /// Serializes the instance with its type's serializer.
    pub fn to_json(&self) -> Result<serde_json::Value, SynthsError> {
        let serializer = self.entity_type().serializer().ok_or_else(|| {
            SynthsError::InvalidMethod(format!("{}.toJSON", self.entity_type().name()))
        })?;
        Ok(serde_json::Value::Object(serializer.serialize(self)?))
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.entity_type().name())
            .field("fields", &self.0.slots.borrow().named)
            .finish_non_exhaustive()
    }
}

impl Value {
    /// Calls a member of an entity value; see [`Instance::call`].
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, SynthsError> {
        match self {
            Value::Entity(instance) => instance.call(name, args),
            other => Err(SynthsError::InvalidReceiver(format!(
                "cannot call {name} on a {}",
                other.kind_name()
            ))),
        }
    }
}
