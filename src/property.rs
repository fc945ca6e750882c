/*!

A [`Property`] is a synthesized accessor. It is created once, while an entity type is being
declared (see [`Synthesizer`](crate::Synthesizer)), and shared by every instance of the type.

Calling a property with no arguments reads it. Calling it with arguments hands the first
argument to the [evaluator](crate::evaluate) as an instruction to apply to the current value,
and only writes when the evaluator says the call is a write:

```rust
use synths::prelude::*;

let synth = Synthesizer::new();
let counter = EntityType::builder("Counter")
    .property("count", synth.synthesize(Options::new().with_default(5))?)
    .build()?;
let counter = counter.construct(&[])?;

assert_eq!(counter.call("count", &vals!["+", 3])?, Value::from(8)); // read
assert_eq!(counter.get("count")?, Value::from(5));
counter.call("count", &vals!["+=", 3])?; // write, returns the instance
assert_eq!(counter.get("count")?, Value::from(8));
# Ok::<(), SynthsError>(())
```

There are six kinds of property, each with a fixed [`Mode`]:

| kind      | mode       | storage                                   |
|-----------|------------|-------------------------------------------|
| constant  | read-write | none, writes are rejected                 |
| read-only | read-only  | getter function or storage key            |
| write-only| write-only | setter function or storage key            |
| custom    | read-write | getter and setter functions               |
| basic     | read-write | storage key, default copied per instance  |
| typed     | read-write | storage key holding a constructed value   |

Misuse (writing a constant, reading a write-only property, ...) is reported through the
[channel](crate::channel) and otherwise ignored.

*/

use std::fmt::{self, Debug, Formatter};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::channel;
use crate::entity::Instance;
use crate::evaluate::{evaluate, Outcome};
use crate::types::Constructor;
use crate::value::Value;
use crate::SynthsError;

/// Reads a value from the receiver.
pub type Getter = Rc<dyn Fn(&Value) -> Result<Value, SynthsError>>;
/// Writes a value to the receiver.
pub type Setter = Rc<dyn Fn(&Value, Value) -> Result<(), SynthsError>>;

pub fn getter<F>(f: F) -> Getter
where
    F: Fn(&Value) -> Result<Value, SynthsError> + 'static,
{
    Rc::new(f)
}

pub fn setter<F>(f: F) -> Setter
where
    F: Fn(&Value, Value) -> Result<(), SynthsError> + 'static,
{
    Rc::new(f)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl Mode {
    #[must_use]
    pub fn is_readable(self) -> bool {
        matches!(self, Mode::ReadOnly | Mode::ReadWrite)
    }

    #[must_use]
    pub fn is_writable(self) -> bool {
        matches!(self, Mode::WriteOnly | Mode::ReadWrite)
    }
}

/// Next id handed out to a property declared without a storage key.
static NEXT_SLOT_ID: AtomicUsize = AtomicUsize::new(0);

/// Where an instance keeps the value of a property.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// A declared var name such as `_pitch`. Several properties may share one.
    Named(String),
    /// A key generated for a property declared without one; never shared.
    Generated(usize),
}

impl StorageKey {
    #[must_use]
    pub fn generate() -> StorageKey {
        StorageKey::Generated(NEXT_SLOT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StorageKey::Named(name) => write!(f, "{name}"),
            StorageKey::Generated(id) => write!(f, "_{id}"),
        }
    }
}

/// How a basic property's default is copied into a fresh instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClonePolicy {
    /// Scalars are used as they are.
    Identity,
    /// Sequences get a new sequence with the same items.
    Shallow,
    /// Records are copied recursively.
    Deep,
}

impl ClonePolicy {
    /// Picks the policy for a default value. Dates and entities are mutable objects that need a
    /// type to be constructed per instance, so they are rejected.
    pub fn for_default(default: &Value) -> Result<ClonePolicy, SynthsError> {
        match default {
            Value::Seq(_) => Ok(ClonePolicy::Shallow),
            Value::Record(_) => Ok(ClonePolicy::Deep),
            Value::Date(_) | Value::Entity(_) => Err(SynthsError::MutableDefault(format!(
                "a default {} needs an associated type",
                default.kind_name()
            ))),
            _ => Ok(ClonePolicy::Identity),
        }
    }

    #[must_use]
    pub fn apply(self, value: &Value) -> Value {
        match self {
            ClonePolicy::Identity => value.clone(),
            ClonePolicy::Shallow => value.shallow_copy(),
            ClonePolicy::Deep => value.deep_copy(),
        }
    }
}

/// The read side of a read-only property.
#[derive(Clone)]
pub enum Accessor {
    Getter(Getter),
    Var(StorageKey),
}

/// The write side of a write-only property.
#[derive(Clone)]
pub enum Mutator {
    Setter(Setter),
    Var(StorageKey),
}

#[derive(Clone)]
enum PropertyKind {
    Constant(Value),
    ReadOnly(Accessor),
    WriteOnly(Mutator),
    Custom {
        get: Getter,
        set: Setter,
    },
    Basic {
        key: StorageKey,
        default: Value,
        clone: ClonePolicy,
    },
    Typed {
        key: StorageKey,
        constructor: Constructor,
        default_args: Vec<Value>,
    },
}

struct PropertyDef {
    mode: Mode,
    kind: PropertyKind,
}

/// A synthesized accessor. Cloning shares the definition.
#[derive(Clone)]
pub struct Property(Rc<PropertyDef>);

impl Property {
    fn new(mode: Mode, kind: PropertyKind) -> Property {
        Property(Rc::new(PropertyDef { mode, kind }))
    }

    /// Always reads `value`; every write is rejected.
    pub fn constant(value: Value) -> Property {
        Property::new(Mode::ReadWrite, PropertyKind::Constant(value))
    }

    pub fn read_only(accessor: Accessor) -> Property {
        Property::new(Mode::ReadOnly, PropertyKind::ReadOnly(accessor))
    }

    pub fn write_only(mutator: Mutator) -> Property {
        Property::new(Mode::WriteOnly, PropertyKind::WriteOnly(mutator))
    }

    pub fn custom(get: Getter, set: Setter) -> Property {
        Property::new(Mode::ReadWrite, PropertyKind::Custom { get, set })
    }

    pub fn basic(key: StorageKey, default: Value, clone: ClonePolicy) -> Property {
        Property::new(
            Mode::ReadWrite,
            PropertyKind::Basic {
                key,
                default,
                clone,
            },
        )
    }

    pub fn typed(key: StorageKey, constructor: Constructor, default_args: Vec<Value>) -> Property {
        Property::new(
            Mode::ReadWrite,
            PropertyKind::Typed {
                key,
                constructor,
                default_args,
            },
        )
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.0.mode
    }

    /// The storage key, for properties that have one.
    #[must_use]
    pub fn storage_key(&self) -> Option<&StorageKey> {
        match &self.0.kind {
            PropertyKind::ReadOnly(Accessor::Var(key))
            | PropertyKind::WriteOnly(Mutator::Var(key))
            | PropertyKind::Basic { key, .. }
            | PropertyKind::Typed { key, .. } => Some(key),
            _ => None,
        }
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Property) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Invokes the accessor on `this`. With no arguments this is a read; otherwise the first
    /// argument is the instruction and the rest its arguments. Writes return `this`.
    pub fn invoke(&self, this: &Value, args: &[Value]) -> Result<Value, SynthsError> {
        match &self.0.kind {
            PropertyKind::Constant(value) => {
                if args.is_empty() {
                    return Ok(value.clone());
                }
                channel::write_to_constant(value)?;
                Ok(this.clone())
            }

            PropertyKind::ReadOnly(accessor) => {
                let current = match accessor {
                    Accessor::Getter(get) => get(this)?,
                    Accessor::Var(key) => receiver(this)?.slot(key).unwrap_or_default(),
                };
                let Some((key, rest)) = args.split_first() else {
                    return Ok(current);
                };
                match evaluate(&current, key, rest, None)? {
                    Outcome::Read(value) => Ok(value),
                    Outcome::Write(_) | Outcome::WriteRequest => {
                        channel::write_to_read_only()?;
                        Ok(this.clone())
                    }
                    Outcome::Done => Ok(this.clone()),
                }
            }

            PropertyKind::WriteOnly(mutator) => match args {
                [] => {
                    channel::read_a_write_only()?;
                    Ok(Value::Undefined)
                }
                [value] => {
                    match mutator {
                        Mutator::Setter(set) => set(this, value.clone())?,
                        Mutator::Var(key) => receiver(this)?.set_slot(key, value.clone()),
                    }
                    Ok(this.clone())
                }
                _ => {
                    channel::write_more_than_one_arg()?;
                    Ok(Value::Undefined)
                }
            },

            PropertyKind::Custom { get, set } => {
                let current = get(this)?;
                let Some((key, rest)) = args.split_first() else {
                    return Ok(current);
                };
                match evaluate(&current, key, rest, None)? {
                    Outcome::Read(value) => return Ok(value),
                    Outcome::Write(value) => set(this, value)?,
                    Outcome::WriteRequest => set(this, key.clone())?,
                    Outcome::Done => {}
                }
                Ok(this.clone())
            }

            PropertyKind::Basic {
                key: slot,
                default,
                clone,
            } => {
                let instance = receiver(this)?;
                let current = match instance.slot(slot) {
                    Some(value) if !value.is_undefined() => value,
                    _ => {
                        let value = clone.apply(default);
                        instance.set_slot(slot, value.clone());
                        value
                    }
                };
                let Some((key, rest)) = args.split_first() else {
                    return Ok(current);
                };
                match evaluate(&current, key, rest, None)? {
                    Outcome::Read(value) => return Ok(value),
                    Outcome::Write(value) => instance.set_slot(slot, value),
                    Outcome::WriteRequest => instance.set_slot(slot, key.clone()),
                    Outcome::Done => {}
                }
                Ok(this.clone())
            }

            PropertyKind::Typed {
                key: slot,
                constructor,
                default_args,
            } => {
                let instance = receiver(this)?;
                let nested = match instance.slot(slot) {
                    Some(value) if !value.is_undefined() => value,
                    _ => {
                        let value = constructor.construct(default_args)?;
                        instance.set_slot(slot, value.clone());
                        attach_parent(&value, this)?;
                        value
                    }
                };
                let current = unwrap_nested(&nested)?;
                let Some((key, rest)) = args.split_first() else {
                    return Ok(current);
                };
                let replacement = match evaluate(&current, key, rest, Some(constructor))? {
                    Outcome::Read(value) => return Ok(value),
                    Outcome::Write(value) => Some(if constructor.accepts(&value) {
                        value
                    } else {
                        constructor.construct(std::slice::from_ref(&value))?
                    }),
                    Outcome::WriteRequest => Some(if constructor.accepts(key) {
                        key.clone()
                    } else {
                        constructor.construct(args)?
                    }),
                    Outcome::Done => None,
                };
                if let Some(value) = replacement {
                    instance.set_slot(slot, value.clone());
                    attach_parent(&value, this)?;
                }
                Ok(this.clone())
            }
        }
    }
}

impl Debug for Property {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let kind = match &self.0.kind {
            PropertyKind::Constant(_) => "constant",
            PropertyKind::ReadOnly(_) => "read-only",
            PropertyKind::WriteOnly(_) => "write-only",
            PropertyKind::Custom { .. } => "custom",
            PropertyKind::Basic { .. } => "basic",
            PropertyKind::Typed { .. } => "typed",
        };
        f.debug_struct("Property")
            .field("kind", &kind)
            .field("mode", &self.0.mode)
            .field("storage_key", &self.storage_key())
            .finish()
    }
}

/// Storage-backed properties only make sense on entity instances.
fn receiver(this: &Value) -> Result<&Instance, SynthsError> {
    this.as_entity().ok_or_else(|| {
        SynthsError::InvalidReceiver(format!(
            "a storage-backed property was invoked on a {}",
            this.kind_name()
        ))
    })
}

/// The value a typed property reads: the nested entity's own `value` property when it exposes a
/// readable one, otherwise the nested value itself.
fn unwrap_nested(nested: &Value) -> Result<Value, SynthsError> {
    if let Value::Entity(instance) = nested {
        if let Some(property) = instance.entity_type().property("value") {
            if property.mode().is_readable() {
                return property.invoke(nested, &[]);
            }
        }
    }
    Ok(nested.clone())
}

/// Lets a nested entity know its owner, if its type declares a `setParent` method.
fn attach_parent(nested: &Value, owner: &Value) -> Result<(), SynthsError> {
    if let Value::Entity(instance) = nested {
        if let Some(method) = instance.entity_type().method("setParent") {
            method(nested, std::slice::from_ref(owner))?;
        }
    }
    Ok(())
}
