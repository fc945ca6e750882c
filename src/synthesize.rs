/*!

The [`Synthesizer`] turns declarative [`Descriptor`]s into [`Property`] accessors. It is used
while entity types are declared and can be dropped afterwards; the caches it keeps live only as
long as it does.

```rust
use synths::prelude::*;

let synth = Synthesizer::new();
let note = EntityType::builder("Note")
    // a constant
    .property("kind", synth.synthesize(Options::new().constant("note"))?)
    // a basic property stored under `_duration`
    .property(
        "duration",
        synth.synthesize(Options::new().var("_duration").with_default(1))?,
    )
    // a read-only view of the same slot
    .property("length", synth.synthesize(Options::new().get_var("_duration"))?)
    // a typed property
    .property("title", synth.synthesize("string")?)
    .build()?;

let n = note.construct(&[])?;
n.call("duration", &vals!["*=", 2])?;
assert_eq!(n.get("length")?, Value::from(2));
assert_eq!(n.get("title")?, Value::from(""));
# Ok::<(), SynthsError>(())
```

Descriptors are validated eagerly and every violation is a definition error:

- `constant` excludes every other option;
- `get` and `set` exclude `type`, `var` and `default`;
- a `var` name must start with `_` and must not be `_` followed only by digits;
- a basic default that is a date or an entity needs a `type`.

*/

use std::cell::RefCell;
use std::rc::Rc;

use crate::entity::EntityType;
use crate::instruction::camel;
use crate::log::trace;
use crate::property::{
    Accessor, ClonePolicy, Getter, Mutator, Property, Setter, StorageKey,
};
use crate::serialize::{make_serializer, Serializer};
use crate::types::{self, Constructor};
use crate::value::Value;
use crate::{HashMap, SynthsError};

const VAR_PREFIX: char = '_';

/// The type of a typed property: a registered type name or an entity type.
#[derive(Clone, Debug)]
pub enum TypeRef {
    Name(String),
    Entity(Rc<EntityType>),
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        TypeRef::Name(name.to_string())
    }
}

impl From<String> for TypeRef {
    fn from(name: String) -> Self {
        TypeRef::Name(name)
    }
}

impl From<Rc<EntityType>> for TypeRef {
    fn from(entity_type: Rc<EntityType>) -> Self {
        TypeRef::Entity(entity_type)
    }
}

impl From<&Rc<EntityType>> for TypeRef {
    fn from(entity_type: &Rc<EntityType>) -> Self {
        TypeRef::Entity(Rc::clone(entity_type))
    }
}

/// The `get` option: a function, or the storage key to read.
#[derive(Clone)]
pub enum GetOption {
    Function(Getter),
    Var(String),
}

/// The `set` option: a function, or the storage key to write.
#[derive(Clone)]
pub enum SetOption {
    Function(Setter),
    Var(String),
}

/// An options record. Unset fields are absent, so `constant(Value::Undefined)` still declares a
/// constant while `with_default(Value::Undefined)` declares no default.
#[derive(Clone, Default)]
pub struct Options {
    pub get: Option<GetOption>,
    pub set: Option<SetOption>,
    pub type_ref: Option<TypeRef>,
    pub default: Option<Value>,
    pub constant: Option<Value>,
    pub var: Option<String>,
}

impl Options {
    #[must_use]
    pub fn new() -> Options {
        Options::default()
    }

    #[must_use]
    pub fn get<F>(mut self, get: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, SynthsError> + 'static,
    {
        self.get = Some(GetOption::Function(Rc::new(get)));
        self
    }

    #[must_use]
    pub fn get_var(mut self, var: &str) -> Self {
        self.get = Some(GetOption::Var(var.to_string()));
        self
    }

    #[must_use]
    pub fn set<F>(mut self, set: F) -> Self
    where
        F: Fn(&Value, Value) -> Result<(), SynthsError> + 'static,
    {
        self.set = Some(SetOption::Function(Rc::new(set)));
        self
    }

    #[must_use]
    pub fn set_var(mut self, var: &str) -> Self {
        self.set = Some(SetOption::Var(var.to_string()));
        self
    }

    #[must_use]
    pub fn of_type(mut self, type_ref: impl Into<TypeRef>) -> Self {
        self.type_ref = Some(type_ref.into());
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    #[must_use]
    pub fn constant(mut self, constant: impl Into<Value>) -> Self {
        self.constant = Some(constant.into());
        self
    }

    #[must_use]
    pub fn var(mut self, var: &str) -> Self {
        self.var = Some(var.to_string());
        self
    }
}

/// What to synthesize.
#[derive(Clone)]
pub enum Descriptor {
    /// A read-write property with a generated storage key and no default.
    Basic,
    /// `"undefined"`, `"null"`, a storage key such as `"_x"`, or a registered type name.
    Shortcut(String),
    Constant(Value),
    Type(TypeRef),
    Options(Options),
}

impl From<&str> for Descriptor {
    fn from(shortcut: &str) -> Self {
        Descriptor::Shortcut(shortcut.to_string())
    }
}

impl From<Options> for Descriptor {
    fn from(options: Options) -> Self {
        Descriptor::Options(options)
    }
}

impl From<TypeRef> for Descriptor {
    fn from(type_ref: TypeRef) -> Self {
        Descriptor::Type(type_ref)
    }
}

impl From<Rc<EntityType>> for Descriptor {
    fn from(entity_type: Rc<EntityType>) -> Self {
        Descriptor::Type(TypeRef::Entity(entity_type))
    }
}

impl From<&Rc<EntityType>> for Descriptor {
    fn from(entity_type: &Rc<EntityType>) -> Self {
        Descriptor::Type(TypeRef::from(entity_type))
    }
}

/// Properties that carry no per-declaration state and are shared between declarations.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum Shared {
    ReadVar,
    WriteVar,
    Constant,
}

#[derive(Default)]
pub struct Synthesizer {
    camel_names: RefCell<HashMap<String, String>>,
    shared_properties: RefCell<HashMap<(Shared, String), Property>>,
}

impl Synthesizer {
    #[must_use]
    pub fn new() -> Synthesizer {
        Synthesizer::default()
    }

    /// Creates the accessor a descriptor describes.
    pub fn synthesize(&self, descriptor: impl Into<Descriptor>) -> Result<Property, SynthsError> {
        let options = match descriptor.into() {
            Descriptor::Basic => Options::new(),
            Descriptor::Shortcut(shortcut) => match shortcut.as_str() {
                "undefined" | "null" => {
                    return Ok(self.shared(Shared::Constant, shortcut.clone()));
                }
                _ => self.shortcut_options(&shortcut)?,
            },
            Descriptor::Constant(value) => Options::new().constant(value),
            Descriptor::Type(type_ref) => Options::new().of_type(type_ref),
            Descriptor::Options(options) => options,
        };
        let property = self.from_options(options)?;
        trace!("synthesized {property:?}");
        Ok(property)
    }

    /// Creates a serializer; the companion of [`synthesize`](Synthesizer::synthesize) for
    /// declaring how instances are converted to JSON.
    pub fn to_json(&self, mode_args: &[Value]) -> Result<Serializer, SynthsError> {
        let serializer = make_serializer(mode_args)?;
        trace!("synthesized serializer {serializer:?}");
        Ok(serializer)
    }

    fn shortcut_options(&self, shortcut: &str) -> Result<Options, SynthsError> {
        if shortcut.starts_with(VAR_PREFIX) {
            Ok(Options::new().var(shortcut))
        } else if types::is_registered(&self.camel(shortcut)) {
            Ok(Options::new().of_type(shortcut))
        } else {
            Err(SynthsError::UnknownType(format!(
                "{shortcut} is neither a var name nor a type name"
            )))
        }
    }

    fn from_options(&self, options: Options) -> Result<Property, SynthsError> {
        let Options {
            get,
            set,
            type_ref,
            default,
            constant,
            var,
        } = options;
        let default = default.filter(|default| !default.is_undefined());
        if let Some(var) = &var {
            validate_var_name(var)?;
        }

        let accessors = usize::from(get.is_some()) + usize::from(set.is_some());
        let declared =
            accessors + usize::from(type_ref.is_some()) + usize::from(constant.is_some());

        if let Some(constant) = constant {
            if declared > 1 || var.is_some() || default.is_some() {
                return Err(SynthsError::InvalidOptions(
                    "a constant cannot be declared with any other option".to_string(),
                ));
            }
            return Ok(Property::constant(constant));
        }

        if accessors > 0 {
            if type_ref.is_some() || var.is_some() || default.is_some() {
                return Err(SynthsError::InvalidOptions(
                    "get and set cannot be declared with type, var or default".to_string(),
                ));
            }
            return self.accessor_property(get, set);
        }

        let key = var.map_or_else(StorageKey::generate, StorageKey::Named);
        match type_ref {
            Some(type_ref) => self.typed_property(key, type_ref, default),
            None => {
                let default = default.unwrap_or_default();
                let clone = ClonePolicy::for_default(&default)?;
                Ok(Property::basic(key, default, clone))
            }
        }
    }

    fn accessor_property(
        &self,
        get: Option<GetOption>,
        set: Option<SetOption>,
    ) -> Result<Property, SynthsError> {
        match (get, set) {
            (Some(GetOption::Function(get)), None) => {
                Ok(Property::read_only(Accessor::Getter(get)))
            }
            (Some(GetOption::Var(var)), None) => {
                validate_var_name(&var)?;
                Ok(self.shared(Shared::ReadVar, var))
            }
            (None, Some(SetOption::Function(set))) => {
                Ok(Property::write_only(Mutator::Setter(set)))
            }
            (None, Some(SetOption::Var(var))) => {
                validate_var_name(&var)?;
                Ok(self.shared(Shared::WriteVar, var))
            }
            (Some(GetOption::Function(get)), Some(SetOption::Function(set))) => {
                Ok(Property::custom(get, set))
            }
            (Some(_), Some(_)) => Err(SynthsError::InvalidOptions(
                "a custom property needs a get function and a set function".to_string(),
            )),
            (None, None) => Err(SynthsError::InvalidOptions(
                "neither get nor set was declared".to_string(),
            )),
        }
    }

    /// Var-bound read-only and write-only properties and the `"undefined"` and `"null"`
    /// constants are created once per name.
    fn shared(&self, kind: Shared, name: String) -> Property {
        let cache_key = (kind, name);
        if let Some(property) = self.shared_properties.borrow().get(&cache_key) {
            trace!("reusing the accessor of {}", cache_key.1);
            return property.clone();
        }
        let name = &cache_key.1;
        let property = match kind {
            Shared::ReadVar => Property::read_only(Accessor::Var(StorageKey::Named(name.clone()))),
            Shared::WriteVar => {
                Property::write_only(Mutator::Var(StorageKey::Named(name.clone())))
            }
            Shared::Constant if name == "null" => Property::constant(Value::Null),
            Shared::Constant => Property::constant(Value::Undefined),
        };
        self.shared_properties
            .borrow_mut()
            .insert(cache_key, property.clone());
        property
    }

    fn typed_property(
        &self,
        key: StorageKey,
        type_ref: TypeRef,
        default: Option<Value>,
    ) -> Result<Property, SynthsError> {
        let constructor = match type_ref {
            TypeRef::Name(name) => types::resolve(&self.camel(&name))?,
            TypeRef::Entity(entity_type) => Constructor::Entity(entity_type),
        };
        let default_args = match default {
            None => Vec::new(),
            Some(Value::Seq(items)) => items.borrow().clone(),
            Some(single) => vec![single],
        };
        Ok(Property::typed(key, constructor, default_args))
    }

    fn camel(&self, name: &str) -> String {
        if let Some(cached) = self.camel_names.borrow().get(name) {
            return cached.clone();
        }
        let camel_cased = camel(name);
        self.camel_names
            .borrow_mut()
            .insert(name.to_string(), camel_cased.clone());
        camel_cased
    }
}

fn validate_var_name(var: &str) -> Result<(), SynthsError> {
    let Some(rest) = var.strip_prefix(VAR_PREFIX) else {
        return Err(SynthsError::InvalidVarName(format!(
            "{var} does not start with {VAR_PREFIX}"
        )));
    };
    if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
        return Err(SynthsError::InvalidVarName(format!(
            "{var} is reserved for generated keys"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::Mode;
    use crate::vals;

    fn one_property(property: Property) -> crate::entity::Instance {
        EntityType::builder("Holder")
            .property("p", property)
            .build()
            .unwrap()
            .construct(&[])
            .unwrap()
    }

    #[test]
    fn validates_var_names() {
        assert!(validate_var_name("_x").is_ok());
        assert!(validate_var_name("_1x").is_ok());
        assert!(validate_var_name("_").is_ok());
        assert!(matches!(
            validate_var_name("x"),
            Err(SynthsError::InvalidVarName(_))
        ));
        assert!(matches!(
            validate_var_name("_12"),
            Err(SynthsError::InvalidVarName(_))
        ));
    }

    #[test]
    fn shortcuts() {
        let synth = Synthesizer::new();
        let undefined = one_property(synth.synthesize("undefined").unwrap());
        assert_eq!(undefined.get("p").unwrap(), Value::Undefined);
        let null = one_property(synth.synthesize("null").unwrap());
        assert_eq!(null.get("p").unwrap(), Value::Null);

        let var = synth.synthesize("_name").unwrap();
        assert_eq!(var.storage_key(), Some(&StorageKey::Named("_name".into())));
        assert_eq!(var.mode(), Mode::ReadWrite);

        let typed = one_property(synth.synthesize("plain-object").unwrap());
        assert_eq!(typed.get("p").unwrap(), crate::record! {});

        assert!(matches!(
            synth.synthesize("float"),
            Err(SynthsError::UnknownType(_))
        ));
    }

    #[test]
    fn basic_without_default() {
        let synth = Synthesizer::new();
        let holder = one_property(synth.synthesize(Descriptor::Basic).unwrap());
        assert_eq!(holder.get("p").unwrap(), Value::Undefined);
        holder.call("p", &vals![3]).unwrap();
        assert_eq!(holder.get("p").unwrap(), Value::from(3));
    }

    #[test]
    fn constant_excludes_other_options() {
        let synth = Synthesizer::new();
        let result = synth.synthesize(Options::new().constant(1).with_default(2));
        assert!(matches!(result, Err(SynthsError::InvalidOptions(_))));
        let result = synth.synthesize(Options::new().constant(1).var("_c"));
        assert!(matches!(result, Err(SynthsError::InvalidOptions(_))));
        let constant = synth.synthesize(Options::new().constant(Value::Undefined)).unwrap();
        assert_eq!(constant.mode(), Mode::ReadWrite);
    }

    #[test]
    fn accessors_exclude_storage_options() {
        let synth = Synthesizer::new();
        let getter = |_: &Value| Ok(Value::from(1));
        assert!(matches!(
            synth.synthesize(Options::new().get(getter).var("_x")),
            Err(SynthsError::InvalidOptions(_))
        ));
        assert!(matches!(
            synth.synthesize(Options::new().get(getter).with_default(1)),
            Err(SynthsError::InvalidOptions(_))
        ));
        assert!(matches!(
            synth.synthesize(Options::new().get(getter).of_type("string")),
            Err(SynthsError::InvalidOptions(_))
        ));
        assert!(matches!(
            synth.synthesize(Options::new().get_var("_x").set(|_, _| Ok(()))),
            Err(SynthsError::InvalidOptions(_))
        ));
    }

    #[test]
    fn accessor_modes() {
        let synth = Synthesizer::new();
        let read = synth.synthesize(Options::new().get(|_| Ok(Value::from(1)))).unwrap();
        assert_eq!(read.mode(), Mode::ReadOnly);
        let write = synth.synthesize(Options::new().set_var("_w")).unwrap();
        assert_eq!(write.mode(), Mode::WriteOnly);
        let custom = synth
            .synthesize(Options::new().get(|_| Ok(Value::Null)).set(|_, _| Ok(())))
            .unwrap();
        assert_eq!(custom.mode(), Mode::ReadWrite);
    }

    #[test]
    fn var_accessors_are_shared() {
        let synth = Synthesizer::new();
        let a = synth.synthesize(Options::new().get_var("_x")).unwrap();
        let b = synth.synthesize(Options::new().get_var("_x")).unwrap();
        let c = synth.synthesize(Options::new().set_var("_x")).unwrap();
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        let null = synth.synthesize("null").unwrap();
        assert!(null.ptr_eq(&synth.synthesize("null").unwrap()));
        assert!(!null.ptr_eq(&synth.synthesize("undefined").unwrap()));
        assert!(!a.ptr_eq(&Synthesizer::new().synthesize(Options::new().get_var("_x")).unwrap()));
        assert!(matches!(
            synth.synthesize(Options::new().get_var("x")),
            Err(SynthsError::InvalidVarName(_))
        ));
    }

    #[test]
    fn mutable_defaults_need_a_type() {
        let synth = Synthesizer::new();
        let date = chrono::NaiveDateTime::default();
        assert!(matches!(
            synth.synthesize(Options::new().with_default(date)),
            Err(SynthsError::MutableDefault(_))
        ));
        let typed = one_property(
            synth
                .synthesize(Options::new().of_type("date").with_default(date))
                .unwrap(),
        );
        assert_eq!(typed.get("p").unwrap(), Value::date(date));
    }

    #[test]
    fn typed_defaults_are_constructor_arguments() {
        let synth = Synthesizer::new();
        let spread = one_property(
            synth
                .synthesize(Options::new().of_type("array").with_default(vals![1, 2]))
                .unwrap(),
        );
        assert_eq!(spread.get("p").unwrap(), Value::seq(vals![1, 2]));

        let single = one_property(
            synth
                .synthesize(Options::new().of_type("integer").with_default("42px"))
                .unwrap(),
        );
        assert_eq!(single.get("p").unwrap(), Value::from(42));
        single.call("p", &vals!["7.9"]).unwrap();
        assert_eq!(single.get("p").unwrap(), Value::from(7));
    }

    #[test]
    fn to_json_companion() {
        let synth = Synthesizer::new();
        assert_eq!(synth.to_json(&[]).unwrap(), Serializer::Basic);
        assert!(synth.to_json(&vals![1]).is_err());
    }
}
