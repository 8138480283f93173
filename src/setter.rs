//! Typed setter capabilities
//!
//! A `Setter` is what a binding calls once a string has been coerced. There
//! is one variant per supported kind, so registering `Setter::float(..)`
//! is checked by the compiler instead of looked up at runtime.
//!
//! Owners that want to expose setters by name implement `ParameterOwner`,
//! an explicit table the dispatcher consults in `register_setter`.

use std::fmt;
use std::rc::Rc;

use crate::error::ParamError;
use crate::value::{self, ParamValue, ValueKind};

/// Single-argument setter, specialized per value kind
///
/// Setters are reference-counted so one owner table can hand the same
/// capability to several bindings. Owner state is usually captured as
/// `Rc<RefCell<_>>` or `Rc<Cell<_>>`.
#[derive(Clone)]
pub enum Setter {
    Float(Rc<dyn Fn(f64)>),
    Int(Rc<dyn Fn(i32)>),
    Bool(Rc<dyn Fn(bool)>),
    Text(Rc<dyn Fn(String)>),
    /// Declared with a kind outside the four supported ones; fails when applied
    Unsupported(String),
}

impl Setter {
    pub fn float(f: impl Fn(f64) + 'static) -> Self {
        Setter::Float(Rc::new(f))
    }

    pub fn int(f: impl Fn(i32) + 'static) -> Self {
        Setter::Int(Rc::new(f))
    }

    pub fn bool(f: impl Fn(bool) + 'static) -> Self {
        Setter::Bool(Rc::new(f))
    }

    pub fn text(f: impl Fn(String) + 'static) -> Self {
        Setter::Text(Rc::new(f))
    }

    /// Build a setter for a kind known only at runtime
    ///
    /// `sink` receives every coerced value. Unknown kind names yield
    /// `Setter::Unsupported`, which only errors once a value arrives.
    pub fn dynamic(kind: &str, sink: impl Fn(ParamValue) + 'static) -> Self {
        match kind.parse::<ValueKind>() {
            Ok(ValueKind::Float) => Setter::Float(Rc::new(move |v: f64| sink(ParamValue::Float(v)))),
            Ok(ValueKind::Int) => Setter::Int(Rc::new(move |v: i32| sink(ParamValue::Int(v)))),
            Ok(ValueKind::Bool) => Setter::Bool(Rc::new(move |v: bool| sink(ParamValue::Bool(v)))),
            Ok(ValueKind::Text) => Setter::Text(Rc::new(move |v: String| sink(ParamValue::Text(v)))),
            Err(other) => Setter::Unsupported(other),
        }
    }

    /// Declared kind, or `None` for unsupported setters
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Setter::Float(_) => Some(ValueKind::Float),
            Setter::Int(_) => Some(ValueKind::Int),
            Setter::Bool(_) => Some(ValueKind::Bool),
            Setter::Text(_) => Some(ValueKind::Text),
            Setter::Unsupported(_) => None,
        }
    }

    /// Kind name as declared, including unsupported ones
    pub fn declared_kind(&self) -> String {
        match self {
            Setter::Unsupported(kind) => kind.clone(),
            other => other.kind().map(|k| k.to_string()).unwrap_or_default(),
        }
    }

    /// Coerce `raw` to this setter's kind and call it
    pub fn apply(&self, name: &str, raw: &str) -> Result<(), ParamError> {
        match self {
            Setter::Float(f) => f(value::parse_float(name, raw)?),
            Setter::Int(f) => f(value::parse_int(name, raw)?),
            Setter::Bool(f) => f(value::parse_bool(raw)),
            Setter::Text(f) => f(raw.to_string()),
            Setter::Unsupported(kind) => {
                return Err(ParamError::UnsupportedValueKind {
                    name: name.to_string(),
                    kind: kind.clone(),
                })
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Setter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(f, "Setter({kind})"),
            None => write!(f, "Setter::Unsupported({})", self.declared_kind()),
        }
    }
}

/// Explicit setter table of an owner object
///
/// Replaces method lookup by name: the owner lists the setters it is
/// willing to expose.
pub trait ParameterOwner {
    /// Name used in diagnostics
    fn owner_name(&self) -> &str;

    /// Look up a setter by its name
    fn setter(&self, setter_name: &str) -> Option<Setter>;
}
