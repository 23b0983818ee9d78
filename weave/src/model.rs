//! Validated definitions shared by the build phases

use indexmap::IndexSet;
use serde::Serialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{self, Display, Formatter}
};
use weave_di::Scope;

macro_rules! define_marker {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        pub struct $name {
            name: String,
            attributes: BTreeMap<String, String>,
        }

        impl $name {
            /// Creates a marker without attributes
            #[inline]
            pub fn new(name: impl Into<String>) -> Self {
                Self { name: name.into(), attributes: BTreeMap::new() }
            }

            /// Adds an attribute
            #[inline]
            pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
                self.attributes.insert(key.into(), value.into());
                self
            }

            /// Name of the marker
            #[inline]
            pub fn name(&self) -> &str {
                &self.name
            }

            /// Attributes, sorted by key
            #[inline]
            pub fn attributes(&self) -> &BTreeMap<String, String> {
                &self.attributes
            }

            #[inline]
            pub(crate) fn from_parts(name: String, attributes: BTreeMap<String, String>) -> Self {
                Self { name, attributes }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str("@")?;
                f.write_str(&self.name)?;
                if self.attributes.is_empty() {
                    return Ok(());
                }
                f.write_str("(")?;
                for (i, (key, value)) in self.attributes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}={value}")?;
                }
                f.write_str(")")
            }
        }
    };
}

define_marker! {
    /// A named attribute set that disambiguates providers of the same type.
    ///
    /// Two qualifiers are equal only if their names and all attributes are equal.
    Qualifier
}

define_marker! {
    /// A marker that connects intercepted methods to the interceptors that apply to them
    InterceptorBinding
}

/// The bean or interceptor that owns an injection point
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Owner {
    /// Owned by a bean
    Bean(String),
    /// Owned by an interceptor
    Interceptor(String),
}

impl Owner {
    /// Identity of the owner
    #[inline]
    pub fn id(&self) -> &str {
        match self {
            Owner::Bean(id) | Owner::Interceptor(id) => id,
        }
    }
}

impl Display for Owner {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Bean(id) => write!(f, "bean `{id}`"),
            Owner::Interceptor(id) => write!(f, "interceptor `{id}`"),
        }
    }
}

/// A required type and qualifier set a dependency must satisfy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InjectionPoint {
    pub(crate) owner: Owner,
    pub(crate) index: usize,
    pub(crate) name: Option<String>,
    pub(crate) required_type: String,
    pub(crate) qualifiers: BTreeSet<Qualifier>,
}

impl InjectionPoint {
    /// The bean or interceptor that declares this dependency
    #[inline]
    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    /// Position of this dependency among the owner's dependencies
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Optional name used in diagnostics
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The type a candidate bean must be assignable to
    #[inline]
    pub fn required_type(&self) -> &str {
        &self.required_type
    }

    /// Qualifiers a candidate bean must carry
    #[inline]
    pub fn qualifiers(&self) -> &BTreeSet<Qualifier> {
        &self.qualifiers
    }

    /// Identity of this point within the deployment
    #[inline]
    pub fn id(&self) -> InjectionPointId {
        InjectionPointId { owner: self.owner.clone(), index: self.index }
    }
}

impl Display for InjectionPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} dependency #{}", self.owner, self.index)?;
        if let Some(name) = &self.name {
            write!(f, " `{name}`")?;
        }
        write!(f, " of type `{}`", self.required_type)?;
        for qualifier in &self.qualifiers {
            write!(f, " {qualifier}")?;
        }
        Ok(())
    }
}

/// Identity of an injection point: its owner and position
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct InjectionPointId {
    /// The owning bean or interceptor
    pub owner: Owner,
    /// Position among the owner's dependencies
    pub index: usize,
}

impl InjectionPointId {
    /// Identity of the dependency at `index` of a bean
    #[inline]
    pub fn bean(id: impl Into<String>, index: usize) -> Self {
        Self { owner: Owner::Bean(id.into()), index }
    }

    /// Identity of the dependency at `index` of an interceptor
    #[inline]
    pub fn interceptor(id: impl Into<String>, index: usize) -> Self {
        Self { owner: Owner::Interceptor(id.into()), index }
    }
}

/// A method of a bean and the bindings declared on it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDefinition {
    pub(crate) name: String,
    pub(crate) bindings: BTreeSet<InterceptorBinding>,
}

impl MethodDefinition {
    /// Name of the method
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bindings declared on the method itself
    #[inline]
    pub fn bindings(&self) -> &BTreeSet<InterceptorBinding> {
        &self.bindings
    }
}

/// A validated bean
#[derive(Debug, Clone)]
pub struct BeanDefinition {
    pub(crate) id: String,
    pub(crate) types: IndexSet<String>,
    pub(crate) qualifiers: BTreeSet<Qualifier>,
    pub(crate) scope: Scope,
    pub(crate) default: bool,
    pub(crate) dependencies: Vec<InjectionPoint>,
    pub(crate) bindings: BTreeSet<InterceptorBinding>,
    pub(crate) methods: Vec<MethodDefinition>,
    pub(crate) order: usize,
}

impl BeanDefinition {
    /// Unique identity of the bean
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The declared implementation type
    #[inline]
    pub fn type_name(&self) -> &str {
        self.types
            .first()
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// The declared type followed by its supertypes and capabilities
    #[inline]
    pub fn types(&self) -> &IndexSet<String> {
        &self.types
    }

    /// Qualifiers declared on the bean
    #[inline]
    pub fn qualifiers(&self) -> &BTreeSet<Qualifier> {
        &self.qualifiers
    }

    /// Lifecycle policy of the bean
    #[inline]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Returns `true` if the bean wins ties between otherwise ambiguous candidates
    #[inline]
    pub fn is_default(&self) -> bool {
        self.default
    }

    /// Injection points in declaration order
    #[inline]
    pub fn dependencies(&self) -> &[InjectionPoint] {
        &self.dependencies
    }

    /// Class-level interceptor bindings
    #[inline]
    pub fn bindings(&self) -> &BTreeSet<InterceptorBinding> {
        &self.bindings
    }

    /// Methods in declaration order
    #[inline]
    pub fn methods(&self) -> &[MethodDefinition] {
        &self.methods
    }

    /// Position of the bean in the type catalog
    #[inline]
    pub fn order(&self) -> usize {
        self.order
    }

    /// Returns `true` if the bean can be injected where `required` is expected
    #[inline]
    pub fn is_assignable_to(&self, required: &str) -> bool {
        self.types.contains(required)
    }

    /// Returns `true` if the bean carries every required qualifier
    #[inline]
    pub fn has_qualifiers(&self, required: &BTreeSet<Qualifier>) -> bool {
        required.is_subset(&self.qualifiers)
    }

    /// Class-level bindings united with the bindings of a method
    pub fn effective_bindings(&self, method: &MethodDefinition) -> BTreeSet<InterceptorBinding> {
        self.bindings
            .union(&method.bindings)
            .cloned()
            .collect()
    }
}

/// A validated interceptor
#[derive(Debug, Clone)]
pub struct InterceptorDefinition {
    pub(crate) id: String,
    pub(crate) bindings: BTreeSet<InterceptorBinding>,
    pub(crate) priority: i32,
    pub(crate) behavior: String,
    pub(crate) dependencies: Vec<InjectionPoint>,
    pub(crate) order: usize,
}

impl InterceptorDefinition {
    /// Unique identity of the interceptor
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Bindings a method must carry for this interceptor to apply
    #[inline]
    pub fn bindings(&self) -> &BTreeSet<InterceptorBinding> {
        &self.bindings
    }

    /// Lower priorities run first
    #[inline]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Reference to the callable behavior
    #[inline]
    pub fn behavior(&self) -> &str {
        &self.behavior
    }

    /// Injection points in declaration order
    #[inline]
    pub fn dependencies(&self) -> &[InjectionPoint] {
        &self.dependencies
    }

    /// Position of the interceptor in the type catalog
    #[inline]
    pub fn order(&self) -> usize {
        self.order
    }

    /// Returns `true` if this interceptor applies to a method with the given effective bindings
    #[inline]
    pub fn matches(&self, effective: &BTreeSet<InterceptorBinding>) -> bool {
        !self.bindings.is_empty() && self.bindings.is_subset(effective)
    }
}
