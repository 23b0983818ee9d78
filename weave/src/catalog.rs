//! Type catalog: the declared components handed over by a discovery step.
//!
//! The position of an entry in the catalog is its declaration order.
//! Every tie-break in the build phase (default candidates, interceptors of
//! equal priority, reporting order) is decided by that position, so a
//! discovery step must hand over entries in a stable order.

use serde::{Deserialize, Serialize};

#[inline]
fn enabled() -> bool {
    true
}

/// A qualifier or interceptor binding as declared, before validation
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MarkerDescriptor {
    /// Name of the marker
    pub name: String,
    /// Attribute pairs in declaration order
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
}

impl MarkerDescriptor {
    /// Creates a marker without attributes
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), attributes: Vec::new() }
    }

    /// Adds an attribute
    #[inline]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }
}

/// A declared dependency
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InjectionPointDescriptor {
    /// Optional name used in diagnostics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Required type
    #[serde(rename = "type")]
    pub type_name: String,
    /// Required qualifiers
    #[serde(default)]
    pub qualifiers: Vec<MarkerDescriptor>,
}

impl InjectionPointDescriptor {
    /// Creates a dependency on a type
    #[inline]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self { type_name: type_name.into(), ..Self::default() }
    }

    /// Names the dependency
    #[inline]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Requires a qualifier
    #[inline]
    pub fn qualified(mut self, qualifier: MarkerDescriptor) -> Self {
        self.qualifiers.push(qualifier);
        self
    }
}

/// A declared bean method
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MethodDescriptor {
    /// Name of the method
    pub name: String,
    /// Method-level interceptor bindings
    #[serde(default)]
    pub bindings: Vec<MarkerDescriptor>,
}

impl MethodDescriptor {
    /// Creates a method without bindings
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), bindings: Vec::new() }
    }

    /// Adds a method-level binding
    #[inline]
    pub fn binding(mut self, binding: MarkerDescriptor) -> Self {
        self.bindings.push(binding);
        self
    }
}

/// A declared bean
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeanDescriptor {
    /// Unique identity
    pub id: String,
    /// Implementation type
    #[serde(rename = "type")]
    pub type_name: String,
    /// Supertypes and capabilities the bean can be injected as
    #[serde(default)]
    pub types: Vec<String>,
    /// Qualifiers
    #[serde(default)]
    pub qualifiers: Vec<MarkerDescriptor>,
    /// Scope name, one of `dependent`, `singleton` or `contextual`
    pub scope: String,
    /// Marks the bean as the tie-breaking default among ambiguous candidates
    #[serde(default)]
    pub default: bool,
    /// Dependencies in injection order
    #[serde(default)]
    pub dependencies: Vec<InjectionPointDescriptor>,
    /// Class-level interceptor bindings
    #[serde(default)]
    pub bindings: Vec<MarkerDescriptor>,
    /// Methods in declaration order
    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,
    /// Disabled beans are left out of the deployment
    #[serde(default = "enabled")]
    pub enabled: bool,
}

impl BeanDescriptor {
    /// Creates a dependent bean
    pub fn new(id: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            types: Vec::new(),
            qualifiers: Vec::new(),
            scope: String::from("dependent"),
            default: false,
            dependencies: Vec::new(),
            bindings: Vec::new(),
            methods: Vec::new(),
            enabled: true,
        }
    }

    /// Sets the scope name
    #[inline]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Adds a supertype or capability
    #[inline]
    pub fn implements(mut self, type_name: impl Into<String>) -> Self {
        self.types.push(type_name.into());
        self
    }

    /// Adds a qualifier
    #[inline]
    pub fn qualifier(mut self, qualifier: MarkerDescriptor) -> Self {
        self.qualifiers.push(qualifier);
        self
    }

    /// Marks the bean as the default among ambiguous candidates
    #[inline]
    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }

    /// Adds a dependency
    #[inline]
    pub fn depends_on(mut self, dependency: InjectionPointDescriptor) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Adds an unqualified dependency on a type
    #[inline]
    pub fn inject(self, type_name: impl Into<String>) -> Self {
        self.depends_on(InjectionPointDescriptor::new(type_name))
    }

    /// Adds a class-level binding
    #[inline]
    pub fn binding(mut self, binding: MarkerDescriptor) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Adds a method
    #[inline]
    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    /// Leaves the bean out of the deployment
    #[inline]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// A declared interceptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptorDescriptor {
    /// Unique identity
    pub id: String,
    /// Bindings a method must carry for this interceptor to apply
    #[serde(default)]
    pub bindings: Vec<MarkerDescriptor>,
    /// Lower priorities run first
    #[serde(default)]
    pub priority: i32,
    /// Reference to the callable behavior
    pub behavior: String,
    /// Dependencies in injection order
    #[serde(default)]
    pub dependencies: Vec<InjectionPointDescriptor>,
    /// Disabled interceptors are left out of the deployment
    #[serde(default = "enabled")]
    pub enabled: bool,
}

impl InterceptorDescriptor {
    /// Creates an interceptor with priority `0`
    pub fn new(id: impl Into<String>, behavior: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            bindings: Vec::new(),
            priority: 0,
            behavior: behavior.into(),
            dependencies: Vec::new(),
            enabled: true,
        }
    }

    /// Adds a binding
    #[inline]
    pub fn binding(mut self, binding: MarkerDescriptor) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Sets the priority
    #[inline]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Adds a dependency
    #[inline]
    pub fn depends_on(mut self, dependency: InjectionPointDescriptor) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Adds an unqualified dependency on a type
    #[inline]
    pub fn inject(self, type_name: impl Into<String>) -> Self {
        self.depends_on(InjectionPointDescriptor::new(type_name))
    }

    /// Leaves the interceptor out of the deployment
    #[inline]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// One declared component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CatalogEntry {
    /// A bean
    Bean(BeanDescriptor),
    /// An interceptor
    Interceptor(InterceptorDescriptor),
}

impl CatalogEntry {
    /// Identity of the declared component
    #[inline]
    pub fn id(&self) -> &str {
        match self {
            CatalogEntry::Bean(bean) => &bean.id,
            CatalogEntry::Interceptor(interceptor) => &interceptor.id,
        }
    }
}

impl From<BeanDescriptor> for CatalogEntry {
    #[inline]
    fn from(bean: BeanDescriptor) -> Self {
        CatalogEntry::Bean(bean)
    }
}

impl From<InterceptorDescriptor> for CatalogEntry {
    #[inline]
    fn from(interceptor: InterceptorDescriptor) -> Self {
        CatalogEntry::Interceptor(interceptor)
    }
}

/// The ordered list of declared components
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeCatalog {
    entries: Vec<CatalogEntry>,
}

impl FromIterator<CatalogEntry> for TypeCatalog {
    #[inline]
    fn from_iter<I: IntoIterator<Item = CatalogEntry>>(iter: I) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

impl TypeCatalog {
    /// Creates a catalog builder
    #[inline]
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// Entries in declaration order
    #[inline]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Number of entries
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the catalog declares nothing
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds a [`TypeCatalog`] in declaration order
///
/// # Example
/// ```no_run
/// use weave::catalog::{TypeCatalog, BeanDescriptor};
///
/// let catalog = TypeCatalog::builder()
///     .bean(BeanDescriptor::new("bar", "Bar").scope("singleton"))
///     .bean(BeanDescriptor::new("foo", "Foo").inject("Bar"))
///     .build();
///
/// assert_eq!(catalog.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    entries: Vec<CatalogEntry>,
}

impl CatalogBuilder {
    /// Declares a bean
    #[inline]
    pub fn bean(mut self, bean: BeanDescriptor) -> Self {
        self.entries.push(CatalogEntry::Bean(bean));
        self
    }

    /// Declares an interceptor
    #[inline]
    pub fn interceptor(mut self, interceptor: InterceptorDescriptor) -> Self {
        self.entries.push(CatalogEntry::Interceptor(interceptor));
        self
    }

    /// Builds the catalog
    #[inline]
    pub fn build(self) -> TypeCatalog {
        TypeCatalog { entries: self.entries }
    }
}
