//! Dependency Injection container and tools

use crate::{
    dispatch::{DispatchTable, MethodBody, MethodDispatch},
    error::{Error, Key},
    invocation::{Arguments, Interceptor, InvocationContext, Value},
    proxy::{BeanRef, ClientProxy},
};
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::{
    any::{Any, type_name},
    cell::RefCell,
    collections::HashMap,
    fmt::{self, Debug, Display},
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering}
    }
};

pub use self::{
    context::{ActiveContext, ContextHandle},
    dependencies::Dependencies,
    factory::GenericFactory,
    from_dependencies::{FromDependencies, FromDependency},
};

pub mod context;
pub mod dependencies;
pub mod factory;
pub mod from_dependencies;

/// A type-erased, shared bean instance
pub type Instance = Arc<
    dyn Any
    + Send
    + Sync
>;

type FactoryFn = Arc<
    dyn Fn(Dependencies) -> Result<Instance, Error>
    + Send
    + Sync
>;

type InterceptorFactoryFn = Arc<
    dyn Fn(Dependencies) -> Result<Arc<dyn Interceptor>, Error>
    + Send
    + Sync
>;

/// A create-if-absent slot; a failed construction leaves it empty
type Cached<T> = OnceCell<T>;

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static UNDER_CONSTRUCTION: RefCell<Vec<(u64, Key)>> = const { RefCell::new(Vec::new()) };
}

/// Lifecycle policy of a bean
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// A new instance per injection or lookup
    Dependent,
    /// One instance per container, created on first access
    Singleton,
    /// One instance per active context, accessed through a client proxy
    Contextual,
}

impl Scope {
    /// Returns the lower-case scope name
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Dependent => "dependent",
            Scope::Singleton => "singleton",
            Scope::Contextual => "contextual",
        }
    }

    /// Returns `true` for the scope whose instances live in a context
    #[inline]
    pub fn is_contextual(&self) -> bool {
        matches!(self, Scope::Contextual)
    }
}

impl Display for Scope {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) struct BeanEntry {
    pub(crate) key: Key,
    pub(crate) scope: Scope,
    dependencies: Arc<[Key]>,
    factory: FactoryFn,
    singleton: Cached<Instance>,
}

impl Debug for BeanEntry {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanEntry")
            .field("key", &self.key)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// A declared interceptor whose instance is created once, on its first invocation
pub struct InterceptorEntry {
    pub(crate) key: Key,
    behavior: Key,
    dependencies: Arc<[Key]>,
    factory: InterceptorFactoryFn,
    instance: Cached<Arc<dyn Interceptor>>,
}

impl Debug for InterceptorEntry {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorEntry")
            .field("key", &self.key)
            .field("behavior", &self.behavior)
            .finish_non_exhaustive()
    }
}

impl InterceptorEntry {
    /// Key of the interceptor
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Key of the behavior the interceptor runs
    #[inline]
    pub fn behavior(&self) -> &str {
        &self.behavior
    }

    /// Returns the interceptor instance, creating it on the first invocation
    pub(crate) fn instance(&self, container: &Container) -> Result<Arc<dyn Interceptor>, Error> {
        if let Some(instance) = self.instance.get() {
            return Ok(instance.clone());
        }

        let _guard = ConstructionGuard::enter(container.inner.id, &self.key)?;
        self.instance
            .get_or_try_init(|| {
                let deps = Dependencies::new(container.clone(), self.key.clone(), self.dependencies.clone());
                (self.factory)(deps)
            })
            .cloned()
    }
}

/// Marks a bean as being constructed on the current thread,
/// so re-entrant construction fails instead of recursing.
struct ConstructionGuard;

impl ConstructionGuard {
    fn enter(container: u64, key: &Key) -> Result<Self, Error> {
        UNDER_CONSTRUCTION.with_borrow_mut(|stack| {
            if stack.iter().any(|(id, k)| *id == container && k == key) {
                return Err(Error::CircularDependency(key.clone()));
            }
            stack.push((container, key.clone()));
            Ok(Self)
        })
    }
}

impl Drop for ConstructionGuard {
    #[inline]
    fn drop(&mut self) {
        UNDER_CONSTRUCTION.with_borrow_mut(|stack| { stack.pop(); });
    }
}

#[inline]
fn make_factory_fn<T, F, Args>(factory: F) -> FactoryFn
where
    T: Send + Sync + 'static,
    F: GenericFactory<Args, Output = T>,
    Args: FromDependencies
{
    Arc::new(move |deps: Dependencies| -> Result<Instance, Error> {
        let args = Args::from_dependencies(&deps)?;
        factory.call(args).map(|t| Arc::new(t) as Instance)
    })
}

#[inline]
fn make_interceptor_fn<I, F, Args>(factory: F) -> InterceptorFactoryFn
where
    I: Interceptor + 'static,
    F: GenericFactory<Args, Output = I>,
    Args: FromDependencies
{
    Arc::new(move |deps: Dependencies| -> Result<Arc<dyn Interceptor>, Error> {
        let args = Args::from_dependencies(&deps)?;
        factory.call(args).map(|i| Arc::new(i) as Arc<dyn Interceptor>)
    })
}

#[derive(Debug)]
struct BeanDeclaration {
    scope: Scope,
    dependencies: Vec<Key>,
}

#[derive(Debug)]
struct InterceptorDeclaration {
    behavior: Key,
    dependencies: Vec<Key>,
}

/// Represents a DI container builder.
///
/// Declarations describe the wiring (scopes, resolved dependencies, per-method
/// interceptor chains) and normally come from a validated deployment.
/// Registrations supply the callables behind them: bean factories,
/// method bodies and interceptor behaviors.
#[derive(Default)]
pub struct ContainerBuilder {
    beans: IndexMap<Key, BeanDeclaration>,
    factories: IndexMap<Key, FactoryFn>,
    interceptors: IndexMap<Key, InterceptorDeclaration>,
    behaviors: IndexMap<Key, InterceptorFactoryFn>,
    methods: IndexMap<Key, Vec<Key>>,
    bodies: IndexMap<Key, IndexMap<Key, MethodBody>>,
    chains: IndexMap<Key, IndexMap<Key, Vec<Key>>>,
}

impl Debug for ContainerBuilder {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("beans", &self.beans)
            .field("interceptors", &self.interceptors)
            .finish_non_exhaustive()
    }
}

impl ContainerBuilder {
    /// Creates a new DI container builder
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a bean with its scope and the keys of the beans
    /// its injection points resolved to, in injection point order
    pub fn declare_bean<I, K>(&mut self, key: impl Into<Key>, scope: Scope, dependencies: I) -> &mut Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>
    {
        let declaration = BeanDeclaration {
            scope,
            dependencies: dependencies.into_iter().map(Into::into).collect()
        };
        self.beans.insert(key.into(), declaration);
        self
    }

    /// Declares an interceptor, the behavior it runs and its resolved dependencies
    pub fn declare_interceptor<I, K>(
        &mut self,
        key: impl Into<Key>,
        behavior: impl Into<Key>,
        dependencies: I
    ) -> &mut Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>
    {
        let declaration = InterceptorDeclaration {
            behavior: behavior.into(),
            dependencies: dependencies.into_iter().map(Into::into).collect()
        };
        self.interceptors.insert(key.into(), declaration);
        self
    }

    /// Declares a method of a bean that must have a body registered
    pub fn declare_method(&mut self, bean: impl Into<Key>, method: impl Into<Key>) -> &mut Self {
        let methods = self.methods.entry(bean.into()).or_default();
        let method = method.into();
        if !methods.contains(&method) {
            methods.push(method);
        }
        self
    }

    /// Declares the ordered interceptor chain of a method.
    ///
    /// The first interceptor wraps the second and so on down to the method body.
    pub fn declare_chain<I, K>(&mut self, bean: impl Into<Key>, method: impl Into<Key>, chain: I) -> &mut Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>
    {
        let bean = bean.into();
        let method = method.into();
        self.declare_method(bean.clone(), method.clone());
        self.chains
            .entry(bean)
            .or_default()
            .insert(method, chain.into_iter().map(Into::into).collect());
        self
    }

    /// Registers the factory of a declared bean.
    ///
    /// The factory parameters are extracted from the bean's dependencies by position:
    /// the first parameter from the first injection point and so on.
    /// A contextual dependency must be taken as [`ClientProxy`]; taking it as `Arc<T>`
    /// fails with [`Error::ProxyRequired`].
    pub fn factory<T, F, Args>(&mut self, key: impl Into<Key>, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: GenericFactory<Args, Output = T>,
        Args: FromDependencies
    {
        self.factories.insert(key.into(), make_factory_fn(factory));
        self
    }

    /// Declares a bean and registers its factory at once
    pub fn register<T, F, Args, I, K>(
        &mut self,
        key: impl Into<Key>,
        scope: Scope,
        dependencies: I,
        factory: F
    ) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: GenericFactory<Args, Output = T>,
        Args: FromDependencies,
        I: IntoIterator<Item = K>,
        K: Into<Key>
    {
        let key = key.into();
        self.declare_bean(key.clone(), scope, dependencies);
        self.factory(key, factory)
    }

    /// Registers a singleton bean without dependencies
    pub fn register_singleton<T, F>(&mut self, key: impl Into<Key>, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: GenericFactory<(), Output = T>
    {
        self.register(key, Scope::Singleton, Vec::<Key>::new(), factory)
    }

    /// Registers a contextual bean without dependencies
    pub fn register_contextual<T, F>(&mut self, key: impl Into<Key>, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: GenericFactory<(), Output = T>
    {
        self.register(key, Scope::Contextual, Vec::<Key>::new(), factory)
    }

    /// Registers a dependent bean without dependencies
    pub fn register_dependent<T, F>(&mut self, key: impl Into<Key>, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: GenericFactory<(), Output = T>
    {
        self.register(key, Scope::Dependent, Vec::<Key>::new(), factory)
    }

    /// Registers the body of a bean method.
    ///
    /// The body receives the bean instance downcast to `T` and the call arguments.
    pub fn method<T, F>(&mut self, bean: impl Into<Key>, method: impl Into<Key>, body: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T, &Arguments) -> Result<Value, Error> + Send + Sync + 'static
    {
        let body: MethodBody = Arc::new(move |target: &Instance, args: &Arguments| {
            let target = target
                .downcast_ref::<T>()
                .ok_or(Error::ResolveFailed(type_name::<T>()))?;
            body(target, args)
        });
        self.bodies
            .entry(bean.into())
            .or_default()
            .insert(method.into(), body);
        self
    }

    /// Registers an interceptor behavior created by a factory.
    ///
    /// Factory parameters are extracted from the dependencies
    /// of the interceptor that references this behavior.
    pub fn interceptor<I, F, Args>(&mut self, behavior: impl Into<Key>, factory: F) -> &mut Self
    where
        I: Interceptor + 'static,
        F: GenericFactory<Args, Output = I>,
        Args: FromDependencies
    {
        self.behaviors.insert(behavior.into(), make_interceptor_fn(factory));
        self
    }

    /// Registers a stateless interceptor behavior
    pub fn interceptor_fn<F>(&mut self, behavior: impl Into<Key>, interceptor: F) -> &mut Self
    where
        F: Fn(&mut InvocationContext) -> Result<Value, Error> + Clone + Send + Sync + 'static
    {
        self.interceptor(behavior, move || interceptor.clone())
    }

    /// Builds a DI container, validating that every declaration has its callable.
    ///
    /// Declarations are checked in the order they were made,
    /// so the first missing registration is always the one reported.
    pub fn build(self) -> Result<Container, Error> {
        let Self { beans, mut factories, interceptors, behaviors, methods, mut bodies, chains } = self;

        let mut bean_entries = HashMap::with_capacity(beans.len());
        for (key, declaration) in &beans {
            let factory = factories
                .shift_remove(key)
                .ok_or_else(|| Error::NotRegistered("factory", key.clone()))?;
            let entry = BeanEntry {
                key: key.clone(),
                scope: declaration.scope,
                dependencies: declaration.dependencies.as_slice().into(),
                factory,
                singleton: OnceCell::new(),
            };
            bean_entries.insert(key.clone(), Arc::new(entry));
        }

        if let Some(key) = factories.keys().next() {
            return Err(Error::NotRegistered("bean", key.clone()));
        }

        for declaration in beans.values() {
            if let Some(dep) = declaration.dependencies.iter().find(|dep| !beans.contains_key(*dep)) {
                return Err(Error::NotRegistered("bean", dep.clone()));
            }
        }

        let mut interceptor_entries = HashMap::with_capacity(interceptors.len());
        for (key, declaration) in interceptors {
            if let Some(dep) = declaration.dependencies.iter().find(|dep| !bean_entries.contains_key(*dep)) {
                return Err(Error::NotRegistered("bean", dep.clone()));
            }
            let factory = match behaviors.get(&declaration.behavior) {
                Some(factory) => factory.clone(),
                None => return Err(Error::NotRegistered("interceptor behavior", declaration.behavior)),
            };
            let entry = InterceptorEntry {
                key: key.clone(),
                behavior: declaration.behavior,
                dependencies: declaration.dependencies.into(),
                factory,
                instance: OnceCell::new(),
            };
            interceptor_entries.insert(key, Arc::new(entry));
        }

        let mut dispatch = DispatchTable::default();
        for (bean, method_names) in &methods {
            if !bean_entries.contains_key(bean) {
                return Err(Error::NotRegistered("bean", bean.clone()));
            }
            for method in method_names {
                let found = bodies.get(bean).is_some_and(|b| b.contains_key(method));
                if !found {
                    return Err(Error::NotRegistered("method", qualified(bean, method)));
                }
            }
        }

        for (bean, bean_bodies) in bodies.drain(..) {
            if !bean_entries.contains_key(&bean) {
                return Err(Error::NotRegistered("bean", bean));
            }
            let bean_chains = chains.get(&bean);
            for (method, body) in bean_bodies {
                let chain = bean_chains
                    .and_then(|c| c.get(&method))
                    .filter(|c| !c.is_empty());
                let target = match chain {
                    None => MethodDispatch::PassThrough(body),
                    Some(chain) => {
                        let links = chain
                            .iter()
                            .map(|key| interceptor_entries
                                .get(key)
                                .cloned()
                                .ok_or_else(|| Error::NotRegistered("interceptor", key.clone())))
                            .collect::<Result<Arc<[_]>, _>>()?;
                        MethodDispatch::Intercepted { chain: links, body }
                    }
                };
                dispatch.insert(bean.clone(), method, target);
            }
        }

        let id = NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            container = id,
            beans = bean_entries.len(),
            interceptors = interceptor_entries.len(),
            "container built"
        );

        Ok(Container {
            inner: Arc::new(Inner {
                id,
                beans: bean_entries,
                interceptors: interceptor_entries,
                dispatch,
                next_context: AtomicU64::new(1),
            })
        })
    }
}

#[inline]
fn qualified(bean: &str, method: &str) -> Key {
    format!("{bean}::{method}").into()
}

pub(crate) struct Inner {
    id: u64,
    beans: HashMap<Key, Arc<BeanEntry>>,
    interceptors: HashMap<Key, Arc<InterceptorEntry>>,
    dispatch: DispatchTable,
    next_context: AtomicU64,
}

/// Represents a DI container, that is able to resolve beans by key
/// and to invoke their methods through the frozen dispatch table
#[derive(Clone)]
pub struct Container {
    inner: Arc<Inner>
}

impl Debug for Container {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.inner.id)
            .field("beans", &self.inner.beans.len())
            .field("interceptors", &self.inner.interceptors.len())
            .finish()
    }
}

impl Container {
    /// Creates a new DI container builder
    #[inline]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    #[inline]
    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    #[inline]
    pub(crate) fn downgrade(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    /// Unique identity of this container within the process
    #[inline]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Returns the scope of a bean, if it is registered
    #[inline]
    pub fn scope_of(&self, key: &str) -> Option<Scope> {
        self.inner.beans.get(key).map(|entry| entry.scope)
    }

    /// Returns the frozen dispatch table
    #[inline]
    pub fn dispatch_table(&self) -> &DispatchTable {
        &self.inner.dispatch
    }

    /// Creates a new context for contextual beans.
    ///
    /// Instances are created lazily the first time a bean is accessed
    /// while the context is active and destroyed when it ends.
    pub fn create_context(&self) -> ContextHandle {
        let id = self.inner.next_context.fetch_add(1, Ordering::Relaxed);
        ContextHandle::new(self.inner.id, id)
    }

    /// Resolves a bean and returns a shared pointer
    #[inline]
    pub fn resolve<T: Send + Sync + 'static>(&self, key: &str) -> Result<Arc<T>, Error> {
        self.instance(key).and_then(downcast_instance)
    }

    /// Resolves a bean as a type-erased instance, honoring its scope
    pub fn instance(&self, key: &str) -> Result<Instance, Error> {
        let entry = self.bean_entry(key)?;
        self.resolve_entry(entry)
    }

    /// Resolves a bean and binds it to its dispatch table entries
    #[inline]
    pub fn get(&self, key: &str) -> Result<BeanRef, Error> {
        let entry = self.bean_entry(key)?;
        let target = self.resolve_entry(entry)?;
        Ok(BeanRef::new(self.clone(), entry.key.clone(), target))
    }

    /// Returns a client proxy that looks up the current-context instance on every call
    pub fn proxy(&self, key: &str) -> Result<ClientProxy, Error> {
        let entry = self.bean_entry(key)?;
        if !entry.scope.is_contextual() {
            return Err(Error::NotContextual(entry.key.clone()));
        }
        Ok(ClientProxy::new(self.downgrade(), entry.key.clone()))
    }

    /// Resolves a bean and invokes one of its methods.
    ///
    /// Contextual beans are looked up in the context active on this thread.
    pub fn invoke(&self, key: &str, method: &str, args: impl Into<Arguments>) -> Result<Value, Error> {
        let entry = self.bean_entry(key)?;
        let target = self.resolve_entry(entry)?;
        self.dispatch(&entry.key, target, method, args.into())
    }

    #[inline]
    fn bean_entry(&self, key: &str) -> Result<&Arc<BeanEntry>, Error> {
        self.inner.beans
            .get(key)
            .ok_or_else(|| Error::NotRegistered("bean", key.into()))
    }

    fn resolve_entry(&self, entry: &BeanEntry) -> Result<Instance, Error> {
        match entry.scope {
            Scope::Dependent => {
                let _guard = ConstructionGuard::enter(self.inner.id, &entry.key)?;
                self.construct(entry)
            },
            Scope::Singleton => self.resolve_cached(&entry.singleton, entry),
            Scope::Contextual => self.resolve_contextual(entry),
        }
    }

    #[inline]
    fn resolve_cached(&self, cell: &Cached<Instance>, entry: &BeanEntry) -> Result<Instance, Error> {
        if let Some(instance) = cell.get() {
            return Ok(instance.clone());
        }
        let _guard = ConstructionGuard::enter(self.inner.id, &entry.key)?;
        cell.get_or_try_init(|| self.construct(entry)).cloned()
    }

    fn resolve_contextual(&self, entry: &BeanEntry) -> Result<Instance, Error> {
        let context = context::current(self.inner.id)
            .ok_or_else(|| Error::ResolutionAtRuntime {
                bean: entry.key.clone(),
                reason: "no active context"
            })?;
        let slot = context.slot(&entry.key)?;
        self.resolve_cached(&slot, entry)
    }

    #[inline]
    fn construct(&self, entry: &BeanEntry) -> Result<Instance, Error> {
        let deps = Dependencies::new(self.clone(), entry.key.clone(), entry.dependencies.clone());
        (entry.factory)(deps)
    }

    pub(crate) fn dispatch(&self, bean: &Key, target: Instance, method: &str, args: Arguments) -> Result<Value, Error> {
        let dispatch = self.inner.dispatch
            .get(bean, method)
            .ok_or_else(|| Error::NotRegistered("method", qualified(bean, method)))?;
        match dispatch {
            MethodDispatch::PassThrough(body) => body(&target, &args),
            MethodDispatch::Intercepted { chain, body } => {
                let ctx = InvocationContext::new(
                    self.clone(),
                    bean.clone(),
                    method.into(),
                    target,
                    args,
                    chain.clone(),
                    body.clone());
                ctx.start()
            }
        }
    }
}

#[inline]
pub(crate) fn downcast_instance<T: Send + Sync + 'static>(instance: Instance) -> Result<Arc<T>, Error> {
    instance
        .downcast::<T>()
        .map_err(|_| Error::ResolveFailed(type_name::<T>()))
}
