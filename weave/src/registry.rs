//! Bean Registry: normalizes catalog entries into validated definitions

use crate::{
    catalog::{BeanDescriptor, CatalogEntry, InjectionPointDescriptor, InterceptorDescriptor, MarkerDescriptor, TypeCatalog},
    config::DeploymentConfig,
    error::{DefinitionError, DeploymentError, DeploymentErrors},
    model::{BeanDefinition, InjectionPoint, InterceptorBinding, InterceptorDefinition, MethodDefinition, Owner, Qualifier},
};
use indexmap::{IndexMap, IndexSet};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use weave_di::Scope;

/// The deployment-wide set of validated beans and interceptors.
///
/// Both maps iterate in catalog declaration order.
#[derive(Debug, Clone, Default)]
pub struct BeanRegistry {
    beans: IndexMap<String, BeanDefinition>,
    interceptors: IndexMap<String, InterceptorDefinition>,
    excluded: Vec<String>,
}

impl BeanRegistry {
    /// Registers every catalog entry with the default configuration
    #[inline]
    pub fn register(catalog: &TypeCatalog) -> Result<Self, DeploymentErrors> {
        Self::register_with(catalog, &DeploymentConfig::default())
    }

    /// Registers catalog entries, leaving out disabled and excluded ones.
    ///
    /// Every definition error found is collected; if there is any,
    /// the whole registration fails.
    pub fn register_with(catalog: &TypeCatalog, config: &DeploymentConfig) -> Result<Self, DeploymentErrors> {
        let mut registry = Self::default();
        let mut errors = Vec::new();
        let mut seen = HashSet::with_capacity(catalog.len());

        for (order, entry) in catalog.entries().iter().enumerate() {
            if is_excluded(entry, config) {
                registry.excluded.push(entry.id().to_owned());
                continue;
            }

            let id = entry.id();
            if id.trim().is_empty() {
                errors.push(DefinitionError::EmptyId { index: order });
                continue;
            }
            if !seen.insert(id) {
                errors.push(DefinitionError::DuplicateId(id.to_owned()));
                continue;
            }

            match entry {
                CatalogEntry::Bean(bean) => {
                    if let Some(definition) = bean_definition(bean, order, &mut errors) {
                        registry.beans.insert(definition.id.clone(), definition);
                    }
                },
                CatalogEntry::Interceptor(interceptor) => {
                    if let Some(definition) = interceptor_definition(interceptor, order, &mut errors) {
                        registry.interceptors.insert(definition.id.clone(), definition);
                    }
                },
            }
        }

        if !errors.is_empty() {
            #[cfg(feature = "tracing")]
            tracing::debug!(errors = errors.len(), "bean registration failed");

            return Err(errors
                .into_iter()
                .map(DeploymentError::from)
                .collect::<Vec<_>>()
                .into());
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            beans = registry.beans.len(),
            interceptors = registry.interceptors.len(),
            excluded = registry.excluded.len(),
            "beans registered"
        );

        Ok(registry)
    }

    /// Returns a bean by identity
    #[inline]
    pub fn bean(&self, id: &str) -> Option<&BeanDefinition> {
        self.beans.get(id)
    }

    /// Returns an interceptor by identity
    #[inline]
    pub fn interceptor(&self, id: &str) -> Option<&InterceptorDefinition> {
        self.interceptors.get(id)
    }

    /// Beans in declaration order
    #[inline]
    pub fn beans(&self) -> impl ExactSizeIterator<Item = &BeanDefinition> {
        self.beans.values()
    }

    /// Interceptors in declaration order
    #[inline]
    pub fn interceptors(&self) -> impl ExactSizeIterator<Item = &InterceptorDefinition> {
        self.interceptors.values()
    }

    /// Identities of the entries left out of the deployment
    #[inline]
    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }

    /// Position of a bean in [`BeanRegistry::beans`]
    #[inline]
    pub(crate) fn bean_index(&self, id: &str) -> Option<usize> {
        self.beans.get_index_of(id)
    }

    /// Returns the bean at a position in [`BeanRegistry::beans`]
    #[inline]
    pub(crate) fn bean_at(&self, index: usize) -> Option<&BeanDefinition> {
        self.beans.get_index(index).map(|(_, bean)| bean)
    }
}

fn is_excluded(entry: &CatalogEntry, config: &DeploymentConfig) -> bool {
    match entry {
        CatalogEntry::Bean(bean) => !bean.enabled
            || config.is_excluded(&bean.id)
            || config.is_type_excluded(std::iter::once(bean.type_name.as_str())
                .chain(bean.types.iter().map(String::as_str))),
        CatalogEntry::Interceptor(interceptor) => !interceptor.enabled
            || config.is_excluded(&interceptor.id),
    }
}

/// Parses a scope name, ignoring case and surrounding whitespace
pub fn parse_scope(scope: &str) -> Option<Scope> {
    let scope = scope.trim();
    [Scope::Dependent, Scope::Singleton, Scope::Contextual]
        .into_iter()
        .find(|known| known.as_str().eq_ignore_ascii_case(scope))
}

fn bean_definition(bean: &BeanDescriptor, order: usize, errors: &mut Vec<DefinitionError>) -> Option<BeanDefinition> {
    let before = errors.len();

    let scope = parse_scope(&bean.scope);
    if scope.is_none() {
        errors.push(DefinitionError::UnknownScope {
            bean: bean.id.clone(),
            scope: bean.scope.clone()
        });
    }

    let qualifiers = qualifiers(&bean.id, &bean.qualifiers, errors);
    let bindings = bindings(&bean.id, &bean.bindings, errors);
    let dependencies = injection_points(Owner::Bean(bean.id.clone()), &bean.dependencies, errors);

    let mut names = HashSet::with_capacity(bean.methods.len());
    let mut methods = Vec::with_capacity(bean.methods.len());
    for method in &bean.methods {
        if !names.insert(method.name.as_str()) {
            errors.push(DefinitionError::DuplicateMethod {
                bean: bean.id.clone(),
                method: method.name.clone()
            });
            continue;
        }
        methods.push(MethodDefinition {
            name: method.name.clone(),
            bindings: self::bindings(&bean.id, &method.bindings, errors)
        });
    }

    let mut types = IndexSet::with_capacity(bean.types.len() + 1);
    types.insert(bean.type_name.clone());
    types.extend(bean.types.iter().cloned());

    if errors.len() > before {
        return None;
    }

    Some(BeanDefinition {
        id: bean.id.clone(),
        types,
        qualifiers,
        scope: scope?,
        default: bean.default,
        dependencies,
        bindings,
        methods,
        order,
    })
}

fn interceptor_definition(
    interceptor: &InterceptorDescriptor,
    order: usize,
    errors: &mut Vec<DefinitionError>
) -> Option<InterceptorDefinition> {
    let before = errors.len();

    if interceptor.bindings.is_empty() {
        errors.push(DefinitionError::InterceptorWithoutBindings(interceptor.id.clone()));
    }

    let bindings = bindings(&interceptor.id, &interceptor.bindings, errors);
    let dependencies = injection_points(
        Owner::Interceptor(interceptor.id.clone()),
        &interceptor.dependencies,
        errors);

    if errors.len() > before {
        return None;
    }

    Some(InterceptorDefinition {
        id: interceptor.id.clone(),
        bindings,
        priority: interceptor.priority,
        behavior: interceptor.behavior.clone(),
        dependencies,
        order,
    })
}

fn injection_points(
    owner: Owner,
    dependencies: &[InjectionPointDescriptor],
    errors: &mut Vec<DefinitionError>
) -> Vec<InjectionPoint> {
    dependencies
        .iter()
        .enumerate()
        .map(|(index, dependency)| InjectionPoint {
            owner: owner.clone(),
            index,
            name: dependency.name.clone(),
            required_type: dependency.type_name.clone(),
            qualifiers: qualifiers(owner.id(), &dependency.qualifiers, errors),
        })
        .collect()
}

fn qualifiers(owner: &str, markers: &[MarkerDescriptor], errors: &mut Vec<DefinitionError>) -> BTreeSet<Qualifier> {
    markers
        .iter()
        .filter_map(|marker| match attributes(marker) {
            Ok(attributes) => Some(Qualifier::from_parts(marker.name.clone(), attributes)),
            Err(reason) => {
                errors.push(DefinitionError::MalformedQualifier {
                    owner: owner.to_owned(),
                    qualifier: marker.name.clone(),
                    reason
                });
                None
            }
        })
        .collect()
}

fn bindings(owner: &str, markers: &[MarkerDescriptor], errors: &mut Vec<DefinitionError>) -> BTreeSet<InterceptorBinding> {
    markers
        .iter()
        .filter_map(|marker| match attributes(marker) {
            Ok(attributes) => Some(InterceptorBinding::from_parts(marker.name.clone(), attributes)),
            Err(reason) => {
                errors.push(DefinitionError::MalformedBinding {
                    owner: owner.to_owned(),
                    binding: marker.name.clone(),
                    reason
                });
                None
            }
        })
        .collect()
}

fn attributes(marker: &MarkerDescriptor) -> Result<BTreeMap<String, String>, &'static str> {
    if marker.name.trim().is_empty() {
        return Err("empty name");
    }
    let mut attributes = BTreeMap::new();
    for (key, value) in &marker.attributes {
        if key.trim().is_empty() {
            return Err("empty attribute key");
        }
        if attributes.insert(key.clone(), value.clone()).is_some() {
            return Err("repeated attribute key");
        }
    }
    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use crate::catalog::{BeanDescriptor, InjectionPointDescriptor, InterceptorDescriptor, MarkerDescriptor, MethodDescriptor, TypeCatalog};
    use crate::config::DeploymentConfig;
    use crate::error::{DefinitionError, DeploymentError};
    use super::{BeanRegistry, parse_scope};
    use weave_di::Scope;

    fn definition_errors(catalog: &TypeCatalog) -> Vec<DefinitionError> {
        BeanRegistry::register(catalog)
            .unwrap_err()
            .into_iter()
            .map(|err| match err {
                DeploymentError::Definition(err) => err,
                other => panic!("unexpected error: {other}"),
            })
            .collect()
    }

    #[test]
    fn it_parses_scopes_ignoring_case() {
        assert_eq!(parse_scope("Singleton"), Some(Scope::Singleton));
        assert_eq!(parse_scope(" contextual "), Some(Scope::Contextual));
        assert_eq!(parse_scope("DEPENDENT"), Some(Scope::Dependent));
        assert_eq!(parse_scope("request"), None);
    }

    #[test]
    fn it_registers_in_declaration_order() {
        let catalog = TypeCatalog::builder()
            .bean(BeanDescriptor::new("b", "B").implements("Service"))
            .interceptor(InterceptorDescriptor::new("log", "log").binding(MarkerDescriptor::new("Logged")))
            .bean(BeanDescriptor::new("a", "A").scope("singleton"))
            .build();

        let registry = BeanRegistry::register(&catalog).unwrap();

        let ids: Vec<_> = registry.beans().map(|bean| bean.id()).collect();
        assert_eq!(ids, ["b", "a"]);
        assert_eq!(registry.bean("a").unwrap().order(), 2);
        assert_eq!(registry.bean("a").unwrap().scope(), Scope::Singleton);
        assert!(registry.bean("b").unwrap().is_assignable_to("Service"));
        assert!(registry.bean("b").unwrap().is_assignable_to("B"));
        assert_eq!(registry.interceptor("log").unwrap().order(), 1);
    }

    #[test]
    fn it_collects_every_definition_error() {
        let catalog = TypeCatalog::builder()
            .bean(BeanDescriptor::new("a", "A").scope("session"))
            .bean(BeanDescriptor::new("a", "A"))
            .bean(BeanDescriptor::new(" ", "Blank"))
            .bean(BeanDescriptor::new("q", "Q").qualifier(MarkerDescriptor::new("Named").with("value", "x").with("value", "y")))
            .bean(BeanDescriptor::new("m", "M")
                .method(MethodDescriptor::new("run"))
                .method(MethodDescriptor::new("run").binding(MarkerDescriptor::new(""))))
            .interceptor(InterceptorDescriptor::new("i", "noop"))
            .build();

        let errors = definition_errors(&catalog);

        assert_eq!(errors, [
            DefinitionError::UnknownScope { bean: "a".into(), scope: "session".into() },
            DefinitionError::DuplicateId("a".into()),
            DefinitionError::EmptyId { index: 2 },
            DefinitionError::MalformedQualifier { owner: "q".into(), qualifier: "Named".into(), reason: "repeated attribute key" },
            DefinitionError::DuplicateMethod { bean: "m".into(), method: "run".into() },
            DefinitionError::InterceptorWithoutBindings("i".into()),
        ]);
    }

    #[test]
    fn it_rejects_malformed_injection_point_qualifier() {
        let catalog = TypeCatalog::builder()
            .bean(BeanDescriptor::new("a", "A")
                .depends_on(InjectionPointDescriptor::new("B").qualified(MarkerDescriptor::new("Named").with("", "b"))))
            .build();

        let errors = definition_errors(&catalog);

        assert_eq!(errors, [
            DefinitionError::MalformedQualifier { owner: "a".into(), qualifier: "Named".into(), reason: "empty attribute key" },
        ]);
    }

    #[test]
    fn it_rejects_malformed_binding() {
        let catalog = TypeCatalog::builder()
            .interceptor(InterceptorDescriptor::new("i", "noop").binding(MarkerDescriptor::new("  ")))
            .build();

        let errors = definition_errors(&catalog);

        assert_eq!(errors, [
            DefinitionError::MalformedBinding { owner: "i".into(), binding: "  ".into(), reason: "empty name" },
        ]);
    }

    #[test]
    fn it_leaves_out_disabled_and_excluded_entries() {
        let catalog = TypeCatalog::builder()
            .bean(BeanDescriptor::new("off", "Off").disabled())
            .bean(BeanDescriptor::new("mock", "MockGateway").implements("Gateway"))
            .bean(BeanDescriptor::new("legacy", "Legacy"))
            .bean(BeanDescriptor::new("real", "RealGateway").implements("Gateway"))
            .interceptor(InterceptorDescriptor::new("audit", "audit").binding(MarkerDescriptor::new("Audited")))
            .build();
        let config = DeploymentConfig::new()
            .exclude("legacy")
            .exclude("audit")
            .exclude_type("MockGateway");

        let registry = BeanRegistry::register_with(&catalog, &config).unwrap();

        let ids: Vec<_> = registry.beans().map(|bean| bean.id()).collect();
        assert_eq!(ids, ["real"]);
        assert_eq!(registry.interceptors().len(), 0);
        assert_eq!(registry.excluded(), ["off", "mock", "legacy", "audit"]);
    }

    #[test]
    fn it_does_not_validate_excluded_entries() {
        let catalog = TypeCatalog::builder()
            .bean(BeanDescriptor::new("broken", "Broken").scope("nonsense").disabled())
            .build();

        assert!(BeanRegistry::register(&catalog).is_ok());
    }
}
