//! Build-time error taxonomy

use crate::model::InjectionPoint;
use std::{
    error::Error as StdError,
    fmt::{self, Display, Formatter}
};

/// A structurally invalid declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    /// A catalog entry has an empty identity
    EmptyId {
        /// Position of the entry in the catalog
        index: usize
    },
    /// Two catalog entries share an identity
    DuplicateId(String),
    /// A bean declares a scope outside of `dependent`, `singleton` and `contextual`
    UnknownScope {
        /// Identity of the bean
        bean: String,
        /// The declared scope
        scope: String
    },
    /// A qualifier has an empty name, an empty attribute key or a repeated attribute key
    MalformedQualifier {
        /// Identity of the declaring bean or interceptor
        owner: String,
        /// Name of the qualifier
        qualifier: String,
        /// What is wrong with it
        reason: &'static str
    },
    /// An interceptor binding has an empty name, an empty attribute key or a repeated attribute key
    MalformedBinding {
        /// Identity of the declaring bean or interceptor
        owner: String,
        /// Name of the binding
        binding: String,
        /// What is wrong with it
        reason: &'static str
    },
    /// A bean declares two methods with the same name
    DuplicateMethod {
        /// Identity of the bean
        bean: String,
        /// Name of the method
        method: String
    },
    /// An interceptor declares no binding, so no method could ever match it
    InterceptorWithoutBindings(String),
}

impl Display for DefinitionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DefinitionError::EmptyId { index } => write!(f, "Definition Error: catalog entry #{index} has an empty id"),
            DefinitionError::DuplicateId(id) => write!(f, "Definition Error: duplicate id `{id}`"),
            DefinitionError::UnknownScope { bean, scope } => write!(f, "Definition Error: bean `{bean}` declares unknown scope `{scope}`"),
            DefinitionError::MalformedQualifier { owner, qualifier, reason } => write!(f, "Definition Error: `{owner}` declares malformed qualifier `{qualifier}`: {reason}"),
            DefinitionError::MalformedBinding { owner, binding, reason } => write!(f, "Definition Error: `{owner}` declares malformed binding `{binding}`: {reason}"),
            DefinitionError::DuplicateMethod { bean, method } => write!(f, "Definition Error: bean `{bean}` declares method `{method}` more than once"),
            DefinitionError::InterceptorWithoutBindings(id) => write!(f, "Definition Error: interceptor `{id}` declares no bindings"),
        }
    }
}

impl StdError for DefinitionError {}

/// A failure that prevents a deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentError {
    /// A structurally invalid declaration
    Definition(DefinitionError),
    /// An injection point matches no bean
    UnsatisfiedResolution(InjectionPoint),
    /// An injection point matches several beans and none of them is a default
    AmbiguousResolution {
        /// The injection point
        point: InjectionPoint,
        /// Identities of the candidates in declaration order
        candidates: Vec<String>
    },
    /// A cycle runs through at least one bean that is not contextual
    CircularDependency {
        /// Identities along the cycle, starting and ending with the same bean
        path: Vec<String>
    },
}

impl Display for DeploymentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentError::Definition(err) => err.fmt(f),
            DeploymentError::UnsatisfiedResolution(point) => write!(f, "Unsatisfied Resolution: no bean matches {point}"),
            DeploymentError::AmbiguousResolution { point, candidates } => write!(f, "Ambiguous Resolution: {point} matches [{}]", candidates.join(", ")),
            DeploymentError::CircularDependency { path } => write!(f, "Circular Dependency: {}", path.join(" -> ")),
        }
    }
}

impl StdError for DeploymentError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            DeploymentError::Definition(err) => Some(err),
            _ => None
        }
    }
}

impl From<DefinitionError> for DeploymentError {
    #[inline]
    fn from(err: DefinitionError) -> Self {
        Self::Definition(err)
    }
}

impl DeploymentError {
    /// Returns `true` if this error is a circular dependency
    #[inline]
    pub fn is_circular(&self) -> bool {
        matches!(self, DeploymentError::CircularDependency { .. })
    }

    /// Returns `true` if this error is an ambiguous resolution
    #[inline]
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, DeploymentError::AmbiguousResolution { .. })
    }

    /// Returns `true` if this error is an unsatisfied resolution
    #[inline]
    pub fn is_unsatisfied(&self) -> bool {
        matches!(self, DeploymentError::UnsatisfiedResolution(_))
    }
}

/// Every independent failure found in one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentErrors {
    errors: Vec<DeploymentError>
}

impl Display for DeploymentErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "deployment failed with {} error(s)", self.errors.len())?;
        for err in &self.errors {
            write!(f, "\n  - {err}")?;
        }
        Ok(())
    }
}

impl StdError for DeploymentErrors {}

impl From<Vec<DeploymentError>> for DeploymentErrors {
    #[inline]
    fn from(errors: Vec<DeploymentError>) -> Self {
        Self { errors }
    }
}

impl From<DeploymentError> for DeploymentErrors {
    #[inline]
    fn from(err: DeploymentError) -> Self {
        Self { errors: vec![err] }
    }
}

impl IntoIterator for DeploymentErrors {
    type Item = DeploymentError;
    type IntoIter = std::vec::IntoIter<DeploymentError>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl DeploymentErrors {
    /// Errors in the order they were found
    #[inline]
    pub fn errors(&self) -> &[DeploymentError] {
        &self.errors
    }

    /// Number of errors
    #[inline]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns `true` if there are no errors
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns an iterator over the errors
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, DeploymentError> {
        self.errors.iter()
    }
}
