//! Extractors for fetching factory arguments from resolved dependencies

use super::{Container, Dependencies, Error};
use crate::proxy::ClientProxy;
use std::sync::Arc;

/// A trait that defines how to extract `Self` from the dependency at a given position
pub trait FromDependency: Sized + Send + Sync {
    /// Extracts `Self` from the dependency at `index`
    fn from_dependency(deps: &Dependencies, index: usize) -> Result<Self, Error>;
}

/// A trait that defines how to extract the whole argument list of a factory
pub trait FromDependencies: Sized + Send + Sync {
    /// Extracts `Self` from the resolved dependencies
    fn from_dependencies(deps: &Dependencies) -> Result<Self, Error>;
}

impl<T: Send + Sync + 'static> FromDependency for Arc<T> {
    #[inline]
    fn from_dependency(deps: &Dependencies, index: usize) -> Result<Self, Error> {
        deps.instance(index)
    }
}

impl FromDependency for ClientProxy {
    #[inline]
    fn from_dependency(deps: &Dependencies, index: usize) -> Result<Self, Error> {
        deps.proxy(index)
    }
}

impl FromDependency for Dependencies {
    #[inline]
    fn from_dependency(deps: &Dependencies, _: usize) -> Result<Self, Error> {
        Ok(deps.clone())
    }
}

impl FromDependency for Container {
    #[inline]
    fn from_dependency(deps: &Dependencies, _: usize) -> Result<Self, Error> {
        Ok(deps.container().clone())
    }
}

impl FromDependencies for () {
    #[inline]
    fn from_dependencies(_: &Dependencies) -> Result<Self, Error> {
        Ok(())
    }
}

macro_rules! define_generic_from_dependencies {
    ($($T: ident $index: tt),*) => {
        impl<$($T: FromDependency),+> FromDependencies for ($($T,)+) {
            #[inline]
            #[allow(non_snake_case)]
            fn from_dependencies(deps: &Dependencies) -> Result<Self, Error> {
                let tuple = (
                    $(
                    $T::from_dependency(deps, $index)?,
                    )*
                );
                Ok(tuple)
            }
        }
    }
}

define_generic_from_dependencies! { T1 0 }
define_generic_from_dependencies! { T1 0, T2 1 }
define_generic_from_dependencies! { T1 0, T2 1, T3 2 }
define_generic_from_dependencies! { T1 0, T2 1, T3 2, T4 3 }
define_generic_from_dependencies! { T1 0, T2 1, T3 2, T4 3, T5 4 }
