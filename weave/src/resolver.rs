//! Resolver: matches injection points to beans and detects dependency cycles

use crate::{
    error::{DeploymentError, DeploymentErrors},
    model::{BeanDefinition, InjectionPoint, InjectionPointId},
    registry::BeanRegistry,
};
use indexmap::IndexMap;
use smallvec::SmallVec;
use std::collections::{HashMap, VecDeque};

/// Outcome of matching one injection point against the candidate beans
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Exactly one candidate, or the first declared default among several
    Resolved(String),
    /// Several candidates and no default, in declaration order
    Ambiguous(Vec<String>),
    /// No candidate
    Unsatisfied,
}

impl Resolution {
    /// Identity of the chosen bean, if resolved
    #[inline]
    pub fn target(&self) -> Option<&str> {
        match self {
            Resolution::Resolved(id) => Some(id),
            _ => None
        }
    }

    /// Returns `true` if exactly one bean was chosen
    #[inline]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

/// An injection point together with its resolution
#[derive(Debug, Clone)]
pub struct ResolvedPoint {
    point: InjectionPoint,
    resolution: Resolution,
}

impl ResolvedPoint {
    /// The injection point
    #[inline]
    pub fn point(&self) -> &InjectionPoint {
        &self.point
    }

    /// How it was resolved
    #[inline]
    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }
}

/// A strongly connected set of beans
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    members: Vec<String>,
    path: Vec<String>,
    permitted: bool,
}

impl Cycle {
    /// Members in declaration order
    #[inline]
    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// A shortest path around the cycle, starting and ending with the same bean
    #[inline]
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Returns `true` if every member is contextual
    #[inline]
    pub fn is_permitted(&self) -> bool {
        self.permitted
    }

    /// Returns `true` if `id` is a member of this cycle
    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.members.iter().any(|member| member == id)
    }
}

/// Resolution of every injection point plus the dependency cycles among beans.
///
/// Failures are recorded, never dropped; [`ResolvedGraph::validate`] turns them into errors.
#[derive(Debug, Clone, Default)]
pub struct ResolvedGraph {
    points: IndexMap<InjectionPointId, ResolvedPoint>,
    edges: IndexMap<String, Vec<String>>,
    cycles: Vec<Cycle>,
}

impl ResolvedGraph {
    /// Resolves every injection point of the registry
    pub fn resolve(registry: &BeanRegistry) -> Self {
        let mut graph = Self::default();

        let bean_points = registry.beans().flat_map(BeanDefinition::dependencies);
        let interceptor_points = registry.interceptors().flat_map(|i| i.dependencies());
        for point in bean_points.chain(interceptor_points) {
            let resolution = resolve_point(registry, point);
            graph.points.insert(point.id(), ResolvedPoint {
                point: point.clone(),
                resolution
            });
        }

        for bean in registry.beans() {
            let mut targets: Vec<String> = Vec::with_capacity(bean.dependencies().len());
            for point in bean.dependencies() {
                let target = graph.points
                    .get(&point.id())
                    .and_then(|resolved| resolved.resolution.target());
                if let Some(target) = target
                    && !targets.iter().any(|t| t == target) {
                    targets.push(target.to_owned());
                }
            }
            graph.edges.insert(bean.id().to_owned(), targets);
        }

        graph.cycles = find_cycles(registry, &graph.edges);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            points = graph.points.len(),
            unresolved = graph.points.values().filter(|p| !p.resolution.is_resolved()).count(),
            cycles = graph.cycles.len(),
            "injection points resolved"
        );

        graph
    }

    /// Every injection point and its resolution, beans first, in declaration order
    #[inline]
    pub fn points(&self) -> impl Iterator<Item = &ResolvedPoint> {
        self.points.values()
    }

    /// Resolution of one injection point
    #[inline]
    pub fn resolution(&self, id: &InjectionPointId) -> Option<&Resolution> {
        self.points.get(id).map(|resolved| &resolved.resolution)
    }

    /// Identity of the bean an injection point resolved to
    #[inline]
    pub fn target(&self, id: &InjectionPointId) -> Option<&str> {
        self.resolution(id).and_then(Resolution::target)
    }

    /// Beans a bean depends on, in injection order without repetitions
    #[inline]
    pub fn dependencies_of(&self, bean: &str) -> &[String] {
        self.edges
            .get(bean)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Resolved targets of the given injection points, in order
    pub(crate) fn targets<'a>(&'a self, points: &'a [InjectionPoint]) -> impl Iterator<Item = &'a str> + 'a {
        points
            .iter()
            .filter_map(|point| self.target(&point.id()))
    }

    /// Every cycle found, permitted or not
    #[inline]
    pub fn cycles(&self) -> &[Cycle] {
        &self.cycles
    }

    /// Cycles confined to contextual beans
    #[inline]
    pub fn permitted_cycles(&self) -> impl Iterator<Item = &Cycle> {
        self.cycles.iter().filter(|cycle| cycle.permitted)
    }

    /// Returns `true` if `bean` takes part in any cycle
    #[inline]
    pub fn is_in_cycle(&self, bean: &str) -> bool {
        self.cycles.iter().any(|cycle| cycle.contains(bean))
    }

    /// Returns every recorded failure: unsatisfied and ambiguous points first,
    /// then the forbidden cycles
    pub fn errors(&self) -> Vec<DeploymentError> {
        let resolution_errors = self.points.values().filter_map(|resolved| match &resolved.resolution {
            Resolution::Resolved(_) => None,
            Resolution::Unsatisfied => Some(DeploymentError::UnsatisfiedResolution(resolved.point.clone())),
            Resolution::Ambiguous(candidates) => Some(DeploymentError::AmbiguousResolution {
                point: resolved.point.clone(),
                candidates: candidates.clone()
            }),
        });
        let cycle_errors = self.cycles
            .iter()
            .filter(|cycle| !cycle.permitted)
            .map(|cycle| DeploymentError::CircularDependency { path: cycle.path.clone() });

        resolution_errors.chain(cycle_errors).collect()
    }

    /// Returns `true` if every point is resolved and no forbidden cycle exists
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.points.values().all(|resolved| resolved.resolution.is_resolved())
            && self.cycles.iter().all(|cycle| cycle.permitted)
    }

    /// Fails with every recorded failure, if any
    pub fn validate(&self) -> Result<(), DeploymentErrors> {
        let errors = self.errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.into())
        }
    }
}

fn resolve_point(registry: &BeanRegistry, point: &InjectionPoint) -> Resolution {
    let candidates: SmallVec<[&BeanDefinition; 4]> = registry
        .beans()
        .filter(|bean| bean.is_assignable_to(point.required_type()) && bean.has_qualifiers(point.qualifiers()))
        .collect();

    match candidates.as_slice() {
        [] => Resolution::Unsatisfied,
        [single] => Resolution::Resolved(single.id().to_owned()),
        many => match many.iter().find(|bean| bean.is_default()) {
            Some(default) => Resolution::Resolved(default.id().to_owned()),
            None => Resolution::Ambiguous(many.iter().map(|bean| bean.id().to_owned()).collect()),
        }
    }
}

fn find_cycles(registry: &BeanRegistry, edges: &IndexMap<String, Vec<String>>) -> Vec<Cycle> {
    let adjacency: Vec<Vec<usize>> = registry
        .beans()
        .map(|bean| edges
            .get(bean.id())
            .into_iter()
            .flatten()
            .filter_map(|target| registry.bean_index(target))
            .collect())
        .collect();

    let mut cycles: Vec<Cycle> = strongly_connected(&adjacency)
        .into_iter()
        .filter(|component| component.len() > 1 || adjacency[component[0]].contains(&component[0]))
        .map(|mut component| {
            component.sort_unstable();
            cycle(registry, &adjacency, &component)
        })
        .collect();

    cycles.sort_by_key(|cycle| registry.bean_index(&cycle.members[0]));
    cycles
}

fn cycle(registry: &BeanRegistry, adjacency: &[Vec<usize>], component: &[usize]) -> Cycle {
    let id = |index: usize| registry
        .bean_at(index)
        .map(|bean| bean.id().to_owned())
        .unwrap_or_default();
    let is_contextual = |index: usize| registry
        .bean_at(index)
        .is_some_and(|bean| bean.scope().is_contextual());

    let permitted = component.iter().all(|&index| is_contextual(index));
    let start = component
        .iter()
        .copied()
        .find(|&index| !is_contextual(index))
        .unwrap_or(component[0]);

    Cycle {
        members: component.iter().map(|&index| id(index)).collect(),
        path: shortest_cycle(adjacency, component, start)
            .into_iter()
            .map(id)
            .collect(),
        permitted,
    }
}

/// Breadth-first search for the shortest way back to `start` inside one component
fn shortest_cycle(adjacency: &[Vec<usize>], component: &[usize], start: usize) -> Vec<usize> {
    let mut previous: HashMap<usize, usize> = HashMap::new();
    let mut queue = VecDeque::from([start]);

    while let Some(node) = queue.pop_front() {
        for &next in &adjacency[node] {
            if component.binary_search(&next).is_err() {
                continue;
            }
            if next == start {
                let mut way_back = Vec::new();
                let mut current = node;
                while current != start {
                    way_back.push(current);
                    match previous.get(&current) {
                        Some(&prev) => current = prev,
                        None => break,
                    }
                }
                way_back.reverse();

                let mut path = Vec::with_capacity(way_back.len() + 2);
                path.push(start);
                path.extend(way_back);
                path.push(start);
                return path;
            }
            if !previous.contains_key(&next) {
                previous.insert(next, node);
                queue.push_back(next);
            }
        }
    }

    vec![start, start]
}

/// Tarjan's strongly connected components, iterative so deep graphs do not grow the call stack
fn strongly_connected(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let count = adjacency.len();
    let mut index: Vec<Option<usize>> = vec![None; count];
    let mut low = vec![0; count];
    let mut on_stack = vec![false; count];
    let mut stack = Vec::new();
    let mut next_index = 0;
    let mut components = Vec::new();

    for root in 0..count {
        if index[root].is_some() {
            continue;
        }

        index[root] = Some(next_index);
        low[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;

        let mut work: Vec<(usize, usize)> = vec![(root, 0)];
        while let Some(frame) = work.last_mut() {
            let node = frame.0;
            if let Some(&next) = adjacency[node].get(frame.1) {
                frame.1 += 1;
                match index[next] {
                    None => {
                        index[next] = Some(next_index);
                        low[next] = next_index;
                        next_index += 1;
                        stack.push(next);
                        on_stack[next] = true;
                        work.push((next, 0));
                    },
                    Some(next_idx) if on_stack[next] => low[node] = low[node].min(next_idx),
                    Some(_) => {},
                }
                continue;
            }

            work.pop();
            if let Some(&(parent, _)) = work.last() {
                low[parent] = low[parent].min(low[node]);
            }
            if Some(low[node]) == index[node] {
                let mut component = Vec::new();
                while let Some(member) = stack.pop() {
                    on_stack[member] = false;
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                components.push(component);
            }
        }
    }

    components
}
