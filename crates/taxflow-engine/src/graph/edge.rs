use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use taxflow_core::error::{Result, TaxflowError};
use taxflow_core::state::WorkflowState;
use taxflow_core::types::{StepId, Target};

/// Picks an outcome label from the current state.
///
/// Routers may write bookkeeping fields (the pass/fail router records the
/// failing step), which is why they receive the state mutably.
pub trait Router: Send + Sync {
    fn route(&self, state: &mut WorkflowState) -> String;

    fn name(&self) -> &str {
        "router"
    }
}

impl<F> Router for F
where
    F: Fn(&mut WorkflowState) -> String + Send + Sync,
{
    fn route(&self, state: &mut WorkflowState) -> String {
        self(state)
    }
}

/// Outgoing transition of a step.
#[derive(Clone)]
pub enum Edge {
    /// Always go to the same target.
    Static(Target),
    /// Ask the router for a label and look the label up.
    Conditional {
        router: Arc<dyn Router>,
        routes: BTreeMap<String, Target>,
    },
}

impl Edge {
    /// Resolve the next target after `from` ran. A label with no mapped
    /// target aborts the run.
    pub fn resolve(&self, from: &StepId, state: &mut WorkflowState) -> Result<Target> {
        match self {
            Self::Static(target) => Ok(target.clone()),
            Self::Conditional { router, routes } => {
                let label = router.route(state);
                routes.get(&label).cloned().ok_or_else(|| TaxflowError::Routing {
                    step: from.to_string(),
                    reason: format!(
                        "router '{}' returned unmapped label '{}' (known: {})",
                        router.name(),
                        label,
                        routes.keys().cloned().collect::<Vec<_>>().join(", ")
                    ),
                    trail: state.trail_strings(),
                })
            }
        }
    }

    /// Every target this edge can lead to.
    pub fn targets(&self) -> Vec<&Target> {
        match self {
            Self::Static(target) => vec![target],
            Self::Conditional { routes, .. } => routes.values().collect(),
        }
    }
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(target) => f.debug_tuple("Static").field(target).finish(),
            Self::Conditional { router, routes } => f
                .debug_struct("Conditional")
                .field("router", &router.name())
                .field("routes", routes)
                .finish(),
        }
    }
}

/// Static and conditional edges of a graph, plus its entry step.
///
/// Problems such as a second edge out of the same step are collected here
/// and reported when the graph is built.
#[derive(Debug, Default)]
pub struct EdgeTable {
    pub(crate) entry: Option<StepId>,
    pub(crate) edges: HashMap<StepId, Edge>,
    pub(crate) order: Vec<StepId>,
    pub(crate) problems: Vec<String>,
}

impl EdgeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Designate the first step run after `ENTRY`.
    pub fn set_entry(&mut self, id: impl Into<StepId>) -> &mut Self {
        let id = id.into();
        if let Some(prev) = &self.entry {
            self.problems
                .push(format!("entry already set to '{}', got '{}'", prev, id));
        }
        self.entry = Some(id);
        self
    }

    /// Add a static edge.
    pub fn add_edge(&mut self, from: impl Into<StepId>, to: impl Into<Target>) -> &mut Self {
        self.insert(from.into(), Edge::Static(to.into()))
    }

    /// Add a conditional edge mapping router labels to targets.
    pub fn add_conditional<I, L, T>(
        &mut self,
        from: impl Into<StepId>,
        router: impl Router + 'static,
        routes: I,
    ) -> &mut Self
    where
        I: IntoIterator<Item = (L, T)>,
        L: Into<String>,
        T: Into<Target>,
    {
        let routes = routes
            .into_iter()
            .map(|(label, target)| (label.into(), target.into()))
            .collect();
        self.insert(
            from.into(),
            Edge::Conditional {
                router: Arc::new(router),
                routes,
            },
        )
    }

    fn insert(&mut self, from: StepId, edge: Edge) -> &mut Self {
        if self.edges.contains_key(&from) {
            self.problems
                .push(format!("step '{}' has more than one outgoing edge", from));
            return self;
        }
        self.order.push(from.clone());
        self.edges.insert(from, edge);
        self
    }

    pub fn get(&self, from: &str) -> Option<&Edge> {
        self.edges.get(from)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
