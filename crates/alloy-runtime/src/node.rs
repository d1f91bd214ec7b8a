//! Dependency nodes: the tagged sum the resolver classifies.

use std::fmt;
use std::sync::Arc;

use crate::class::ServiceCtor;
use crate::deferred::DeferredImport;
use crate::token::Token;

/// One dependency of a service, as seen by the resolver.
#[derive(Clone)]
pub enum DependencyNode {
    /// Another service constructor, resolved recursively
    Ctor(ServiceCtor),
    /// A token, read from the container's value map
    Token(Token),
    /// A deferred import, executed then resolved recursively
    Deferred(DeferredImport),
    /// Anything else; fails resolution as `invalid-dependency`
    Opaque {
        /// Runtime-type tag of the offending value
        type_tag: String,
    },
}

impl DependencyNode {
    /// Short description for error context
    pub fn describe(&self) -> String {
        match self {
            DependencyNode::Ctor(ctor) => ctor.name().to_string(),
            DependencyNode::Token(token) => token.description(),
            DependencyNode::Deferred(_) => "Lazy(...)".to_string(),
            DependencyNode::Opaque { type_tag } => format!("<{type_tag}>"),
        }
    }
}

impl fmt::Debug for DependencyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DependencyNode({})", self.describe())
    }
}

/// Lazily evaluated dependency list.
///
/// Registrations hold a thunk instead of a list so dependency evaluation is
/// postponed past module-initialization order; self-referential graphs
/// declared in one compilation unit would otherwise observe half-initialized
/// bindings.
pub type DepsThunk = Arc<dyn Fn() -> Vec<DependencyNode> + Send + Sync>;

/// Wrap an already-materialized dependency list in a thunk.
pub fn thunk_of(nodes: Vec<DependencyNode>) -> DepsThunk {
    Arc::new(move || nodes.clone())
}
