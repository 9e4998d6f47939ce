mod error;
mod resolver;

pub use error::GraphError;
pub use resolver::{
    build_graph, execution_groups, graph_stats, impacted_modules, module_dependencies,
    module_dependents, GraphStats,
};
