pub mod applicator;
pub mod loader;
pub mod schema;

pub use applicator::{
    apply_plan, apply_to_bytes, Applied, ApplicationError, DirectiveReport, EditPlan, MatchScope,
    Outcome,
};
pub use loader::{load_from_path, load_from_str, ConfigError};
pub use schema::{EditDefinition, EditScript, NamespaceBinding, ValidationError, ValidationIssue};
