//! cloudtidy - rule-based file categorization and move planning
//!
//! This library scores files against configurable category rules, plans
//! conflict-free moves into a dated folder structure, executes (or simulates)
//! those moves through a storage abstraction, and records every run so it can
//! be undone. Rules and limits are configured via TOML files.

pub mod cli;
pub mod config;
pub mod file_category;
pub mod file_organizer;
pub mod file_record;
pub mod local_drive;
pub mod logging;
pub mod output;
pub mod path_template;
pub mod planner;
pub mod undo;

pub use config::{CompiledConfig, Config, ConfigError, ConfigWarning};
pub use file_category::{
    CategorizationResult, Categorizer, CategoryDefinition, CategoryRegistry, DiagnosticLine,
    DiagnosticSink, NullSink, TracingSink,
};
pub use file_organizer::{Executor, MoveError, Mover, OperationRecord, RecordStatus};
pub use file_record::{DateField, FileRecord};
pub use local_drive::{FileSource, LocalDrive, SourceError};
pub use path_template::{OrganizedLayout, build_path};
pub use planner::{BatchReport, ExecutionPlan, MoveOperation, MovePlanner, PlanLimits, PlanSettings};
pub use undo::{HistoryError, HistoryStore, UndoReport};

pub use cli::{OrganizeCommand, run_cli};
