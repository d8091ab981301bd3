//! Task records and the store that guards their update semantics.

mod model;
pub mod service;

pub use model::{Task, TaskDraft, TaskInput, TaskPatch};
pub use service::{parse_task_id, TaskStore, NO_FIELDS_TO_UPDATE};
