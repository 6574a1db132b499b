// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "pipeline/mod.rs"]
pub mod pipeline;
