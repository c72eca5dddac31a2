//! Token counting, budgets and budget-aware splitting

mod counter;
mod models;
mod splitter;

pub use counter::{counter_for_model, TokenCounter};
#[cfg(test)]
pub use counter::EstimatingCounter;
pub use models::{context_window, TokenBudget};
pub use splitter::{ContentSerializer, LineCaps, TokenBudgetSplitter};
