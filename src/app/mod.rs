// Application layer - Session orchestration and wiring

pub mod container;
pub mod session;

pub use container::AppContainer;
pub use session::{RunSummary, SessionOrchestrator};
