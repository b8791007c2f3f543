pub mod events;
pub mod library;
pub mod model;
pub mod progress;
pub mod queue;
pub mod scheduler;
pub mod store;
pub mod supervisor;
