mod manager;
mod store;

pub use manager::TaskManager;
pub use store::TaskStore;
