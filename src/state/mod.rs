pub mod error;
pub mod event;
pub mod machine;
pub mod model;

pub use error::{StateError, StateResult};
pub use event::PointerEvent;
pub use machine::DragMachine;
pub use model::DragState;
