// Adapters layer: concrete implementations for external systems (storage, transport).

pub mod stdio;
pub mod storage;
