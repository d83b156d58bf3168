pub mod coordinator;
pub mod guard;
pub mod interstitial;
pub mod timer;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::domain::messages::{CoordinatorEvent, Request, Response};
pub use crate::domain::ports::{BlockingService, Clock, PageHost, Storage};
pub use crate::utils::error::Result;
