// Domain layer: core models, the message protocol and ports (interfaces).

pub mod messages;
pub mod model;
pub mod ports;
