// Domain layer: key material models, storage layout and ports (Adapter, Formatter).

pub mod layout;
pub mod model;
pub mod ports;
