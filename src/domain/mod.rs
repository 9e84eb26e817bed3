// Domain layer: page model and ports. The batch loop only talks to the page through these traits.

pub mod model;
pub mod ports;
