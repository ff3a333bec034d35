pub mod builder;
pub mod composite;
pub mod override_params;
pub mod surface_descriptor;
