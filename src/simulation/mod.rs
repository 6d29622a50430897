pub mod states;
pub mod params;
pub mod engine;
pub mod material;
pub mod collider;
pub mod contact;
pub mod forces;
pub mod integrator;
pub mod stability;
pub mod sampler;
pub mod driver;
pub mod packing;
pub mod scenario;
pub mod deposition;
