pub mod credentials;
pub mod gating;
pub mod navigation;
pub mod status;
pub mod tracking;
pub mod view_model;
pub mod workflow;

#[cfg(test)]
mod testing;
