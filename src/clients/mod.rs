pub mod echo_probe;
pub mod event_sampler;
