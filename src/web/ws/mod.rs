mod handler;

pub use handler::stream_run_steps;
