/*!
 * Monitoring
 * Tracing setup for the simulator
 */

mod tracer;

pub use tracer::{generate_run_id, init_tracing, TRACE_JSON_ENV};
