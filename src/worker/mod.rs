mod repair_sweep;

pub use repair_sweep::run_repair_sweep;
