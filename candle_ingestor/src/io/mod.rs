pub mod checkpoint;
pub mod csv_store;
pub mod sink;
