pub mod bus;
pub mod ingestor;
