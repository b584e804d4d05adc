pub mod ports;
pub mod retry_gate;
pub mod ingest_use_case;
