pub mod allocation_engine;
pub mod payment_report_service;
pub mod payment_service;
