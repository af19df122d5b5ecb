pub mod balance_repo;
pub mod payment_repo;
pub mod report_repo;
