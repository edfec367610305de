pub mod models;
pub mod repository;

pub use models::{FailureReason, InvoiceRecord, InvoiceState};
pub use repository::InvoiceRepository;
