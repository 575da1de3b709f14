//! Notes and files: storage, validation and expiry

pub mod file_ops;
pub mod service;
pub mod store;
pub mod sweeper;

pub use service::{ItemService, UploadedFile};
pub use store::ItemStore;
