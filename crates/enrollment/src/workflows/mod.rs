pub mod admission;
pub mod quota_import;
