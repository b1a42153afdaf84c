pub mod profile;
pub mod quota_record;
