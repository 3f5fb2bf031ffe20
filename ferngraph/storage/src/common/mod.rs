pub mod row_group;
pub mod wal;
