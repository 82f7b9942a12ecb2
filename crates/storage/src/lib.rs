pub mod db;

pub use db::{count_bills, create_db, get_bill_by_id, insert_bill, BillRecord, DbPool};
