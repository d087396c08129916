pub mod boss;
pub mod report;
pub mod worker;
