pub mod mongo_db;
pub mod mongodb;
pub mod mysql_db;
