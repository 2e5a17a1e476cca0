pub mod fetch_loop;
pub mod stage;
