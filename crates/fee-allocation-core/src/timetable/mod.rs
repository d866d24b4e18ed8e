pub mod assignments;
pub mod periods;
