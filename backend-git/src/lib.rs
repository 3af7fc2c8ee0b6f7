pub mod git_repo;
pub mod status;
pub mod workers;

pub use git_repo::GitRepo;
pub use workers::register_git_workers;
