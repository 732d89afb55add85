pub mod repo_tree;
pub mod tree;
