pub mod merge_manager;
