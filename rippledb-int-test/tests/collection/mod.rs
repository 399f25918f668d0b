mod deferred_queue_test;
mod find_test;
mod index_test;
mod insert_test;
mod snapshot_test;
mod update_test;
