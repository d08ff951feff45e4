//! Records a series of feature edits and prints the reconciled change log a
//! sync client would replay against the remote store.
//!
//! ```shell
//! cargo run --example edit_log
//! ```

use tessella_store::Dataset;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let dataset = Dataset::new(std::env::temp_dir().join("tessella-edit-log-example"));
    let table = dataset.table("roads");
    table.set_edit_history(true);

    table.feature_created(1);
    table.feature_changed(1);
    table.feature_created(2);
    table.feature_deleted(2);
    table.feature_changed(3);
    table.feature_changed(3);

    // Feature 2 was created and deleted locally, so it never reaches the
    // remote store; the repeated changes of feature 3 collapse into one
    // entry.
    for op in table.edit_operations() {
        println!("fid {} -> {:?}", op.fid, op.code);
    }
}
