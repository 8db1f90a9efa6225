// ABOUTME: Compile-fail test verifying ContainerId and ExecId are not interchangeable.
// ABOUTME: This test should fail to compile, validating type safety.

use kbox::types::{ContainerId, ExecId};

fn takes_container_id(_id: ContainerId) {}

fn main() {
    let exec_id = ExecId::new("exec123");
    takes_container_id(exec_id); // ERROR: expected ContainerId, found ExecId
}
