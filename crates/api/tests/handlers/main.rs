#[path = "../test_utils.rs"]
mod test_utils;

mod conversations_test;
mod health_test;
mod middleware_test;
mod push_test;
mod slots_test;
