//! Unit test runner for bytecode_system

mod test_function_state;
