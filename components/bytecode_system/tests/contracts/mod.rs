//! Contract tests for the public bytecode_system API

mod test_contract_compliance;
