//! Read-only metadata of the executing contract.

use crate::{
    constants::{KEY_ADDRESS, KEY_DESCRIPTION, KEY_ID, KEY_NAME, KEY_OWNER},
    host::ObjectHost,
    objects::HostObject,
    types::FieldType,
};
use std::any::Any;

/// Exposes the executing contract's address, owner and description. The id
/// and name fields are declared but unimplemented; accessing them faults like
/// any other invalid access.
pub struct ContractObject {
    name: String,
}

impl ContractObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
        }
    }
}

impl HostObject for ContractObject {
    fn as_any(&mut self) -> &mut dyn Any { self }

    fn name(&self) -> &str { &self.name }

    fn exists(&self, _host: &mut ObjectHost, key_id: i32) -> bool {
        matches!(key_id, KEY_ADDRESS | KEY_DESCRIPTION | KEY_ID | KEY_NAME | KEY_OWNER)
    }

    fn type_of(&self, key_id: i32) -> i32 {
        match key_id {
            KEY_ADDRESS | KEY_OWNER => FieldType::Bytes.into(),
            KEY_DESCRIPTION | KEY_ID | KEY_NAME => FieldType::String.into(),
            _ => -1,
        }
    }

    fn get_bytes(&mut self, host: &mut ObjectHost, key_id: i32) -> Vec<u8> {
        match key_id {
            KEY_ADDRESS => host.ctx().address.0.to_vec(),
            KEY_OWNER => host.ctx().owner.0.to_vec(),
            _ => {
                host.fault(&self.name, "invalid access");
                Vec::new()
            }
        }
    }

    fn get_string(&mut self, host: &mut ObjectHost, key_id: i32) -> String {
        match key_id {
            KEY_DESCRIPTION => host.ctx().description.clone(),
            _ => {
                host.fault(&self.name, "invalid access");
                String::new()
            }
        }
    }
}
