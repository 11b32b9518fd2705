//! Register spill and restore recognition.

use crate::lifter::arm::operand::{is_callee_saved, normalize_register};
use crate::lifter::builder::MemoryAccess;
use crate::lifter::xdata::XXpr;

fn holds_entry_value(register: &str, value: Option<&XXpr>) -> bool {
    match value.and_then(XXpr::initial_register) {
        Some(initial) => normalize_register(initial) == register,
        None => false,
    }
}

/// A store is a spill when it writes a callee-saved register's entry value.
pub fn classify_store(register: Option<&str>, value: Option<&XXpr>, location: &str) -> MemoryAccess {
    if let Some(register) = register.map(normalize_register) {
        if is_callee_saved(&register) && holds_entry_value(&register, value) {
            return MemoryAccess::RegisterSpill {
                register,
                location: location.to_string(),
            };
        }
    }
    MemoryAccess::Generic {
        location: location.to_string(),
        write: true,
    }
}

/// A load is a restore when it reads a callee-saved register's entry value
/// back into that register. The location it is read from is not checked.
pub fn classify_load(register: Option<&str>, value: Option<&XXpr>, location: &str) -> MemoryAccess {
    if let Some(register) = register.map(normalize_register) {
        if is_callee_saved(&register) && holds_entry_value(&register, value) {
            return MemoryAccess::RegisterRestore {
                register,
                location: location.to_string(),
            };
        }
    }
    MemoryAccess::Generic {
        location: location.to_string(),
        write: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(register: &str) -> XXpr {
        XXpr::InitialRegister {
            register: register.to_string(),
        }
    }

    #[test]
    fn test_spill_requires_callee_saved_entry_value() {
        assert!(classify_store(Some("R4"), Some(&entry("R4")), "var_0010").is_spill());
        assert!(!classify_store(Some("R4"), Some(&entry("R5")), "var_0010").is_spill());
        assert!(!classify_store(Some("R0"), Some(&entry("R0")), "var_0010").is_spill());
        assert!(!classify_store(Some("R4"), None, "var_0010").is_spill());
    }

    #[test]
    fn test_restore_into_link_register() {
        assert!(classify_load(Some("r14"), Some(&entry("LR")), "var_0004").is_restore());
        assert!(!classify_load(Some("PC"), Some(&entry("LR")), "var_0004").is_restore());
    }
}
