//! VM configuration

use memory_manager::GcConfig;

/// Tunables for a [`Vm`](crate::Vm)
///
/// # Examples
///
/// ```
/// use interpreter::VmConfig;
///
/// let config = VmConfig::default().max_call_depth(64).constructor_name("constructor");
/// assert_eq!(config.max_call_depth, 64);
/// assert_eq!(config.constructor_name, "constructor");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfig {
    /// Maximum number of nested call frames, native calls included
    pub max_call_depth: usize,
    /// Value stack slots reserved up front
    pub initial_stack: usize,
    /// Method name run when a class is called
    pub constructor_name: String,
    /// Collector settings for the VM's heap
    pub gc: GcConfig,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 1024,
            initial_stack: 1024,
            constructor_name: "init".to_string(),
            gc: GcConfig::default(),
        }
    }
}

impl VmConfig {
    /// Set the call depth limit
    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Set the initial stack reservation
    pub fn initial_stack(mut self, slots: usize) -> Self {
        self.initial_stack = slots;
        self
    }

    /// Set the constructor method name
    pub fn constructor_name(mut self, name: impl Into<String>) -> Self {
        self.constructor_name = name.into();
        self
    }

    /// Set the collector configuration
    pub fn gc(mut self, gc: GcConfig) -> Self {
        self.gc = gc;
        self
    }
}
